#![warn(mismatched_lifetime_syntaxes)]
#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions, clippy::missing_panics_doc)]

//! Persistent transaction state for abroot
//!
//! Everything that survives between invocations lives here: the transaction
//! lock sentinel, the per-slot image record, and the package and kernel
//! argument ledgers layered on top of the image. There is no database; every
//! piece of state is a small flat file published atomically.

pub mod image;
pub mod kargs;
pub mod lock;
pub mod packages;

pub use kargs::{kargs_format, KernelArgsLedger};
pub use lock::{LockOwner, LockStatus, TransactionLock};
pub use packages::{
    InstalledPackages, LedgerChange, PackageIndex, PackageLedger, StatusCommandProbe,
    UnstagedPackages,
};
