#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Transactional overlay staging for the future root
//!
//! An [`OverlayEngine`] mounts a union filesystem over a read-only tree so
//! commands can run against the future root without touching it, then folds
//! the result back into the target or throws it away. [`Chroot`] wraps the
//! bind mounts needed to run those commands inside the staged tree.

mod chroot;
mod engine;

pub use chroot::{Chroot, CHROOT_BIND_MOUNTS};
pub use engine::{overlay_mount_data, OverlayEngine, OverlayPaths, OverlayState};
