#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Root slot skeleton verification and repair

mod checker;
mod skeleton;

pub use abroot_events::GuardEntryKind;
pub use checker::{Discrepancy, IntegrityChecker, IntegrityReport};
pub use skeleton::{etc_paths, relative_link_target, ROOT_PATHS, STANDARD_LINKS};
