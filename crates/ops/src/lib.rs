#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! High-level operations orchestration for abroot
//!
//! This crate is the layer between a front end and the domain crates: it
//! owns the per-invocation [`OpsCtx`], the upgrade transaction, the status
//! report and the ledger operations, plus the tracing setup a front end
//! installs before running any of them.

mod context;
mod external;
pub mod fstab;
pub mod logging;
mod small_ops;
mod status;
mod types;
mod upgrade;

#[cfg(test)]
mod test_support;

pub use context::{OpsContextBuilder, OpsCtx};
pub use external::{DiffService, ImageProvider, InstalledPackages, PackageIndex, RegistryClient};
pub use logging::{init_tracing, log_event_with_tracing, spawn_event_logger};
pub use small_ops::{
    clear_stale_lock, kargs_add, kargs_remove, kargs_set, kargs_show, lock_status, pkg_add,
    pkg_clear_unstaged, pkg_list, pkg_remove, pkg_unstaged,
};
pub use status::{status, SlotStatus, StatusReport};
pub use types::{
    PackageRequest, PendingChanges, PendingPackages, UpgradeOptions, UpgradeOutcome,
};
pub use upgrade::{diff_upgrade, menu_slots, needs_upgrade, pending_changes, upgrade};

use abroot_errors::Error;
use abroot_state::{LockStatus, UnstagedPackages};
use abroot_types::PackageDiff;

/// Operation result that can be serialized for front-end output
#[derive(Clone, Debug, serde::Serialize)]
#[serde(tag = "type", content = "data")]
pub enum OperationResult {
    /// System status
    Status(Box<StatusReport>),
    /// Upgrade outcome
    Upgrade(Box<UpgradeOutcome>),
    /// Package changes of the available update
    PackageDiff(PackageDiff),
    /// Results of package add/remove requests
    PackageRequests(Vec<PackageRequest>),
    /// Staged packages
    PendingPackages(PendingPackages),
    /// Ledger drift against the applied summary
    UnstagedPackages(UnstagedPackages),
    /// Kernel arguments
    Kargs(String),
    /// Transaction lock state
    Lock(LockStatus),
    /// Generic success message
    Success(String),
}

impl OperationResult {
    /// Convert to JSON string
    ///
    /// # Errors
    ///
    /// Returns `OpsError::SerializationError` if serialization fails.
    pub fn to_json(&self) -> Result<String, Error> {
        serde_json::to_string_pretty(self).map_err(|e| {
            abroot_errors::OpsError::SerializationError {
                message: e.to_string(),
            }
            .into()
        })
    }

    /// Check if this is a success result
    #[must_use]
    pub fn is_success(&self) -> bool {
        match self {
            OperationResult::Lock(status) => !matches!(status, LockStatus::Stale(_)),
            OperationResult::Status(_)
            | OperationResult::Upgrade(_)
            | OperationResult::PackageDiff(_)
            | OperationResult::PackageRequests(_)
            | OperationResult::PendingPackages(_)
            | OperationResult::UnstagedPackages(_)
            | OperationResult::Kargs(_)
            | OperationResult::Success(_) => true,
        }
    }
}
