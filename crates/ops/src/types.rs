//! Report types returned by operations

use abroot_state::{LedgerChange, UnstagedPackages};
use abroot_types::{RegistryCheck, UpgradeReport};
use serde::Serialize;

/// Outcome of one package request
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PackageRequest {
    pub name: String,
    pub change: LedgerChange,
}

/// Packages staged in the ledger
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PendingPackages {
    pub add: Vec<String>,
    pub remove: Vec<String>,
}

impl PendingPackages {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.remove.is_empty()
    }
}

/// Local changes a commit applies even without a newer image
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PendingChanges {
    /// Ledger entries the running slot's package summary does not record
    pub packages: UnstagedPackages,
    /// The kernel arguments differ from the running slot's boot entry
    pub kargs_changed: bool,
}

impl PendingChanges {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.packages.is_empty() && !self.kargs_changed
    }
}

/// Options of an upgrade transaction, as supplied by the front end
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UpgradeOptions {
    /// Rebuild the future root even when the registry has nothing newer
    pub force: bool,
}

/// What an upgrade request ended up doing
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum UpgradeOutcome {
    /// The registry has nothing newer, nothing is pending locally and the
    /// run was not forced
    UpToDate { check: RegistryCheck },
    /// The future root was written (or planned, in a dry run)
    Applied(UpgradeReport),
}
