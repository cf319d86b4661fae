//! Report type definitions for operations

use crate::{ABImage, SlotId};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// Result of asking the registry whether a newer image exists
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryCheck {
    /// Digest of the newest image in the registry
    pub digest: String,
    /// Whether that digest differs from the one currently booted
    pub available: bool,
}

/// Package change between two images
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageChange {
    /// Package name
    pub name: String,
    /// Version in the current image
    pub previous_version: Option<String>,
    /// Version in the new image
    pub new_version: Option<String>,
}

/// Package-level difference between two image digests
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageDiff {
    pub added: Vec<PackageChange>,
    pub upgraded: Vec<PackageChange>,
    pub downgraded: Vec<PackageChange>,
    pub removed: Vec<PackageChange>,
}

impl PackageDiff {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty()
            && self.upgraded.is_empty()
            && self.downgraded.is_empty()
            && self.removed.is_empty()
    }
}

/// Upgrade transaction report
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UpgradeReport {
    /// Identifier of this transaction, also carried by its events
    pub transaction_id: Uuid,
    /// Slot that was written
    pub future_slot: SlotId,
    /// Image committed to the future slot
    pub image: ABImage,
    /// Command executed inside the staged root, if any
    pub command: Option<String>,
    /// Packages the ledger applied
    pub packages_added: Vec<String>,
    pub packages_removed: Vec<String>,
    /// Integrity entries repaired in the staged tree
    pub repaired: Vec<PathBuf>,
    /// Whether the run stopped short of mutating the future root
    pub dry_run: bool,
    /// Total execution time
    pub duration_ms: u64,
}
