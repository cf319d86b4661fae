//! Collaborators the transaction core drives but does not implement
//!
//! Pulling images, talking to the registry and diffing image contents live in
//! other tools. The upgrade only needs these narrow seams.

use abroot_errors::Error;
use abroot_types::{PackageDiff, RegistryCheck};
use async_trait::async_trait;
use std::path::PathBuf;

pub use abroot_state::{InstalledPackages, PackageIndex};

/// Produces an unpacked root filesystem for an image reference
#[async_trait]
pub trait ImageProvider: Send + Sync {
    /// Pull (or build) `reference` and return the directory holding its rootfs
    async fn pull(&self, reference: &str) -> Result<PathBuf, Error>;
}

/// Asks the registry whether a newer image exists
#[async_trait]
pub trait RegistryClient: Send + Sync {
    async fn check(&self, reference: &str, current_digest: &str) -> Result<RegistryCheck, Error>;
}

/// Package-level comparison of two image digests
#[async_trait]
pub trait DiffService: Send + Sync {
    async fn diff(&self, old_digest: &str, new_digest: &str) -> Result<PackageDiff, Error>;
}
