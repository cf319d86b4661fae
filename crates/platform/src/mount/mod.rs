//! Mount operations

use abroot_errors::PlatformError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::core::PlatformContext;

/// A single mount(2) call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountRequest {
    pub source: Option<String>,
    pub target: PathBuf,
    pub fstype: Option<String>,
    /// Comma separated filesystem options passed as mount data
    pub data: Option<String>,
    pub bind: bool,
    pub recursive: bool,
}

impl MountRequest {
    /// Mount a block device with an optional filesystem type
    pub fn device(source: impl Into<String>, target: impl Into<PathBuf>) -> Self {
        Self {
            source: Some(source.into()),
            target: target.into(),
            fstype: None,
            data: None,
            bind: false,
            recursive: false,
        }
    }

    /// Recursive bind mount of `source` at `target`
    pub fn bind(source: &Path, target: impl Into<PathBuf>) -> Self {
        Self {
            source: Some(source.display().to_string()),
            target: target.into(),
            fstype: None,
            data: None,
            bind: true,
            recursive: true,
        }
    }

    /// Overlay union mount with prebuilt `lowerdir=,upperdir=,workdir=` data
    pub fn overlay(target: impl Into<PathBuf>, data: impl Into<String>) -> Self {
        Self {
            source: Some("overlay".to_string()),
            target: target.into(),
            fstype: Some("overlay".to_string()),
            data: Some(data.into()),
            bind: false,
            recursive: false,
        }
    }

    #[must_use]
    pub fn with_fstype(mut self, fstype: impl Into<String>) -> Self {
        self.fstype = Some(fstype.into());
        self
    }

    #[must_use]
    pub fn with_data(mut self, data: impl Into<String>) -> Self {
        self.data = Some(data.into());
        self
    }
}

#[async_trait]
pub trait MountOperations: Send + Sync {
    /// Perform a mount
    async fn mount(&self, ctx: &PlatformContext, request: MountRequest)
        -> Result<(), PlatformError>;

    /// Unmount a single mount point, lazily when `detach` is set
    async fn unmount(
        &self,
        ctx: &PlatformContext,
        target: &Path,
        detach: bool,
    ) -> Result<(), PlatformError>;
}
