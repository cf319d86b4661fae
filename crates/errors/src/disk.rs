//! Block-device discovery and mount errors

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum DiskError {
    #[error("block device enumeration failed: {message}")]
    EnumerationFailed { message: String },

    #[error("invalid block device listing: {message}")]
    InvalidListing { message: String },

    #[error("no partition labelled {label}")]
    LabelNotFound { label: String },

    #[error("no root slot is mounted at {mount_point}")]
    PresentRootNotFound { mount_point: String },

    #[error("mount failed for {device} at {destination}: {message}")]
    MountFailed {
        device: String,
        destination: String,
        message: String,
    },

    #[error("unmount failed for {mount_point}: {message}")]
    UnmountFailed { mount_point: String, message: String },

    #[error("invalid mount table entry: {line}")]
    InvalidMountInfo { line: String },

    #[error("mount chain under {mount_point} exceeds {limit} levels")]
    MountChainTooDeep { mount_point: String, limit: usize },
}

impl UserFacingError for DiskError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::LabelNotFound { .. } | Self::PresentRootNotFound { .. } => {
                Some("Check the partition labels in the abroot configuration.")
            }
            Self::MountChainTooDeep { .. } => {
                Some("The mount table looks corrupted; inspect /proc/self/mountinfo.")
            }
            _ => None,
        }
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::EnumerationFailed { .. } => "disk.enumerate_failed",
            Self::InvalidListing { .. } => "disk.invalid_listing",
            Self::LabelNotFound { .. } => "disk.label_not_found",
            Self::PresentRootNotFound { .. } => "disk.present_root_not_found",
            Self::MountFailed { .. } => "disk.mount_failed",
            Self::UnmountFailed { .. } => "disk.unmount_failed",
            Self::InvalidMountInfo { .. } => "disk.invalid_mountinfo",
            Self::MountChainTooDeep { .. } => "disk.mount_chain_too_deep",
        };
        Some(code)
    }
}
