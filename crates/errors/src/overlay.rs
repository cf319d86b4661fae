//! Overlay transaction errors

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum OverlayError {
    #[error("{path} is already a mount point")]
    Busy { path: String },

    #[error("overlay requires at least one lower directory")]
    NoLowerDirs,

    #[error("invalid overlay transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("overlay mount failed at {path}: {message}")]
    MountFailed { path: String, message: String },

    #[error("overlay merge into {target} failed: {message}")]
    MergeFailed { target: String, message: String },

    #[error("chroot command failed in {root}: {command}: {message}")]
    ChrootCommandFailed {
        root: String,
        command: String,
        message: String,
    },
}

impl UserFacingError for OverlayError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::Busy { .. } => {
                Some("Another transaction may be staged; unmount it or wait for it to finish.")
            }
            _ => None,
        }
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::Busy { .. } => "overlay.busy",
            Self::NoLowerDirs => "overlay.no_lower_dirs",
            Self::InvalidTransition { .. } => "overlay.invalid_transition",
            Self::MountFailed { .. } => "overlay.mount_failed",
            Self::MergeFailed { .. } => "overlay.merge_failed",
            Self::ChrootCommandFailed { .. } => "overlay.chroot_command_failed",
        };
        Some(code)
    }
}
