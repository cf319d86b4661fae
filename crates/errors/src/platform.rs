//! Platform-specific operation errors

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

/// Errors that can occur during platform-specific operations
#[derive(Debug, Clone, Error)]
pub enum PlatformError {
    #[error("filesystem operation failed: {operation} - {message}")]
    FilesystemOperationFailed { operation: String, message: String },

    #[error("mount operation failed: {operation} on {target} - {message}")]
    MountFailed {
        operation: String,
        target: String,
        message: String,
    },

    #[error("process execution failed: {command} - {message}")]
    ProcessExecutionFailed { command: String, message: String },

    #[error("command exited with status {code:?}: {command} - {stderr}")]
    CommandFailed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("platform capability not available: {capability}")]
    CapabilityUnavailable { capability: String },

    #[error("command not found: {command}")]
    CommandNotFound { command: String },

    #[error("permission denied: {operation} - {message}")]
    PermissionDenied { operation: String, message: String },
}

impl PlatformError {
    /// Wrap a syscall failure for a filesystem operation.
    pub fn filesystem(operation: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self::FilesystemOperationFailed {
            operation: operation.into(),
            message: err.to_string(),
        }
    }

    /// Wrap a syscall failure for a mount operation.
    pub fn mount(
        operation: impl Into<String>,
        target: &std::path::Path,
        err: impl std::fmt::Display,
    ) -> Self {
        Self::MountFailed {
            operation: operation.into(),
            target: target.display().to_string(),
            message: err.to_string(),
        }
    }
}

impl UserFacingError for PlatformError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::PermissionDenied { .. } => Some("Run the operation as root."),
            Self::CommandNotFound { .. } => {
                Some("Install the missing system tool or adjust the configured command.")
            }
            Self::MountFailed { .. } => {
                Some("Check that nothing else is mounted at the target and the filesystem type is supported.")
            }
            Self::CapabilityUnavailable { .. } => {
                Some("The running kernel or filesystem does not support this operation.")
            }
            _ => None,
        }
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::FilesystemOperationFailed { .. } => "platform.filesystem",
            Self::MountFailed { .. } => "platform.mount",
            Self::ProcessExecutionFailed { .. } => "platform.process",
            Self::CommandFailed { .. } => "platform.command_failed",
            Self::CapabilityUnavailable { .. } => "platform.capability_unavailable",
            Self::CommandNotFound { .. } => "platform.command_not_found",
            Self::PermissionDenied { .. } => "platform.permission_denied",
        };
        Some(code)
    }
}

impl From<nix::Error> for PlatformError {
    fn from(err: nix::Error) -> Self {
        match err {
            nix::Error::EPERM | nix::Error::EACCES => Self::PermissionDenied {
                operation: "syscall".to_string(),
                message: err.desc().to_string(),
            },
            nix::Error::ENOSYS | nix::Error::EINVAL | nix::Error::EXDEV => {
                Self::CapabilityUnavailable {
                    capability: err.desc().to_string(),
                }
            }
            _ => Self::FilesystemOperationFailed {
                operation: "syscall".to_string(),
                message: err.desc().to_string(),
            },
        }
    }
}
