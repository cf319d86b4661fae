//! Operation orchestration error types

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum OpsError {
    #[error("operation requires root privileges")]
    NotRoot,

    #[error("operation failed: {message}")]
    OperationFailed { message: String },

    #[error("no update available for {image}")]
    NoUpdateAvailable { image: String },

    #[error("image provider failed for {reference}: {message}")]
    ImageProviderFailed { reference: String, message: String },

    #[error("registry check failed: {message}")]
    RegistryFailed { message: String },

    #[error("package diff failed: {message}")]
    DiffFailed { message: String },

    #[error("serialization error: {message}")]
    SerializationError { message: String },

    #[error("missing component: {component}")]
    MissingComponent { component: String },
}

impl UserFacingError for OpsError {
    fn user_message(&self) -> Cow<'_, str> {
        match self {
            Self::NotRoot => Cow::Borrowed("this operation must be run as root"),
            _ => Cow::Owned(self.to_string()),
        }
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::NotRoot => Some("Re-run the command with sudo."),
            Self::NoUpdateAvailable { .. } => Some("Use force to rebuild the future root anyway."),
            _ => None,
        }
    }

    fn is_retryable(&self) -> bool {
        matches!(self, Self::RegistryFailed { .. } | Self::ImageProviderFailed { .. })
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::NotRoot => "ops.not_root",
            Self::OperationFailed { .. } => "ops.operation_failed",
            Self::NoUpdateAvailable { .. } => "ops.no_update_available",
            Self::ImageProviderFailed { .. } => "ops.image_provider_failed",
            Self::RegistryFailed { .. } => "ops.registry_failed",
            Self::DiffFailed { .. } => "ops.diff_failed",
            Self::SerializationError { .. } => "ops.serialization",
            Self::MissingComponent { .. } => "ops.missing_component",
        };
        Some(code)
    }
}
