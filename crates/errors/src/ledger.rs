//! Package and kernel-argument ledger errors

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum LedgerError {
    #[error("package {package} does not exist in the package index")]
    PackageNotInIndex { package: String },

    #[error("package {package} is neither pending nor installed")]
    PackageNotInstalled { package: String },

    #[error("invalid package name: {package:?}")]
    InvalidPackageName { package: String },

    #[error("ledger file {path} is unreadable: {message}")]
    Unreadable { path: String, message: String },

    #[error("ledger file {path} could not be written: {message}")]
    WriteFailed { path: String, message: String },

    #[error("invalid image record at {path}: {message}")]
    InvalidImageRecord { path: String, message: String },
}

impl UserFacingError for LedgerError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::PackageNotInIndex { .. } => Some("Check the package name for typos."),
            Self::PackageNotInstalled { .. } => {
                Some("Only packages added to the ledger or present in the image can be removed.")
            }
            _ => None,
        }
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::PackageNotInIndex { .. } => "ledger.package_not_in_index",
            Self::PackageNotInstalled { .. } => "ledger.package_not_installed",
            Self::InvalidPackageName { .. } => "ledger.invalid_package_name",
            Self::Unreadable { .. } => "ledger.unreadable",
            Self::WriteFailed { .. } => "ledger.write_failed",
            Self::InvalidImageRecord { .. } => "image.invalid_record",
        };
        Some(code)
    }
}
