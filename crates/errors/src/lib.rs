#![warn(mismatched_lifetime_syntaxes)]
#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Error types for the abroot transaction engine
//!
//! One `thiserror` enum per domain, folded into [`Error`] at crate
//! boundaries. Every enum implements [`UserFacingError`] so front ends and
//! transaction events can report a stable code and a remediation hint.

use std::borrow::Cow;

use thiserror::Error;

pub mod boot;
pub mod config;
pub mod disk;
pub mod guard;
pub mod ledger;
pub mod lock;
pub mod ops;
pub mod overlay;
pub mod platform;

// Re-export all error types at the root
pub use boot::BootError;
pub use config::ConfigError;
pub use disk::DiskError;
pub use guard::GuardError;
pub use ledger::LedgerError;
pub use lock::LockError;
pub use ops::OpsError;
pub use overlay::OverlayError;
pub use platform::PlatformError;

/// Error type crossing crate boundaries
#[derive(Debug, Clone, Error)]
pub enum Error {
    #[error("platform error: {0}")]
    Platform(#[from] PlatformError),

    #[error("disk error: {0}")]
    Disk(#[from] DiskError),

    #[error("overlay error: {0}")]
    Overlay(#[from] OverlayError),

    #[error("lock error: {0}")]
    Lock(#[from] LockError),

    #[error("boot error: {0}")]
    Boot(#[from] BootError),

    #[error("integrity error: {0}")]
    Guard(#[from] GuardError),

    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("ops error: {0}")]
    Ops(#[from] OpsError),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("I/O error: {message}")]
    Io {
        kind: std::io::ErrorKind,
        message: String,
        path: Option<std::path::PathBuf>,
    },
}

impl Error {
    /// Create an internal error with a message
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Create an Io error with an associated path
    pub fn io_with_path(err: &std::io::Error, path: impl Into<std::path::PathBuf>) -> Self {
        Self::Io {
            kind: err.kind(),
            message: err.to_string(),
            path: Some(path.into()),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            kind: err.kind(),
            message: err.to_string(),
            path: None,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(format!("JSON error: {err}"))
    }
}

impl From<nix::Error> for Error {
    fn from(err: nix::Error) -> Self {
        Self::Platform(PlatformError::from(err))
    }
}

/// Result type alias for abroot operations
pub type Result<T> = std::result::Result<T, Error>;

/// What a front end shows for a failure
pub trait UserFacingError {
    /// Short message suitable for CLI output.
    fn user_message(&self) -> Cow<'_, str>;

    /// Optional remediation hint.
    fn user_hint(&self) -> Option<&'static str> {
        None
    }

    /// Whether retrying the same operation is likely to succeed.
    ///
    /// The transaction core never retries on its own; this only informs the caller.
    fn is_retryable(&self) -> bool {
        false
    }

    /// Stable dotted code, e.g. `lock.held`
    fn user_code(&self) -> Option<&'static str> {
        None
    }
}

impl UserFacingError for Error {
    fn user_message(&self) -> Cow<'_, str> {
        match self {
            Error::Lock(err) => err.user_message(),
            Error::Ops(err) => err.user_message(),
            Error::Io { message, .. } => Cow::Owned(message.clone()),
            _ => Cow::Owned(self.to_string()),
        }
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Error::Platform(err) => err.user_hint(),
            Error::Disk(err) => err.user_hint(),
            Error::Overlay(err) => err.user_hint(),
            Error::Lock(err) => err.user_hint(),
            Error::Boot(err) => err.user_hint(),
            Error::Guard(err) => err.user_hint(),
            Error::Ledger(err) => err.user_hint(),
            Error::Config(err) => err.user_hint(),
            Error::Ops(err) => err.user_hint(),
            _ => None,
        }
    }

    fn user_code(&self) -> Option<&'static str> {
        match self {
            Error::Platform(err) => err.user_code(),
            Error::Disk(err) => err.user_code(),
            Error::Overlay(err) => err.user_code(),
            Error::Lock(err) => err.user_code(),
            Error::Boot(err) => err.user_code(),
            Error::Guard(err) => err.user_code(),
            Error::Ledger(err) => err.user_code(),
            Error::Config(err) => err.user_code(),
            Error::Ops(err) => err.user_code(),
            Error::Internal(_) => Some("error.internal"),
            Error::Io { .. } => Some("error.io"),
        }
    }
}
