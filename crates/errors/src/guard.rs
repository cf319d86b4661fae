//! Integrity checker error types

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

/// Errors emitted by the integrity checker.
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum GuardError {
    /// The root slot to check does not exist.
    #[error("root slot {path} does not exist")]
    RootMissing { path: String },

    /// Repairing a single missing entry failed.
    #[error("repair failed for {kind} at {path}: {reason}")]
    RepairFailed {
        kind: String,
        path: String,
        reason: String,
    },

    /// An existing entry has the wrong type (e.g. a file where a directory belongs).
    #[error("conflicting entry at {path}: expected {expected}")]
    Conflict { path: String, expected: String },
}

impl UserFacingError for GuardError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::Conflict { .. } => {
                Some("Move the conflicting entry out of the way and rerun the integrity check.")
            }
            _ => None,
        }
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::RootMissing { .. } => "guard.root_missing",
            Self::RepairFailed { .. } => "guard.repair_failed",
            Self::Conflict { .. } => "guard.conflict",
        };
        Some(code)
    }
}
