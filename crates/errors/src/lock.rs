//! Transaction lock errors

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum LockError {
    #[error("transaction lock {path} is held by pid {pid:?} since {since:?}")]
    Held {
        path: String,
        pid: Option<u32>,
        since: Option<String>,
    },

    #[error("stale transaction lock {path} left by pid {pid:?} since {since:?}")]
    Stale {
        path: String,
        pid: Option<u32>,
        since: Option<String>,
    },

    #[error("transaction lock {path} is not held")]
    NotHeld { path: String },

    #[error("lock I/O failed on {path}: {message}")]
    Io { path: String, message: String },
}

impl UserFacingError for LockError {
    fn user_message(&self) -> Cow<'_, str> {
        match self {
            Self::Held { pid: Some(pid), .. } => {
                Cow::Owned(format!("another transaction is running (pid {pid})"))
            }
            Self::Held { .. } => Cow::Borrowed("another transaction is running"),
            _ => Cow::Owned(self.to_string()),
        }
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::Held { .. } => Some("Wait for the running transaction to finish."),
            Self::Stale { .. } => Some(
                "A previous transaction crashed; verify nothing is running and clear the lock manually.",
            ),
            _ => None,
        }
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::Held { .. } => "lock.held",
            Self::Stale { .. } => "lock.stale",
            Self::NotHeld { .. } => "lock.not_held",
            Self::Io { .. } => "lock.io",
        };
        Some(code)
    }
}
