//! Boot state resolution errors

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum BootError {
    #[error("bootloader configuration not readable at {path}: {message}")]
    ConfigUnreadable { path: String, message: String },

    #[error("could not classify boot slots in {path}: present={present:?} future={future:?}")]
    SlotUnclassified {
        path: String,
        present: Option<String>,
        future: Option<String>,
    },

    #[error("no kernel found under {path}")]
    KernelNotFound { path: String },

    #[error("boot entry write failed at {path}: {message}")]
    EntryWriteFailed { path: String, message: String },
}

impl UserFacingError for BootError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::SlotUnclassified { .. } => {
                Some("The generated grub configuration is missing the slot markers; regenerate it.")
            }
            Self::KernelNotFound { .. } => Some("The staged image does not ship a kernel."),
            _ => None,
        }
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::ConfigUnreadable { .. } => "boot.config_unreadable",
            Self::SlotUnclassified { .. } => "boot.slot_unclassified",
            Self::KernelNotFound { .. } => "boot.kernel_not_found",
            Self::EntryWriteFailed { .. } => "boot.entry_write_failed",
        };
        Some(code)
    }
}
