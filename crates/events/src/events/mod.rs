use serde::{Deserialize, Serialize};

use crate::EventSource;
use abroot_errors::UserFacingError;

/// Structured failure information shared across domains.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureContext {
    /// Stable error code from `UserFacingError::user_code`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Short user-facing message.
    pub message: String,
    /// Optional remediation hint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    /// Whether retrying the operation might succeed.
    pub retryable: bool,
}

impl FailureContext {
    /// Construct a new failure context.
    #[must_use]
    pub fn new(
        code: Option<impl Into<String>>,
        message: impl Into<String>,
        hint: Option<impl Into<String>>,
        retryable: bool,
    ) -> Self {
        Self {
            code: code.map(Into::into),
            message: message.into(),
            hint: hint.map(Into::into),
            retryable,
        }
    }

    /// Build failure context from a `UserFacingError` implementation.
    #[must_use]
    pub fn from_error<E: UserFacingError + ?Sized>(error: &E) -> Self {
        Self::new(
            error.user_code(),
            error.user_message().into_owned(),
            error.user_hint(),
            error.is_retryable(),
        )
    }
}

// Declare all domain modules
pub mod boot;
pub mod disk;
pub mod general;
pub mod guard;
pub mod ledger;
pub mod lock;
pub mod overlay;
pub mod platform;
pub mod transaction;

// Re-export all domain events
pub use boot::*;
pub use disk::*;
pub use general::*;
pub use guard::*;
pub use ledger::*;
pub use lock::*;
pub use overlay::*;
pub use platform::*;
pub use transaction::*;

/// Top-level application event enum that aggregates all domain-specific events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "domain", content = "event", rename_all = "snake_case")]
pub enum AppEvent {
    /// General utility events (warnings, errors, operations)
    General(GeneralEvent),

    /// Platform-specific operation events (filesystem, mount, process operations)
    Platform(PlatformEvent),

    /// Block device discovery and mounting
    Disk(DiskEvent),

    /// Overlay staging, merge and teardown
    Overlay(OverlayEvent),

    /// Transaction lock lifecycle
    Lock(LockEvent),

    /// Integrity checker events (skeleton verification, repair)
    Guard(GuardEvent),

    /// Boot state and bootloader publication
    Boot(BootEvent),

    /// Package and kernel argument ledgers
    Ledger(LedgerEvent),

    /// Upgrade transaction progress
    Transaction(TransactionEvent),
}

impl AppEvent {
    #[must_use]
    pub fn event_source(&self) -> EventSource {
        match self {
            Self::General(_) => EventSource::General,
            Self::Platform(_) => EventSource::Platform,
            Self::Disk(_) => EventSource::Disk,
            Self::Overlay(_) => EventSource::Overlay,
            Self::Lock(_) => EventSource::Lock,
            Self::Guard(_) => EventSource::Guard,
            Self::Boot(_) => EventSource::Boot,
            Self::Ledger(_) => EventSource::Ledger,
            Self::Transaction(_) => EventSource::Transaction,
        }
    }

    /// Tracing level a logger should record this event at
    #[must_use]
    pub fn log_level(&self) -> tracing::Level {
        use tracing::Level;

        match self {
            Self::General(GeneralEvent::Error { .. })
            | Self::Platform(
                PlatformEvent::FilesystemOperationFailed { .. }
                | PlatformEvent::MountOperationFailed { .. }
                | PlatformEvent::ProcessExecutionFailed { .. },
            )
            | Self::Guard(GuardEvent::HealingFailed { .. })
            | Self::Transaction(TransactionEvent::Failed { .. }) => Level::ERROR,

            Self::General(GeneralEvent::Warning { .. })
            | Self::Overlay(OverlayEvent::UnmountDeferred { .. })
            | Self::Lock(LockEvent::StaleDetected { .. })
            | Self::Guard(GuardEvent::DiscrepancyReported { .. }) => Level::WARN,

            Self::General(GeneralEvent::Debug { .. })
            | Self::Platform(
                PlatformEvent::FilesystemOperationStarted { .. }
                | PlatformEvent::FilesystemOperationCompleted { .. }
                | PlatformEvent::MountOperationStarted { .. }
                | PlatformEvent::ProcessExecutionStarted { .. },
            )
            | Self::Disk(DiskEvent::PartitionsEnumerated { .. }) => Level::DEBUG,

            _ => Level::INFO,
        }
    }

    /// Build emission metadata, tagged with the transaction id when the
    /// event belongs to an upgrade
    #[must_use]
    pub fn meta(&self) -> crate::EventMeta {
        let meta = crate::EventMeta::new(self.log_level(), self.event_source());
        match self {
            Self::Transaction(event) => meta.with_transaction(event.transaction_id()),
            _ => meta,
        }
    }

    /// Serialized form used as the `fields` of generic log records
    #[must_use]
    pub fn log_fields(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| format!("{self:?}"))
    }
}
