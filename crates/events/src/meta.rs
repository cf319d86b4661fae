use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::Level;
use uuid::Uuid;

/// Emission metadata a logger attaches to an [`crate::AppEvent`]
///
/// Built on demand by [`crate::AppEvent::meta`]; events themselves stay
/// plain data.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventMeta {
    pub event_id: Uuid,
    /// Upgrade transaction the event belongs to, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<Uuid>,
    pub timestamp: DateTime<Utc>,
    pub level: EventLevel,
    pub source: EventSource,
}

impl EventMeta {
    #[must_use]
    pub fn new(level: impl Into<EventLevel>, source: EventSource) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            transaction_id: None,
            timestamp: Utc::now(),
            level: level.into(),
            source,
        }
    }

    #[must_use]
    pub fn with_transaction(mut self, transaction_id: Uuid) -> Self {
        self.transaction_id = Some(transaction_id);
        self
    }
}

/// Severity carried in serialized metadata
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum EventLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<Level> for EventLevel {
    fn from(level: Level) -> Self {
        match level {
            Level::TRACE => EventLevel::Trace,
            Level::DEBUG => EventLevel::Debug,
            Level::INFO => EventLevel::Info,
            Level::WARN => EventLevel::Warn,
            Level::ERROR => EventLevel::Error,
        }
    }
}

/// Subsystem that emitted an event
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum EventSource {
    General,
    Platform,
    Disk,
    Overlay,
    Lock,
    Guard,
    Boot,
    Ledger,
    Transaction,
}

impl EventSource {
    /// Identifier used as the `source` field of log records
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            EventSource::General => "general",
            EventSource::Platform => "platform",
            EventSource::Disk => "disk",
            EventSource::Overlay => "overlay",
            EventSource::Lock => "lock",
            EventSource::Guard => "guard",
            EventSource::Boot => "boot",
            EventSource::Ledger => "ledger",
            EventSource::Transaction => "transaction",
        }
    }
}
