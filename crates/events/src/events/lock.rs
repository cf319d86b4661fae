use serde::{Deserialize, Serialize};

/// Transaction lock lifecycle events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LockEvent {
    Acquired {
        path: String,
        pid: u32,
        operation: String,
    },

    Released { path: String },

    /// A lock file exists but no process holds it
    StaleDetected { path: String, pid: Option<u32> },

    StaleCleared { path: String },
}
