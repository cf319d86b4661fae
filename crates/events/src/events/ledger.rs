use serde::{Deserialize, Serialize};

/// Package and kernel-argument ledger events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LedgerEvent {
    /// Package staged for installation (or a pending removal cancelled)
    PackageAdded { name: String, cancelled_removal: bool },

    /// Package staged for removal (or a pending addition cancelled)
    PackageRemoved { name: String, cancelled_addition: bool },

    /// Applied summary rewritten
    SummaryWritten { path: String, entries: usize },

    /// Kernel arguments persisted
    KargsWritten { path: String, backup: Option<String> },
}
