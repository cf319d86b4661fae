use serde::{Deserialize, Serialize};

/// Category of a skeleton entry checked by the integrity checker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardEntryKind {
    /// Top-level symlink into the hidden system tree
    Link,
    /// Required root-level directory
    RootPath,
    /// Per-slot writable `/etc` directory
    EtcPath,
}

/// Integrity checker events.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GuardEvent {
    /// Verification of a root slot started.
    VerificationStarted { root: String, repair: bool },

    /// A missing entry was found.
    DiscrepancyReported {
        kind: GuardEntryKind,
        path: String,
    },

    /// A missing entry was created.
    Repaired {
        kind: GuardEntryKind,
        path: String,
    },

    /// Verification finished.
    VerificationCompleted {
        root: String,
        missing: usize,
        repaired: usize,
        duration_ms: u64,
    },

    /// Repair of an entry failed.
    HealingFailed {
        path: String,
        failure: super::FailureContext,
    },
}
