use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Upgrade transaction events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransactionEvent {
    Started {
        transaction_id: Uuid,
        operation: String,
        dry_run: bool,
    },

    /// One step of the upgrade sequence began
    StepStarted { transaction_id: Uuid, step: String },

    /// Nothing to do (no update, nothing pending and not forced)
    Skipped { transaction_id: Uuid, reason: String },

    Completed {
        transaction_id: Uuid,
        duration_ms: u64,
    },

    Failed {
        transaction_id: Uuid,
        step: String,
        failure: super::FailureContext,
    },
}

impl TransactionEvent {
    #[must_use]
    pub fn transaction_id(&self) -> Uuid {
        match self {
            Self::Started { transaction_id, .. }
            | Self::StepStarted { transaction_id, .. }
            | Self::Skipped { transaction_id, .. }
            | Self::Completed { transaction_id, .. }
            | Self::Failed { transaction_id, .. } => *transaction_id,
        }
    }
}
