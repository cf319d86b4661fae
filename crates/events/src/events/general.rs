use serde::{Deserialize, Serialize};

/// Free-form messages that belong to no particular domain
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GeneralEvent {
    Warning { message: String },
    Error { message: String },
    Debug { message: String },
}
