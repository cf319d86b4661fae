use serde::{Deserialize, Serialize};

/// Overlay transaction events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OverlayEvent {
    /// Union filesystem mounted at the combiner
    Staged {
        combiner: String,
        lowers: Vec<String>,
    },

    /// Combiner content mirrored into the target
    Merged { combiner: String, target: String },

    /// The merge succeeded but the combiner could not be unmounted
    UnmountDeferred { combiner: String, message: String },

    /// Scratch mounts and directories torn down
    Aborted { combiner: String },

    /// A command was executed inside a chroot session
    ChrootCommand {
        root: String,
        command: String,
        exit_code: Option<i32>,
    },
}
