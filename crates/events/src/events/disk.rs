use serde::{Deserialize, Serialize};

/// Block device discovery and mount events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DiskEvent {
    /// The block device tree was read and flattened
    PartitionsEnumerated {
        filter: Option<String>,
        count: usize,
    },

    /// A partition was mounted
    Mounted { device: String, destination: String },

    /// A mount point and its descendants were unmounted
    Unmounted { mount_point: String, mounts: usize },

    /// Present and future slots were resolved from their labels
    RootsResolved {
        present_label: String,
        future_label: String,
    },
}
