use abroot_types::SlotId;
use serde::{Deserialize, Serialize};

/// Boot state and bootloader publication events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BootEvent {
    /// Slots classified from the generated grub configuration
    StateResolved { present: SlotId, future: SlotId },

    /// A per-slot boot entry was written
    EntryWritten { slot: SlotId, path: String },

    /// The shared boot menu was published
    MenuPublished { path: String, default: SlotId },
}
