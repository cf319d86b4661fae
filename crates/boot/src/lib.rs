#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Boot state detection and bootloader configuration for the two slots
//!
//! The generated grub menu is the source of truth for which slot boots by
//! default: the entry marked "Current State" is the present slot and the one
//! marked "Previous State" is the future slot. Entries and the menu are
//! rendered here and published with an atomic exchange.

pub mod entry;
pub mod kernel;
pub mod menu;
pub mod resolver;

pub use entry::{
    entry_kargs, render_slot_entry, slot_entry_config_path, slot_entry_path,
    write_slot_entry,
};
pub use kernel::{compare_kernel_versions, discover_kernel};
pub use menu::{publish_menu, render_menu, MenuSlot, CURRENT_STATE_MARKER, PREVIOUS_STATE_MARKER};
pub use resolver::{parse_boot_state, BootState, BootStateResolver};
