//! Present/future classification from the generated grub configuration
//!
//! The classification is a plain substring contract with the menu written by
//! [`crate::render_menu`]: each `menuentry` block names one slot
//! (`abroot-a` / `abroot-b`) and carries either the current or the previous
//! state marker.

use abroot_config::fixed_paths;
use abroot_errors::{BootError, Error};
use abroot_events::{AppEvent, BootEvent, EventEmitter, EventSender};
use abroot_types::SlotId;
use std::path::{Path, PathBuf};

use crate::menu::{CURRENT_STATE_MARKER, PREVIOUS_STATE_MARKER};

/// Slot roles as recorded by the bootloader
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootState {
    /// Slot of the default ("Current State") entry
    pub present: SlotId,
    /// Slot of the fallback ("Previous State") entry
    pub future: SlotId,
}

/// Classify both slots from grub configuration text
///
/// `source` only names the configuration in errors.
///
/// # Errors
///
/// Returns `BootError::SlotUnclassified` unless exactly one slot carries
/// each marker.
pub fn parse_boot_state(text: &str, source: &Path) -> Result<BootState, BootError> {
    let mut present = None;
    let mut future = None;

    for block in menu_entries(text) {
        let Some(slot) = slot_of(block) else {
            continue;
        };
        if block.contains(CURRENT_STATE_MARKER) {
            present.get_or_insert(slot);
        } else if block.contains(PREVIOUS_STATE_MARKER) {
            future.get_or_insert(slot);
        }
    }

    match (present, future) {
        (Some(present), Some(future)) if present != future => Ok(BootState { present, future }),
        _ => Err(BootError::SlotUnclassified {
            path: source.display().to_string(),
            present: present.map(|s| s.identifier().to_string()),
            future: future.map(|s| s.identifier().to_string()),
        }),
    }
}

fn slot_of(block: &str) -> Option<SlotId> {
    let a = block.contains(SlotId::A.boot_entry_name());
    let b = block.contains(SlotId::B.boot_entry_name());
    match (a, b) {
        (true, false) => Some(SlotId::A),
        (false, true) => Some(SlotId::B),
        _ => None,
    }
}

/// Text of every top-level `menuentry ... { ... }` block
fn menu_entries(text: &str) -> Vec<&str> {
    let mut blocks = Vec::new();
    let mut offset = 0;
    let mut start = None;
    let mut depth = 0usize;

    for line in text.split_inclusive('\n') {
        let trimmed = line.trim_start();
        if start.is_none() && trimmed.starts_with("menuentry") {
            start = Some(offset);
            depth = 0;
        }
        if start.is_some() {
            depth += line.matches('{').count();
            depth = depth.saturating_sub(line.matches('}').count());
            if depth == 0 && line.contains('}') {
                if let Some(begin) = start.take() {
                    blocks.push(&text[begin..offset + line.len()]);
                }
            }
        }
        offset += line.len();
    }
    if let Some(begin) = start {
        // Unterminated trailing entry
        blocks.push(&text[begin..]);
    }
    blocks
}

/// Reads the generated grub configuration of the running system
pub struct BootStateResolver {
    config_path: PathBuf,
    event_sender: Option<EventSender>,
}

impl EventEmitter for BootStateResolver {
    fn event_sender(&self) -> Option<&EventSender> {
        self.event_sender.as_ref()
    }
}

impl BootStateResolver {
    #[must_use]
    pub fn new(config_path: impl Into<PathBuf>, event_sender: Option<EventSender>) -> Self {
        Self {
            config_path: config_path.into(),
            event_sender,
        }
    }

    /// Resolver for the host's `/boot/grub/grub.cfg`
    #[must_use]
    pub fn system(event_sender: Option<EventSender>) -> Self {
        Self::new(fixed_paths::GRUB_CONFIG, event_sender)
    }

    #[must_use]
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Classify both slots
    ///
    /// # Errors
    ///
    /// Returns `BootError::ConfigUnreadable` if the configuration cannot be
    /// read and `BootError::SlotUnclassified` if it lacks either marker.
    pub async fn resolve(&self) -> Result<BootState, Error> {
        let text = tokio::fs::read_to_string(&self.config_path)
            .await
            .map_err(|e| BootError::ConfigUnreadable {
                path: self.config_path.display().to_string(),
                message: e.to_string(),
            })?;
        let state = parse_boot_state(&text, &self.config_path)?;
        tracing::debug!(present = %state.present, future = %state.future, "resolved boot state");
        self.emit(AppEvent::Boot(BootEvent::StateResolved {
            present: state.present,
            future: state.future,
        }));
        Ok(state)
    }

    /// Whether grub's default entry is the slot the disk layout calls present
    ///
    /// `false` means the menu already defaults to `disk_future`, typically
    /// because an update is waiting for a reboot. For reporting only.
    ///
    /// # Errors
    ///
    /// See [`BootStateResolver::resolve`].
    pub async fn is_booted_into_present_root(&self, disk_future: SlotId) -> Result<bool, Error> {
        let state = self.resolve().await?;
        Ok(state.present != disk_future)
    }
}
