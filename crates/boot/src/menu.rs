//! Shared grub menu listing both slots

use abroot_errors::{BootError, Error};
use abroot_events::{AppEvent, BootEvent, EventEmitter, EventSender};
use abroot_platform::fs;
use abroot_types::SlotId;
use std::fmt::Write as _;
use std::path::Path;

/// Marker of the default entry; the slot behind it is the present root
pub const CURRENT_STATE_MARKER: &str = "Current State";
/// Marker of the fallback entry; the slot behind it is the future root
pub const PREVIOUS_STATE_MARKER: &str = "Previous State";

/// How grub reaches one slot's entry fragment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuSlot {
    pub slot: SlotId,
    /// Filesystem UUID grub searches to set its root
    pub uuid: String,
    /// Fragment path relative to that filesystem
    pub config_path: String,
}

/// Render the menu booting `default` first and keeping `fallback` as the
/// previous state
///
/// After an upgrade the freshly written slot is the default.
#[must_use]
pub fn render_menu(default: &MenuSlot, fallback: &MenuSlot) -> String {
    let mut out = String::from(
        "# Generated by abroot, changes are overwritten on the next transaction\n\
         set default=0\n\
         set timeout=5\n\
         set timeout_style=menu\n",
    );
    for (marker, slot) in [
        (CURRENT_STATE_MARKER, default),
        (PREVIOUS_STATE_MARKER, fallback),
    ] {
        let _ = write!(
            out,
            "\nmenuentry \"{marker}\" --class {class} {{\n    \
             search --no-floppy --fs-uuid --set=root {uuid}\n    \
             configfile \"{config}\"\n}}\n",
            class = slot.slot.boot_entry_name(),
            uuid = slot.uuid,
            config = slot.config_path,
        );
    }
    out
}

/// Publish `content` as the menu at `path`
///
/// # Errors
///
/// Returns `BootError::EntryWriteFailed` if the menu cannot be published.
pub async fn publish_menu(
    path: &Path,
    content: &str,
    default: SlotId,
    event_sender: Option<&EventSender>,
) -> Result<(), Error> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    fs::publish_file(path, content.as_bytes())
        .await
        .map_err(|e| BootError::EntryWriteFailed {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

    tracing::info!(path = %path.display(), %default, "published boot menu");
    if let Some(sender) = event_sender {
        sender.emit(AppEvent::Boot(BootEvent::MenuPublished {
            path: path.display().to_string(),
            default,
        }));
    }
    Ok(())
}
