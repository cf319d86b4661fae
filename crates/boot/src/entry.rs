//! Per-slot boot entry fragment

use abroot_config::{fixed_paths, BootConfig};
use abroot_errors::{BootError, Error};
use abroot_events::{AppEvent, BootEvent, EventEmitter, EventSender};
use abroot_platform::fs;
use abroot_types::SlotId;
use std::path::{Path, PathBuf};

const ENTRY_FILE: &str = "abroot.cfg";

/// Render the grub fragment that boots kernel `kernel` from the slot with
/// filesystem UUID `root_uuid`
#[must_use]
pub fn render_slot_entry(kernel: &str, root_uuid: &str, root_label: &str, kargs: &str) -> String {
    let system = fixed_paths::SYSTEM_DIR;
    let kargs = kargs.trim();
    let kargs = if kargs.is_empty() {
        String::new()
    } else {
        format!(" {kargs}")
    };
    format!(
        "# abroot entry for {root_label}\n\
         insmod gzio\n\
         insmod part_gpt\n\
         insmod ext2\n\
         search --no-floppy --fs-uuid --set=root {root_uuid}\n\
         linux /{system}/boot/vmlinuz-{kernel} root=UUID={root_uuid}{kargs}\n\
         initrd /{system}/boot/initrd.img-{kernel}\n"
    )
}

/// Kernel arguments embedded in a fragment rendered by [`render_slot_entry`]
///
/// Everything after the `root=` token of the `linux` line, space-joined.
/// `None` when the fragment has no `linux` line.
#[must_use]
pub fn entry_kargs(entry: &str) -> Option<String> {
    let line = entry
        .lines()
        .map(str::trim)
        .find(|line| line.starts_with("linux "))?;
    let kargs: Vec<&str> = line
        .split_whitespace()
        .skip_while(|token| !token.starts_with("root="))
        .skip(1)
        .collect();
    Some(kargs.join(" "))
}

/// Where the fragment for the slot labelled `label` lives
///
/// Normally inside the future slot's system tree. With thin provisioning each
/// slot owns a directory of the init volume on the boot partition instead.
#[must_use]
pub fn slot_entry_path(
    future_root: &Path,
    boot_mount: &Path,
    boot: &BootConfig,
    label: &str,
) -> PathBuf {
    if boot.thin_provisioning {
        boot_mount
            .join(boot.thin_init_volume.trim_matches('/'))
            .join(label)
            .join(ENTRY_FILE)
    } else {
        future_root
            .join(fixed_paths::SYSTEM_DIR)
            .join("boot/grub")
            .join(ENTRY_FILE)
    }
}

/// The fragment path grub resolves through `configfile`, relative to the
/// filesystem carrying it
#[must_use]
pub fn slot_entry_config_path(boot: &BootConfig, label: &str) -> String {
    if boot.thin_provisioning {
        format!(
            "/{}/{label}/{ENTRY_FILE}",
            boot.thin_init_volume.trim_matches('/')
        )
    } else {
        format!("/{}/boot/grub/{ENTRY_FILE}", fixed_paths::SYSTEM_DIR)
    }
}

/// Publish a rendered fragment for `slot`
///
/// # Errors
///
/// Returns `BootError::EntryWriteFailed` if the fragment cannot be written.
pub async fn write_slot_entry(
    path: &Path,
    content: &str,
    slot: SlotId,
    event_sender: Option<&EventSender>,
) -> Result<(), Error> {
    let write_failed = |message: String| BootError::EntryWriteFailed {
        path: path.display().to_string(),
        message,
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| write_failed(e.to_string()))?;
    }
    fs::publish_file(path, content.as_bytes())
        .await
        .map_err(|e| write_failed(e.to_string()))?;

    tracing::info!(path = %path.display(), %slot, "wrote boot entry");
    if let Some(sender) = event_sender {
        sender.emit(AppEvent::Boot(BootEvent::EntryWritten {
            slot,
            path: path.display().to_string(),
        }));
    }
    Ok(())
}
