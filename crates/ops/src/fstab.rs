//! Mount table of a freshly written root slot

use abroot_config::{fixed_paths, PartitionsConfig};
use abroot_disk::{Partition, PartitionTable};
use abroot_errors::{Error, OpsError};
use abroot_platform::fs;
use abroot_types::SlotId;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

const HEADER: &str = "# /etc/fstab: static file system information.\n\
                      # Generated by abroot, rewritten on every transaction.\n\
                      #\n\
                      # <file system>\t<mount point>\t<type>\t<options>\t<dump>\t<pass>\n";

/// Location of the mount table inside a slot mounted at `slot_root`
#[must_use]
pub fn fstab_path(slot_root: &Path) -> PathBuf {
    slot_root.join(fixed_paths::SYSTEM_DIR).join("etc/fstab")
}

/// Render the mount table booting `root` as `slot`
///
/// Boot, EFI and var partitions are looked up by label in `table`; a label
/// that is absent from the table is left out of the file. The read-only bind
/// of `/.system/usr` and the `/etc` overlay backed by the slot's writable
/// state under `/var` are always present.
#[must_use]
pub fn render(
    labels: &PartitionsConfig,
    root: &Partition,
    slot: SlotId,
    table: &PartitionTable,
) -> String {
    let mut out = String::from(HEADER);
    line(&mut out, &by_uuid(root), "/", fs_type(root), "defaults", 0, 1);

    if let Some(boot) = table.by_label(&labels.label_boot) {
        line(&mut out, &by_uuid(boot), "/boot", fs_type(boot), "defaults", 0, 2);
    }
    if let Some(efi) = table.by_label(&labels.label_efi) {
        line(&mut out, &by_uuid(efi), "/boot/efi", "vfat", "umask=0077", 0, 2);
    }
    if let Some(var) = table.by_label(&labels.label_var) {
        // Unlocked LUKS volumes are addressed through their mapper device
        let source = if labels.crypt_var {
            var.device.display().to_string()
        } else {
            by_uuid(var)
        };
        line(&mut out, &source, "/var", fs_type(var), "defaults", 0, 0);
    }

    let usr = format!("/{}/usr", fixed_paths::SYSTEM_DIR);
    line(&mut out, &usr, &usr, "none", "bind,ro", 0, 0);

    // Upper and work dirs are per slot; /var has to be mounted first
    let state = format!("/{}/{}", fixed_paths::ETC_STATE_DIR, slot.identifier());
    let etc = format!(
        "lowerdir=/{}/etc,upperdir={state},workdir={state}-work",
        fixed_paths::SYSTEM_DIR
    );
    line(&mut out, "overlay", "/etc", "overlay", &etc, 0, 0);
    out
}

/// Publish `content` as the slot's mount table
///
/// An existing table is exchanged with the new one in a single step.
///
/// # Errors
///
/// Returns `OpsError::OperationFailed` if the table cannot be published.
pub async fn publish(slot_root: &Path, content: &str) -> Result<PathBuf, Error> {
    let path = fstab_path(slot_root);
    let failed = |e: Error| OpsError::OperationFailed {
        message: format!("writing {}: {e}", path.display()),
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await.map_err(failed)?;
    }
    fs::publish_file(&path, content.as_bytes())
        .await
        .map_err(failed)?;
    tracing::info!(path = %path.display(), "published fstab");
    Ok(path)
}

fn by_uuid(partition: &Partition) -> String {
    format!("UUID={}", partition.uuid)
}

fn fs_type(partition: &Partition) -> &str {
    if partition.fs_type.is_empty() {
        "auto"
    } else {
        &partition.fs_type
    }
}

fn line(
    out: &mut String,
    source: &str,
    target: &str,
    fs_type: &str,
    options: &str,
    dump: u8,
    pass: u8,
) {
    let _ = writeln!(out, "{source}\t{target}\t{fs_type}\t{options}\t{dump}\t{pass}");
}
