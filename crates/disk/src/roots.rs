//! Present and future slot resolution

use abroot_config::PartitionsConfig;
use abroot_errors::DiskError;
use abroot_types::SlotId;
use std::path::Path;

use crate::partition::{Partition, PartitionTable};

/// A root slot partition together with its slot identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotPartition {
    pub slot: SlotId,
    pub label: String,
    pub partition: Partition,
}

/// Both root slots, classified relative to the running system
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootPair {
    pub present: SlotPartition,
    pub future: SlotPartition,
}

fn slot_partition(
    table: &PartitionTable,
    slot: SlotId,
    label: &str,
) -> Result<SlotPartition, DiskError> {
    let partition = table
        .by_label(label)
        .cloned()
        .ok_or_else(|| DiskError::LabelNotFound {
            label: label.to_string(),
        })?;
    Ok(SlotPartition {
        slot,
        label: label.to_string(),
        partition,
    })
}

/// Classify the two slot partitions
///
/// The slot mounted at `host_root` is present, the other is future.
///
/// # Errors
///
/// Returns `DiskError::LabelNotFound` when a slot label is missing from the
/// table and `DiskError::PresentRootNotFound` when neither slot is mounted at
/// `host_root`.
pub fn resolve_roots(
    table: &PartitionTable,
    labels: &PartitionsConfig,
    host_root: &Path,
) -> Result<RootPair, DiskError> {
    let a = slot_partition(table, SlotId::A, &labels.label_a)?;
    let b = slot_partition(table, SlotId::B, &labels.label_b)?;

    if a.partition.is_mounted_at(host_root) {
        Ok(RootPair {
            present: a,
            future: b,
        })
    } else if b.partition.is_mounted_at(host_root) {
        Ok(RootPair {
            present: b,
            future: a,
        })
    } else {
        Err(DiskError::PresentRootNotFound {
            mount_point: host_root.display().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partition::device_path;
    use std::path::PathBuf;

    fn part(name: &str, label: &str, mount: Option<&str>) -> Partition {
        Partition {
            name: name.into(),
            label: label.into(),
            mount_point: mount.map(PathBuf::from),
            mount_options: String::new(),
            uuid: format!("uuid-{name}"),
            fs_type: "btrfs".into(),
            device: device_path(name, false),
            parent: None,
        }
    }

    #[test]
    fn slot_mounted_at_root_is_present() {
        let table = PartitionTable::new(vec![
            part("sda2", "vos-a", None),
            part("sda3", "vos-b", Some("/")),
        ]);
        let pair = resolve_roots(&table, &PartitionsConfig::default(), Path::new("/")).unwrap();
        assert_eq!(pair.present.slot, SlotId::B);
        assert_eq!(pair.future.slot, SlotId::A);
        assert_eq!(pair.future.partition.name, "sda2");
    }

    #[test]
    fn missing_label_is_reported() {
        let table = PartitionTable::new(vec![part("sda2", "vos-a", Some("/"))]);
        let err = resolve_roots(&table, &PartitionsConfig::default(), Path::new("/")).unwrap_err();
        assert!(matches!(err, DiskError::LabelNotFound { label } if label == "vos-b"));
    }

    #[test]
    fn unmounted_slots_are_an_error() {
        let table = PartitionTable::new(vec![
            part("sda2", "vos-a", None),
            part("sda3", "vos-b", None),
        ]);
        let err = resolve_roots(&table, &PartitionsConfig::default(), Path::new("/")).unwrap_err();
        assert!(matches!(err, DiskError::PresentRootNotFound { .. }));
    }
}
