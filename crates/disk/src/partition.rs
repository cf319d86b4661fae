//! Partition arena

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A block device that can hold a filesystem
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partition {
    /// Kernel name (`nvme0n1p2`, `luks-1234`, `vos--var-var`)
    pub name: String,
    pub label: String,
    pub mount_point: Option<PathBuf>,
    pub mount_options: String,
    pub uuid: String,
    pub fs_type: String,
    /// Absolute device node
    pub device: PathBuf,
    /// Index of the enclosing device inside the owning [`PartitionTable`]
    pub parent: Option<usize>,
}

impl Partition {
    /// LUKS containers report `crypto_LUKS`
    #[must_use]
    pub fn is_encrypted(&self) -> bool {
        self.fs_type.starts_with("crypto_")
    }

    /// Device-mapper children (unlocked LUKS, LVM volumes) have a parent
    #[must_use]
    pub fn is_device_mapper(&self) -> bool {
        self.parent.is_some()
    }

    #[must_use]
    pub fn is_mounted_at(&self, path: &Path) -> bool {
        self.mount_point.as_deref() == Some(path)
    }
}

/// Device node for a kernel name
#[must_use]
pub fn device_path(name: &str, device_mapper: bool) -> PathBuf {
    if device_mapper {
        PathBuf::from("/dev/mapper").join(name)
    } else {
        PathBuf::from("/dev").join(name)
    }
}

/// Flattened partitions in depth-first enumeration order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionTable {
    partitions: Vec<Partition>,
}

impl PartitionTable {
    #[must_use]
    pub fn new(partitions: Vec<Partition>) -> Self {
        Self { partitions }
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Partition> {
        self.partitions.get(index)
    }

    /// The enclosing device of the partition at `index`
    #[must_use]
    pub fn parent_of(&self, index: usize) -> Option<&Partition> {
        self.get(index)?.parent.and_then(|p| self.get(p))
    }

    /// Indices of the devices directly enclosed by `index`
    #[must_use]
    pub fn children_of(&self, index: usize) -> Vec<usize> {
        self.partitions
            .iter()
            .enumerate()
            .filter(|(_, p)| p.parent == Some(index))
            .map(|(i, _)| i)
            .collect()
    }

    /// First partition carrying `label`, in enumeration order
    #[must_use]
    pub fn position_by_label(&self, label: &str) -> Option<usize> {
        self.partitions.iter().position(|p| p.label == label)
    }

    #[must_use]
    pub fn by_label(&self, label: &str) -> Option<&Partition> {
        self.position_by_label(label).and_then(|i| self.get(i))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Partition> {
        self.partitions.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.partitions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.partitions.is_empty()
    }

    #[must_use]
    pub fn into_inner(self) -> Vec<Partition> {
        self.partitions
    }
}
