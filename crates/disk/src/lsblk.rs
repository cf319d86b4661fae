//! `lsblk -J` decoding

use abroot_errors::DiskError;
use serde::Deserialize;

use crate::partition::{device_path, Partition, PartitionTable};

/// Columns requested from `lsblk`
pub(crate) const LSBLK_COLUMNS: &str = "NAME,FSTYPE,LABEL,MOUNTPOINT,UUID";

#[derive(Debug, Deserialize)]
struct LsblkResponse {
    #[serde(default)]
    blockdevices: Vec<BlockDevice>,
}

#[derive(Debug, Deserialize)]
struct BlockDevice {
    name: String,
    #[serde(default)]
    fstype: Option<String>,
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    mountpoint: Option<String>,
    #[serde(default)]
    uuid: Option<String>,
    #[serde(default)]
    children: Vec<BlockDevice>,
}

/// Parse `lsblk -J -o NAME,FSTYPE,LABEL,MOUNTPOINT,UUID` output
///
/// Top-level disks are not partitions and are left out; their direct
/// children have no parent. Deeper devices point at the device that
/// immediately encloses them. `filter` keeps a single top-level disk when
/// non-empty.
///
/// # Errors
///
/// Returns `DiskError::InvalidListing` when the JSON does not decode. No
/// partial table is returned.
pub fn parse_lsblk(json: &[u8], filter: &str) -> Result<PartitionTable, DiskError> {
    let response: LsblkResponse =
        serde_json::from_slice(json).map_err(|e| DiskError::InvalidListing {
            message: e.to_string(),
        })?;

    let mut partitions = Vec::new();
    for disk in response
        .blockdevices
        .iter()
        .filter(|d| filter.is_empty() || d.name == filter)
    {
        for child in &disk.children {
            flatten(child, None, &mut partitions);
        }
    }
    Ok(PartitionTable::new(partitions))
}

fn flatten(device: &BlockDevice, parent: Option<usize>, out: &mut Vec<Partition>) {
    let index = out.len();
    out.push(Partition {
        name: device.name.clone(),
        label: device.label.clone().unwrap_or_default(),
        mount_point: device
            .mountpoint
            .as_deref()
            .filter(|m| !m.is_empty())
            .map(Into::into),
        mount_options: String::new(),
        uuid: device.uuid.clone().unwrap_or_default(),
        fs_type: device.fstype.clone().unwrap_or_default(),
        device: device_path(&device.name, parent.is_some()),
        parent,
    });
    for child in &device.children {
        flatten(child, Some(index), out);
    }
}
