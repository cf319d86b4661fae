//! Mount table parsing and recursive unmount ordering

use abroot_errors::{DiskError, Error};
use abroot_platform::{Platform, PlatformContext};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Mount chains deeper than this are treated as a corrupted mount table
pub const MAX_MOUNT_DEPTH: usize = 1000;

const MOUNTINFO: &str = "/proc/self/mountinfo";

/// One line of `/proc/self/mountinfo`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountRecord {
    pub id: u64,
    pub parent_id: u64,
    pub mount_point: PathBuf,
}

/// Parse the mount table
///
/// # Errors
///
/// Returns `DiskError::InvalidMountInfo` for a line missing its id, parent
/// id or mount point fields.
pub fn parse_mountinfo(input: &str) -> Result<Vec<MountRecord>, DiskError> {
    input
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(parse_line)
        .collect()
}

fn parse_line(line: &str) -> Result<MountRecord, DiskError> {
    let invalid = || DiskError::InvalidMountInfo {
        line: line.to_string(),
    };
    let mut fields = line.split_whitespace();
    let id = fields.next().and_then(|f| f.parse().ok()).ok_or_else(invalid)?;
    let parent_id = fields.next().and_then(|f| f.parse().ok()).ok_or_else(invalid)?;
    // major:minor, root, then the mount point
    let mount_point = fields.nth(2).ok_or_else(invalid)?;
    Ok(MountRecord {
        id,
        parent_id,
        mount_point: PathBuf::from(unescape_mount_field(mount_point)),
    })
}

/// Decode the octal escapes (`\040` for space) the kernel uses in mount fields
fn unescape_mount_field(value: &str) -> String {
    let bytes = value.as_bytes();
    let mut output = Vec::with_capacity(bytes.len());
    let mut index = 0;

    while index < bytes.len() {
        if bytes[index] == b'\\' {
            if let Some(num) = value
                .get(index + 1..index + 4)
                .filter(|o| o.bytes().all(|b| (b'0'..=b'7').contains(&b)))
                .and_then(|o| u8::from_str_radix(o, 8).ok())
            {
                output.push(num);
                index += 4;
                continue;
            }
        }
        output.push(bytes[index]);
        index += 1;
    }

    String::from_utf8_lossy(&output).into_owned()
}

/// Mount points to unmount, children before parents, to release `target`
///
/// Every record mounted at `target` is a root; its descendants come from the
/// parent-id links. When nothing is mounted below `target` the result is the
/// single direct unmount of `target` itself.
///
/// # Errors
///
/// Returns `DiskError::MountChainTooDeep` when a chain passes
/// [`MAX_MOUNT_DEPTH`] levels.
pub fn unmount_order(records: &[MountRecord], target: &Path) -> Result<Vec<PathBuf>, DiskError> {
    let mut children: HashMap<u64, Vec<&MountRecord>> = HashMap::new();
    for record in records {
        if record.id != record.parent_id {
            children.entry(record.parent_id).or_default().push(record);
        }
    }

    let roots: Vec<&MountRecord> = records
        .iter()
        .filter(|r| r.mount_point == target)
        // A mount stacked on another mount at the same point is reached from below
        .filter(|r| {
            !records
                .iter()
                .any(|p| p.id == r.parent_id && p.mount_point == target)
        })
        .collect();

    let mut order = Vec::new();
    for root in roots {
        collect_post_order(root, &children, 0, target, &mut order)?;
    }

    if order.is_empty() {
        order.push(target.to_path_buf());
    }
    Ok(order)
}

fn collect_post_order(
    record: &MountRecord,
    children: &HashMap<u64, Vec<&MountRecord>>,
    depth: usize,
    target: &Path,
    out: &mut Vec<PathBuf>,
) -> Result<(), DiskError> {
    if depth > MAX_MOUNT_DEPTH {
        return Err(DiskError::MountChainTooDeep {
            mount_point: target.display().to_string(),
            limit: MAX_MOUNT_DEPTH,
        });
    }
    if let Some(kids) = children.get(&record.id) {
        // Later mounts shadow earlier ones, so unmount them first
        for child in kids.iter().rev() {
            collect_post_order(child, children, depth + 1, target, out)?;
        }
    }
    out.push(record.mount_point.clone());
    Ok(())
}

/// Read the live mount table
///
/// # Errors
///
/// Returns an error if `/proc/self/mountinfo` is unreadable or malformed.
pub async fn read_mount_table() -> Result<Vec<MountRecord>, DiskError> {
    let text = tokio::fs::read_to_string(MOUNTINFO)
        .await
        .map_err(|e| DiskError::InvalidMountInfo {
            line: format!("{MOUNTINFO}: {e}"),
        })?;
    parse_mountinfo(&text)
}

/// Whether something is mounted exactly at `path`
///
/// # Errors
///
/// Returns an error if the mount table cannot be read.
pub async fn is_mount_point(path: &Path) -> Result<bool, DiskError> {
    let resolved = match tokio::fs::canonicalize(path).await {
        Ok(p) => p,
        Err(_) => return Ok(false),
    };
    let records = read_mount_table().await?;
    Ok(records.iter().any(|r| r.mount_point == resolved))
}

/// Unmount `mount_point` and everything beneath it, children first
///
/// Returns the number of unmounts performed.
///
/// # Errors
///
/// Returns `DiskError::UnmountFailed` on the first refused unmount and
/// `DiskError::MountChainTooDeep` for a corrupted mount table.
pub async fn unmount_tree(
    platform: &Platform,
    ctx: &PlatformContext,
    mount_point: &Path,
    detach: bool,
) -> Result<usize, Error> {
    let target = tokio::fs::canonicalize(mount_point)
        .await
        .unwrap_or_else(|_| mount_point.to_path_buf());
    let records = read_mount_table().await?;
    let order = unmount_order(&records, &target)?;
    tracing::debug!(target = %target.display(), mounts = order.len(), "unmounting recursively");

    for path in &order {
        platform
            .mount()
            .unmount(ctx, path, detach)
            .await
            .map_err(|e| DiskError::UnmountFailed {
                mount_point: path.display().to_string(),
                message: e.to_string(),
            })?;
    }
    Ok(order.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
22 1 259:3 / / rw,relatime shared:1 - btrfs /dev/nvme0n1p3 rw
23 22 0:5 / /proc rw,nosuid - proc proc rw
40 22 259:4 / /part-future rw,relatime - btrfs /dev/nvme0n1p4 rw
41 40 0:6 / /part-future/dev rw - devtmpfs udev rw
42 41 0:7 / /part-future/dev/pts rw - devpts devpts rw
43 40 0:5 / /part-future/proc rw - proc proc rw
44 22 0:30 / /mnt/with\\040space rw - tmpfs tmpfs rw
";

    fn record(id: u64, parent_id: u64, mount_point: &str) -> MountRecord {
        MountRecord {
            id,
            parent_id,
            mount_point: PathBuf::from(mount_point),
        }
    }

    #[test]
    fn parses_ids_and_unescapes_mount_points() {
        let records = parse_mountinfo(SAMPLE).unwrap();
        assert_eq!(records.len(), 7);
        assert_eq!(records[2], record(40, 22, "/part-future"));
        assert_eq!(records[6].mount_point, PathBuf::from("/mnt/with space"));
    }

    #[test]
    fn rejects_truncated_lines() {
        assert!(parse_mountinfo("12 1 0:1").is_err());
        assert!(parse_mountinfo("x 1 0:1 / / rw - ext4 /dev/x rw").is_err());
    }

    #[test]
    fn children_unmount_before_parents() {
        let records = parse_mountinfo(SAMPLE).unwrap();
        let order = unmount_order(&records, Path::new("/part-future")).unwrap();
        assert_eq!(
            order,
            vec![
                PathBuf::from("/part-future/proc"),
                PathBuf::from("/part-future/dev/pts"),
                PathBuf::from("/part-future/dev"),
                PathBuf::from("/part-future"),
            ]
        );
    }

    #[test]
    fn unknown_target_falls_back_to_direct_unmount() {
        let records = parse_mountinfo(SAMPLE).unwrap();
        let order = unmount_order(&records, Path::new("/does/not/exist")).unwrap();
        assert_eq!(order, vec![PathBuf::from("/does/not/exist")]);
    }

    #[test]
    fn stacked_mounts_unmount_top_first() {
        let records = vec![
            record(1, 0, "/"),
            record(10, 1, "/mnt"),
            record(11, 10, "/mnt"),
            record(12, 11, "/mnt/inner"),
        ];
        let order = unmount_order(&records, Path::new("/mnt")).unwrap();
        assert_eq!(
            order,
            vec![
                PathBuf::from("/mnt/inner"),
                PathBuf::from("/mnt"),
                PathBuf::from("/mnt"),
            ]
        );
    }

    #[test]
    fn pathological_chain_is_rejected() {
        let mut records = vec![record(1, 0, "/deep")];
        for id in 2..=(MAX_MOUNT_DEPTH as u64 + 5) {
            records.push(record(id, id - 1, &format!("/deep/{id}")));
        }
        let err = unmount_order(&records, Path::new("/deep")).unwrap_err();
        assert!(matches!(err, DiskError::MountChainTooDeep { .. }));
    }
}
