//! Kernel discovery inside a staged slot

use abroot_config::fixed_paths;
use abroot_errors::{BootError, Error};
use std::cmp::Ordering;
use std::path::Path;

const KERNEL_PREFIX: &str = "vmlinuz-";

/// Newest kernel version shipped in `<root>/.system/boot`
///
/// # Errors
///
/// Returns `BootError::KernelNotFound` when the directory is unreadable or
/// holds no `vmlinuz-*` file.
pub async fn discover_kernel(root: &Path) -> Result<String, Error> {
    let boot_dir = root.join(fixed_paths::SYSTEM_DIR).join("boot");
    let not_found = || BootError::KernelNotFound {
        path: boot_dir.display().to_string(),
    };

    let mut entries = tokio::fs::read_dir(&boot_dir)
        .await
        .map_err(|_| not_found())?;
    let mut newest: Option<String> = None;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        let Some(version) = name
            .to_str()
            .and_then(|n| n.strip_prefix(KERNEL_PREFIX))
            .filter(|v| !v.is_empty())
        else {
            continue;
        };
        let replace = newest
            .as_deref()
            .map_or(true, |current| compare_kernel_versions(version, current).is_gt());
        if replace {
            newest = Some(version.to_string());
        }
    }

    let version = newest.ok_or_else(not_found)?;
    tracing::debug!(root = %root.display(), %version, "discovered kernel");
    Ok(version)
}

/// Natural order of kernel version strings
///
/// Digit runs compare numerically, everything else bytewise, so
/// `6.10.0` sorts after `6.9.2`.
#[must_use]
pub fn compare_kernel_versions(a: &str, b: &str) -> Ordering {
    let mut left = chunks(a);
    let mut right = chunks(b);
    loop {
        match (left.next(), right.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(l), Some(r)) => {
                let ordering = match (l.parse::<u64>(), r.parse::<u64>()) {
                    (Ok(l), Ok(r)) => l.cmp(&r),
                    _ => l.cmp(r),
                };
                if ordering.is_ne() {
                    return ordering;
                }
            }
        }
    }
}

/// Split into alternating digit and non-digit runs
fn chunks(s: &str) -> impl Iterator<Item = &str> {
    let mut rest = s;
    std::iter::from_fn(move || {
        let first = rest.chars().next()?;
        let digits = first.is_ascii_digit();
        let end = rest
            .find(|c: char| c.is_ascii_digit() != digits)
            .unwrap_or(rest.len());
        let (chunk, tail) = rest.split_at(end);
        rest = tail;
        Some(chunk)
    })
}
