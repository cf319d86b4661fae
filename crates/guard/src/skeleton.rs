//! Expected layout of a root slot

use abroot_config::fixed_paths;
use std::path::{Component, Path, PathBuf};

/// Top-level entries that are symlinks into the hidden system tree
pub const STANDARD_LINKS: &[&str] = &[
    "bin", "etc", "lib", "lib32", "lib64", "libx32", "sbin", "usr",
];

/// Root-level directories every slot needs (mount points and state)
pub const ROOT_PATHS: &[&str] = &[
    "boot",
    "dev",
    "home",
    "media",
    "mnt",
    "opt",
    "part-future",
    "proc",
    "root",
    "run",
    "srv",
    "sys",
    "tmp",
    "var",
];

/// Writable `/etc` upper and work directories for both slots
#[must_use]
pub fn etc_paths() -> Vec<PathBuf> {
    let base = Path::new(fixed_paths::ETC_STATE_DIR);
    ["a", "b", "a-work", "b-work"]
        .iter()
        .map(|name| base.join(name))
        .collect()
}

/// Symlink target for a slot-relative `link`, pointing at the same path
/// under the system tree
///
/// `bin` becomes `.system/bin`, `usr/local/bin` becomes
/// `../../.system/usr/local/bin`.
#[must_use]
pub fn relative_link_target(link: &Path) -> PathBuf {
    let depth = link
        .components()
        .filter(|c| matches!(c, Component::Normal(_)))
        .count()
        .saturating_sub(1);

    let mut target = PathBuf::new();
    for _ in 0..depth {
        target.push("..");
    }
    target.push(fixed_paths::SYSTEM_DIR);
    for component in link.components() {
        if let Component::Normal(part) = component {
            target.push(part);
        }
    }
    target
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn top_level_links_point_into_system_tree() {
        assert_eq!(relative_link_target(Path::new("bin")), PathBuf::from(".system/bin"));
        assert_eq!(relative_link_target(Path::new("/usr")), PathBuf::from(".system/usr"));
    }

    #[test]
    fn nested_links_climb_to_the_root() {
        assert_eq!(
            relative_link_target(Path::new("usr/local/bin")),
            PathBuf::from("../../.system/usr/local/bin")
        );
    }

    #[test]
    fn etc_paths_cover_both_slots() {
        let paths = etc_paths();
        assert_eq!(paths.len(), 4);
        assert!(paths.contains(&PathBuf::from("var/lib/abroot/etc/a-work")));
    }
}
