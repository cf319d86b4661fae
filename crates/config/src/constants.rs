//! Centralized, non-configurable filesystem paths for abroot
//!
//! Slot-relative paths are joined onto a root slot mount point; the rest are
//! absolute host paths. The `[paths]` section of the configuration can
//! override the host paths for testing and dry runs.

pub const LOCK_PATH: &str = "/tmp/ABSystem.Upgrade.lock";

pub const STATE_DIR: &str = "/etc/abroot";
pub const CONFIG_FILE: &str = "/etc/abroot/abroot.toml";
pub const KARGS_FILE: &str = "/etc/abroot/kargs";

pub const OVERLAY_DIR: &str = "/var/lib/abroot/overlay";
pub const DRY_RUN_DIR: &str = "/tmp/abroot-dry-run";

/// Slot-relative image record
pub const ABIMAGE_FILE: &str = "abimage.abr";
/// Slot-relative hidden system tree
pub const SYSTEM_DIR: &str = ".system";
/// Slot-relative writable `/etc` state
pub const ETC_STATE_DIR: &str = "var/lib/abroot/etc";

pub const PACKAGES_ADD_FILE: &str = "packages.add";
pub const PACKAGES_REMOVE_FILE: &str = "packages.remove";
pub const PACKAGES_SUMMARY_FILE: &str = "packages.summary";
/// Slot-relative directory holding the applied package summary
pub const PACKAGES_SUMMARY_DIR: &str = "usr/share/abroot";

pub const GRUB_CONFIG: &str = "/boot/grub/grub.cfg";
pub const FUTURE_MOUNT_POINT: &str = "/part-future";

pub const DEFAULT_KARGS: &str = "quiet splash bgrt_disable $vt_handoff";
