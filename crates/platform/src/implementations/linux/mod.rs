//! Linux-specific platform implementation

pub mod filesystem;
pub mod mount;
pub mod process;

/// Linux platform implementation
pub struct LinuxPlatform;

impl LinuxPlatform {
    /// Create a new Linux platform instance
    #[allow(clippy::new_ret_no_self)]
    #[must_use]
    pub fn new() -> crate::core::Platform {
        use filesystem::LinuxFilesystemOperations;
        use mount::LinuxMountOperations;
        use process::LinuxProcessOperations;

        crate::core::Platform::new(
            Box::new(LinuxFilesystemOperations::new()),
            Box::new(LinuxMountOperations::new()),
            Box::new(LinuxProcessOperations::new()),
        )
    }
}

/// Milliseconds elapsed, saturating
pub(crate) fn duration_to_millis(duration: std::time::Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
