//! Platform abstraction layer for Linux root-slot operations.
//!
//! This crate provides a unified interface for platform-specific operations including:
//! - Filesystem operations (rename-exchange, atomic rename, directory mirroring)
//! - Mount operations (plain, bind and overlay mounts, unmount)
//! - Process execution with proper event emission and error handling
//!
//! Every operation reports through the caller's `PlatformContext` so front ends can
//! observe syscalls and external tools without the library printing anything.

pub mod core;
pub mod filesystem;
pub mod fs;
pub mod implementations;
pub mod mount;
pub mod process;

pub use core::{Platform, PlatformContext};
pub use implementations::linux::LinuxPlatform;

/// Re-export commonly used types
pub use filesystem::{FilesystemOperations, MirrorStats};
pub use mount::{MountOperations, MountRequest};
pub use process::{CommandOutput, PlatformCommand, ProcessOperations};
