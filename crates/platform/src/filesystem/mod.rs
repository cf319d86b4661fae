//! Filesystem operations for Linux root slots (rename-exchange, mirroring)

use abroot_errors::PlatformError;
use async_trait::async_trait;
use std::path::Path;

use crate::core::PlatformContext;

/// Counters reported by [`FilesystemOperations::mirror_directory`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MirrorStats {
    pub directories: u64,
    pub files_copied: u64,
    pub files_unchanged: u64,
    pub links: u64,
    /// Further names of an already copied inode, recreated as hard links
    pub hard_links: u64,
    pub special: u64,
    pub removed: u64,
}

#[async_trait]
pub trait FilesystemOperations: Send + Sync {
    /// Atomically swap two existing paths
    ///
    /// On success each path resolves to the other's former entry. On failure
    /// neither path changes.
    async fn atomic_swap(
        &self,
        ctx: &PlatformContext,
        path_a: &Path,
        path_b: &Path,
    ) -> Result<(), PlatformError>;

    /// Atomically rename a file over its destination
    async fn atomic_rename(
        &self,
        ctx: &PlatformContext,
        src: &Path,
        dst: &Path,
    ) -> Result<(), PlatformError>;

    /// Make `dst` an exact copy of `src`, deleting entries only `dst` has
    ///
    /// Ownership, permissions, modification times, extended attributes,
    /// symlinks, hard links and device nodes are preserved. Sockets are
    /// skipped.
    async fn mirror_directory(
        &self,
        ctx: &PlatformContext,
        src: &Path,
        dst: &Path,
    ) -> Result<MirrorStats, PlatformError>;

    /// Create directory and all parent directories
    async fn create_dir_all(&self, ctx: &PlatformContext, path: &Path)
        -> Result<(), PlatformError>;

    /// Remove directory and all contents; a missing directory is not an error
    async fn remove_dir_all(&self, ctx: &PlatformContext, path: &Path)
        -> Result<(), PlatformError>;

    /// Check if a path exists (without following a final symlink)
    async fn exists(&self, ctx: &PlatformContext, path: &Path) -> bool;

    /// Remove a single file
    async fn remove_file(&self, ctx: &PlatformContext, path: &Path) -> Result<(), PlatformError>;

    /// Check if a path points to a directory.
    async fn is_dir(&self, ctx: &PlatformContext, path: &Path) -> bool;
}
