#![allow(clippy::module_name_repetitions)]

//! Filesystem convenience helpers backed by the platform abstraction.
//!
//! These functions provide a stable API returning `abroot_errors::Error` for
//! callers that have no event context to thread through.

use crate::core::Platform;
use abroot_errors::Error;
use std::path::Path;

/// Result type for filesystem operations
pub type Result<T> = std::result::Result<T, abroot_errors::Error>;

/// True atomic swap that requires both paths to exist
///
/// Uses `renameat2(RENAME_EXCHANGE)`, so at every instant each path names a
/// complete entry. Fails without touching either path when the kernel or the
/// filesystem cannot exchange them (e.g. across mount points).
///
/// # Errors
///
/// Returns an error if:
/// - Either path doesn't exist
/// - The exchange is refused by the kernel
pub async fn atomic_swap(path_a: &Path, path_b: &Path) -> Result<()> {
    let platform = Platform::current();
    let context = platform.create_context(None);

    platform
        .filesystem()
        .atomic_swap(&context, path_a, path_b)
        .await
        .map_err(Error::from)
}

/// Atomic rename over an existing destination
///
/// # Errors
///
/// Returns an error if the rename fails (permissions, cross-device, etc.)
pub async fn atomic_rename(src: &Path, dst: &Path) -> Result<()> {
    let platform = Platform::current();
    let context = platform.create_context(None);

    platform
        .filesystem()
        .atomic_rename(&context, src, dst)
        .await
        .map_err(Error::from)
}

/// Publish `contents` at `path`
///
/// The bytes are written and synced to a sibling temporary file first. When
/// `path` already exists the two entries are exchanged and the old content is
/// discarded; otherwise the temporary file is renamed into place.
///
/// # Errors
///
/// Returns an error if the temporary file cannot be written or published.
pub async fn publish_file(path: &Path, contents: &[u8]) -> Result<()> {
    let tmp = temp_sibling(path);
    write_synced(&tmp, contents).await?;

    let published = if tokio::fs::symlink_metadata(path).await.is_ok() {
        match atomic_swap(&tmp, path).await {
            Ok(()) => {
                remove_file(&tmp).await?;
                Ok(())
            }
            Err(e) => Err(e),
        }
    } else {
        atomic_rename(&tmp, path).await
    };

    if published.is_err() {
        let _ = tokio::fs::remove_file(&tmp).await;
    }
    published
}

/// Write a file through a temporary sibling and a rename
///
/// # Errors
///
/// Returns an error if the temporary file cannot be written or renamed.
pub async fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let tmp = temp_sibling(path);
    write_synced(&tmp, contents).await?;
    if let Err(e) = atomic_rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e);
    }
    Ok(())
}

/// Create directory and all parent directories
///
/// # Errors
///
/// Returns an error if the directory cannot be created.
pub async fn create_dir_all(path: &Path) -> Result<()> {
    tokio::fs::create_dir_all(path)
        .await
        .map_err(|e| Error::io_with_path(&e, path))
}

/// Remove a directory tree, treating a missing directory as success
///
/// # Errors
///
/// Returns an error if the directory exists but cannot be removed.
pub async fn remove_dir_all(path: &Path) -> Result<()> {
    match tokio::fs::remove_dir_all(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::io_with_path(&e, path)),
    }
}

/// Remove a file, treating a missing file as success
///
/// # Errors
///
/// Returns an error if the file exists but cannot be removed.
pub async fn remove_file(path: &Path) -> Result<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::io_with_path(&e, path)),
    }
}

/// Check whether a path exists without following a final symlink
pub async fn exists(path: &Path) -> bool {
    tokio::fs::symlink_metadata(path).await.is_ok()
}

fn temp_sibling(path: &Path) -> std::path::PathBuf {
    let name = path
        .file_name()
        .map_or_else(|| "abroot".into(), |n| n.to_string_lossy().into_owned());
    path.with_file_name(format!(".{name}.{}.tmp", std::process::id()))
}

async fn write_synced(path: &Path, contents: &[u8]) -> Result<()> {
    use tokio::io::AsyncWriteExt;

    if let Some(parent) = path.parent() {
        create_dir_all(parent).await?;
    }
    let mut file = tokio::fs::File::create(path)
        .await
        .map_err(|e| Error::io_with_path(&e, path))?;
    file.write_all(contents)
        .await
        .map_err(|e| Error::io_with_path(&e, path))?;
    file.sync_all()
        .await
        .map_err(|e| Error::io_with_path(&e, path))?;
    Ok(())
}
