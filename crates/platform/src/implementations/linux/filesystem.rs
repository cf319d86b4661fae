//! Linux filesystem operations implementation
//!
//! Blocking syscalls run on the tokio blocking pool; every operation emits a
//! started event and a completed or failed event through the context.

use abroot_errors::PlatformError;
use abroot_events::{AppEvent, PlatformEvent};
use async_trait::async_trait;
use nix::fcntl::{renameat2, RenameFlags};
use nix::sys::stat::{mknod, Mode, SFlag};
use std::collections::HashMap;
use std::ffi::OsString;
use std::fs;
use std::io::Read;
use std::os::unix::fs::{lchown, FileTypeExt, MetadataExt, PermissionsExt};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use walkdir::WalkDir;

use super::duration_to_millis;
use crate::core::PlatformContext;
use crate::filesystem::{FilesystemOperations, MirrorStats};

/// Linux implementation of filesystem operations
pub struct LinuxFilesystemOperations;

impl LinuxFilesystemOperations {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Default for LinuxFilesystemOperations {
    fn default() -> Self {
        Self::new()
    }
}

fn emit_fs_started(ctx: &PlatformContext, operation: &str, source: Option<&Path>, target: &Path) {
    ctx.emit_event(AppEvent::Platform(PlatformEvent::FilesystemOperationStarted {
        operation: operation.to_string(),
        source: source.map(|p| p.display().to_string()),
        target: target.display().to_string(),
    }));
}

fn emit_fs_completed(ctx: &PlatformContext, operation: &str, paths: &[&Path], duration: Duration) {
    ctx.emit_event(AppEvent::Platform(
        PlatformEvent::FilesystemOperationCompleted {
            operation: operation.to_string(),
            paths: paths.iter().map(|p| p.display().to_string()).collect(),
            duration_ms: duration_to_millis(duration),
        },
    ));
}

fn emit_fs_failed(
    ctx: &PlatformContext,
    operation: &str,
    paths: &[&Path],
    error: &PlatformError,
    duration: Duration,
) {
    ctx.emit_event(AppEvent::Platform(PlatformEvent::FilesystemOperationFailed {
        operation: operation.to_string(),
        paths: paths.iter().map(|p| p.display().to_string()).collect(),
        error_message: error.to_string(),
        duration_ms: duration_to_millis(duration),
    }));
}

fn report<T>(
    ctx: &PlatformContext,
    operation: &str,
    paths: &[&Path],
    start: Instant,
    result: &Result<T, PlatformError>,
) {
    let duration = start.elapsed();
    match result {
        Ok(_) => emit_fs_completed(ctx, operation, paths, duration),
        Err(e) => emit_fs_failed(ctx, operation, paths, e, duration),
    }
}

async fn blocking<T, F>(operation: &'static str, f: F) -> Result<T, PlatformError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, PlatformError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| PlatformError::FilesystemOperationFailed {
            operation: operation.to_string(),
            message: format!("{operation} task failed: {e}"),
        })?
}

fn io_err(operation: &str, path: &Path, err: &std::io::Error) -> PlatformError {
    PlatformError::FilesystemOperationFailed {
        operation: operation.to_string(),
        message: format!("{}: {err}", path.display()),
    }
}

/// Exchange two directory entries with `renameat2(RENAME_EXCHANGE)`
fn exchange_paths(path_a: &Path, path_b: &Path) -> Result<(), PlatformError> {
    // Both entries must exist; the kernel would report ENOENT but the
    // message is clearer with the offending path attached.
    for path in [path_a, path_b] {
        fs::symlink_metadata(path).map_err(|e| io_err("atomic_swap", path, &e))?;
    }

    renameat2(None, path_a, None, path_b, RenameFlags::RENAME_EXCHANGE).map_err(|errno| {
        PlatformError::FilesystemOperationFailed {
            operation: "atomic_swap".to_string(),
            message: format!(
                "exchange of {} and {} failed: {}",
                path_a.display(),
                path_b.display(),
                errno.desc()
            ),
        }
    })
}

fn remove_any(path: &Path) -> std::io::Result<()> {
    let meta = fs::symlink_metadata(path)?;
    if meta.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
}

/// Owner, mode, then extended attributes
///
/// Extended attributes go last: a `chown` drops `security.capability`.
fn copy_metadata(
    meta: &fs::Metadata,
    src: &Path,
    dst: &Path,
    is_link: bool,
) -> std::io::Result<()> {
    lchown(dst, Some(meta.uid()), Some(meta.gid()))?;
    if !is_link {
        fs::set_permissions(dst, fs::Permissions::from_mode(meta.mode() & 0o7777))?;
    }
    copy_xattrs(src, dst)
}

/// Make the extended attributes of `dst` equal to those of `src`, without
/// following symlinks
fn copy_xattrs(src: &Path, dst: &Path) -> std::io::Result<()> {
    let names: Vec<OsString> = match xattr::list(src) {
        Ok(names) => names.collect(),
        Err(e) if e.kind() == std::io::ErrorKind::Unsupported => return Ok(()),
        Err(e) => return Err(e),
    };
    match xattr::list(dst) {
        Ok(existing) => {
            for name in existing.filter(|name| !names.contains(name)) {
                xattr::remove(dst, &name)?;
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::Unsupported && names.is_empty() => {}
        Err(e) => return Err(e),
    }
    for name in &names {
        if let Some(value) = xattr::get(src, name)? {
            xattr::set(dst, name, &value)?;
        }
    }
    Ok(())
}

/// Quick check on size, mtime and mode, confirmed by comparing content
fn unchanged(src_meta: &fs::Metadata, src: &Path, dst: &Path) -> std::io::Result<bool> {
    let Ok(dst_meta) = fs::symlink_metadata(dst) else {
        return Ok(false);
    };
    let quick = dst_meta.is_file()
        && dst_meta.len() == src_meta.len()
        && dst_meta.mtime() == src_meta.mtime()
        && dst_meta.mtime_nsec() == src_meta.mtime_nsec()
        && dst_meta.mode() == src_meta.mode();
    if !quick {
        return Ok(false);
    }
    same_content(src, dst)
}

fn same_content(a: &Path, b: &Path) -> std::io::Result<bool> {
    const CHUNK: usize = 64 * 1024;
    let mut a = fs::File::open(a)?;
    let mut b = fs::File::open(b)?;
    let mut buf_a = vec![0u8; CHUNK];
    let mut buf_b = vec![0u8; CHUNK];
    loop {
        let n = read_full(&mut a, &mut buf_a)?;
        if n != read_full(&mut b, &mut buf_b)? || buf_a[..n] != buf_b[..n] {
            return Ok(false);
        }
        if n == 0 {
            return Ok(true);
        }
    }
}

/// Fill `buf` unless the file ends first
fn read_full(file: &mut fs::File, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match file.read(&mut buf[filled..])? {
            0 => break,
            n => filled += n,
        }
    }
    Ok(filled)
}

/// Destination of the first copy of each multiply-linked source inode
type LinkMap = HashMap<(u64, u64), PathBuf>;

fn mirror_entry(
    src_meta: &fs::Metadata,
    src_path: &Path,
    dst_path: &Path,
    links: &mut LinkMap,
    stats: &mut MirrorStats,
) -> std::io::Result<()> {
    let file_type = src_meta.file_type();
    let existing = fs::symlink_metadata(dst_path).ok();

    if file_type.is_dir() {
        match existing {
            Some(m) if m.is_dir() => {}
            Some(_) => {
                fs::remove_file(dst_path)?;
                fs::create_dir(dst_path)?;
            }
            None => fs::create_dir(dst_path)?,
        }
        copy_metadata(src_meta, src_path, dst_path, false)?;
        stats.directories += 1;
    } else if file_type.is_symlink() {
        let target = fs::read_link(src_path)?;
        if let Some(m) = existing {
            if m.file_type().is_symlink() && fs::read_link(dst_path)? == target {
                copy_metadata(src_meta, src_path, dst_path, true)?;
                stats.links += 1;
                return Ok(());
            }
            remove_any(dst_path)?;
        }
        std::os::unix::fs::symlink(&target, dst_path)?;
        copy_metadata(src_meta, src_path, dst_path, true)?;
        stats.links += 1;
    } else if file_type.is_file() {
        if src_meta.nlink() > 1 {
            let key = (src_meta.dev(), src_meta.ino());
            if let Some(first) = links.get(&key) {
                return link_to_first(first, existing.as_ref(), dst_path, stats);
            }
            links.insert(key, dst_path.to_path_buf());
        }
        if unchanged(src_meta, src_path, dst_path)? {
            copy_metadata(src_meta, src_path, dst_path, false)?;
            stats.files_unchanged += 1;
            return Ok(());
        }
        // Replace rather than truncate so read-only or hard-linked
        // destinations are never written through
        if existing.is_some() {
            remove_any(dst_path)?;
        }
        let mut reader = fs::File::open(src_path)?;
        let mut writer = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(dst_path)?;
        std::io::copy(&mut reader, &mut writer)?;
        writer.set_modified(src_meta.modified()?)?;
        drop(writer);
        copy_metadata(src_meta, src_path, dst_path, false)?;
        stats.files_copied += 1;
    } else if file_type.is_char_device() || file_type.is_block_device() || file_type.is_fifo() {
        if existing.is_some() {
            remove_any(dst_path)?;
        }
        let kind = SFlag::from_bits_truncate(src_meta.mode() & SFlag::S_IFMT.bits());
        let perm = Mode::from_bits_truncate(src_meta.mode() & 0o7777);
        mknod(dst_path, kind, perm, src_meta.rdev()).map_err(std::io::Error::from)?;
        copy_metadata(src_meta, src_path, dst_path, false)?;
        stats.special += 1;
    } else {
        tracing::debug!(path = %src_path.display(), "skipping socket during mirror");
    }
    Ok(())
}

/// Recreate a further name of an already mirrored inode as a hard link
fn link_to_first(
    first: &Path,
    existing: Option<&fs::Metadata>,
    dst_path: &Path,
    stats: &mut MirrorStats,
) -> std::io::Result<()> {
    if let Some(meta) = existing {
        let first_meta = fs::symlink_metadata(first)?;
        if meta.dev() == first_meta.dev() && meta.ino() == first_meta.ino() {
            stats.hard_links += 1;
            return Ok(());
        }
        remove_any(dst_path)?;
    }
    fs::hard_link(first, dst_path)?;
    stats.hard_links += 1;
    Ok(())
}

/// Copy `src` over `dst`, then delete what `src` no longer has
fn mirror_tree(src: &Path, dst: &Path) -> Result<MirrorStats, PlatformError> {
    let mut stats = MirrorStats::default();
    let src_root = fs::metadata(src).map_err(|e| io_err("mirror_directory", src, &e))?;
    if !src_root.is_dir() {
        return Err(PlatformError::FilesystemOperationFailed {
            operation: "mirror_directory".to_string(),
            message: format!("{} is not a directory", src.display()),
        });
    }
    fs::create_dir_all(dst).map_err(|e| io_err("mirror_directory", dst, &e))?;

    let mut links = LinkMap::new();
    for entry in WalkDir::new(src).follow_links(false).min_depth(1) {
        let entry = entry.map_err(|e| PlatformError::FilesystemOperationFailed {
            operation: "mirror_directory".to_string(),
            message: e.to_string(),
        })?;
        let rel = relative(src, entry.path())?;
        let dst_path = dst.join(&rel);
        let meta = entry
            .metadata()
            .map_err(|e| PlatformError::FilesystemOperationFailed {
                operation: "mirror_directory".to_string(),
                message: e.to_string(),
            })?;
        mirror_entry(&meta, entry.path(), &dst_path, &mut links, &mut stats)
            .map_err(|e| io_err("mirror_directory", &dst_path, &e))?;
    }

    // Directories first so a removed subtree is deleted once
    let mut extraneous: Vec<PathBuf> = Vec::new();
    let mut walker = WalkDir::new(dst).follow_links(false).min_depth(1).into_iter();
    while let Some(entry) = walker.next() {
        let entry = entry.map_err(|e| PlatformError::FilesystemOperationFailed {
            operation: "mirror_directory".to_string(),
            message: e.to_string(),
        })?;
        let rel = relative(dst, entry.path())?;
        if fs::symlink_metadata(src.join(&rel)).is_err() {
            if entry.file_type().is_dir() {
                walker.skip_current_dir();
            }
            extraneous.push(entry.into_path());
        }
    }
    for path in extraneous {
        remove_any(&path).map_err(|e| io_err("mirror_directory", &path, &e))?;
        stats.removed += 1;
    }

    copy_metadata(&src_root, src, dst, false)
        .map_err(|e| io_err("mirror_directory", dst, &e))?;
    Ok(stats)
}

fn relative(base: &Path, path: &Path) -> Result<PathBuf, PlatformError> {
    path.strip_prefix(base)
        .map(Path::to_path_buf)
        .map_err(|e| PlatformError::FilesystemOperationFailed {
            operation: "mirror_directory".to_string(),
            message: format!("{}: {e}", path.display()),
        })
}

#[async_trait]
impl FilesystemOperations for LinuxFilesystemOperations {
    async fn atomic_swap(
        &self,
        ctx: &PlatformContext,
        path_a: &Path,
        path_b: &Path,
    ) -> Result<(), PlatformError> {
        let start = Instant::now();
        emit_fs_started(ctx, "atomic_swap", Some(path_a), path_b);

        let (a, b) = (path_a.to_path_buf(), path_b.to_path_buf());
        let result = blocking("atomic_swap", move || exchange_paths(&a, &b)).await;

        report(ctx, "atomic_swap", &[path_a, path_b], start, &result);
        result
    }

    async fn atomic_rename(
        &self,
        ctx: &PlatformContext,
        src: &Path,
        dst: &Path,
    ) -> Result<(), PlatformError> {
        let start = Instant::now();
        emit_fs_started(ctx, "atomic_rename", Some(src), dst);

        let result = tokio::fs::rename(src, dst)
            .await
            .map_err(|e| io_err("atomic_rename", src, &e));

        report(ctx, "atomic_rename", &[src, dst], start, &result);
        result
    }

    async fn mirror_directory(
        &self,
        ctx: &PlatformContext,
        src: &Path,
        dst: &Path,
    ) -> Result<MirrorStats, PlatformError> {
        let start = Instant::now();
        emit_fs_started(ctx, "mirror_directory", Some(src), dst);

        let (s, d) = (src.to_path_buf(), dst.to_path_buf());
        let result = blocking("mirror_directory", move || mirror_tree(&s, &d)).await;

        if let Ok(stats) = &result {
            tracing::debug!(
                src = %src.display(),
                dst = %dst.display(),
                copied = stats.files_copied,
                removed = stats.removed,
                "mirrored directory"
            );
        }
        report(ctx, "mirror_directory", &[src, dst], start, &result);
        result
    }

    async fn create_dir_all(
        &self,
        ctx: &PlatformContext,
        path: &Path,
    ) -> Result<(), PlatformError> {
        let start = Instant::now();
        emit_fs_started(ctx, "create_dir_all", None, path);

        let result = tokio::fs::create_dir_all(path)
            .await
            .map_err(|e| io_err("create_dir_all", path, &e));

        report(ctx, "create_dir_all", &[path], start, &result);
        result
    }

    async fn remove_dir_all(
        &self,
        ctx: &PlatformContext,
        path: &Path,
    ) -> Result<(), PlatformError> {
        let start = Instant::now();
        emit_fs_started(ctx, "remove_dir_all", None, path);

        let result = match tokio::fs::remove_dir_all(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_err("remove_dir_all", path, &e)),
        };

        report(ctx, "remove_dir_all", &[path], start, &result);
        result
    }

    async fn exists(&self, _ctx: &PlatformContext, path: &Path) -> bool {
        tokio::fs::symlink_metadata(path).await.is_ok()
    }

    async fn remove_file(&self, ctx: &PlatformContext, path: &Path) -> Result<(), PlatformError> {
        let start = Instant::now();
        emit_fs_started(ctx, "remove_file", None, path);

        let result = tokio::fs::remove_file(path)
            .await
            .map_err(|e| io_err("remove_file", path, &e));

        report(ctx, "remove_file", &[path], start, &result);
        result
    }

    async fn is_dir(&self, _ctx: &PlatformContext, path: &Path) -> bool {
        tokio::fs::metadata(path)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
    }
}
