//! Overlay engine tests; mount tests are skipped unless running as root

use abroot_disk::is_mount_point;
use abroot_errors::{Error, OverlayError};
use abroot_overlay::{Chroot, OverlayEngine, OverlayState};
use abroot_state::TransactionLock;
use std::path::PathBuf;
use tempfile::TempDir;

fn running_as_root() -> bool {
    nix::unistd::Uid::effective().is_root()
}

fn lock(dir: &TempDir) -> TransactionLock {
    TransactionLock::acquire(&dir.path().join("abroot.lock"), "test", None).unwrap()
}

#[tokio::test]
async fn staging_requires_lower_dirs() {
    let dir = TempDir::new().unwrap();
    let lock = lock(&dir);
    let mut engine = OverlayEngine::new(dir.path().join("overlay"), None);

    let err = engine.new_overlay_fs(&lock, &[]).await.unwrap_err();
    assert!(matches!(err, Error::Overlay(OverlayError::NoLowerDirs)));
    assert_eq!(engine.state(), OverlayState::Idle);
}

#[tokio::test]
async fn merge_without_stage_is_rejected() {
    let dir = TempDir::new().unwrap();
    let mut engine = OverlayEngine::new(dir.path().join("overlay"), None);

    let err = engine
        .merge_overlay_fs(&dir.path().join("target"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Overlay(OverlayError::InvalidTransition { .. })
    ));
}

#[tokio::test]
async fn cleanup_from_idle_removes_stale_scratch() {
    let dir = TempDir::new().unwrap();
    let mut engine = OverlayEngine::new(dir.path().join("overlay"), None);
    let stale = engine.paths().upper.join("leftover");
    tokio::fs::create_dir_all(&stale).await.unwrap();

    engine.cleanup_overlay_paths().await.unwrap();

    assert!(!engine.paths().upper.exists());
    assert!(!engine.paths().combiner.exists());
    assert_eq!(engine.state(), OverlayState::Idle);
}

#[tokio::test]
async fn merge_publishes_overlay_content_and_unmounts() {
    if !running_as_root() {
        eprintln!("skipping: requires root");
        return;
    }
    let dir = TempDir::new().unwrap();
    let lock = lock(&dir);
    let lower = dir.path().join("lower");
    let target = dir.path().join("target");
    tokio::fs::create_dir_all(&lower).await.unwrap();
    tokio::fs::create_dir_all(&target).await.unwrap();

    let mut engine = OverlayEngine::new(dir.path().join("overlay"), None);
    let combiner = engine
        .new_overlay_fs(&lock, &[lower.clone()])
        .await
        .unwrap()
        .to_path_buf();
    assert_eq!(engine.state(), OverlayState::Staged);
    tokio::fs::write(combiner.join("new-file"), b"staged")
        .await
        .unwrap();
    assert!(!lower.join("new-file").exists());

    engine.merge_overlay_fs(&target).await.unwrap();

    assert_eq!(engine.state(), OverlayState::Merged);
    let mut entries = std::fs::read_dir(&target)
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .collect::<Vec<_>>();
    entries.sort();
    assert_eq!(entries, vec![std::ffi::OsString::from("new-file")]);
    assert_eq!(
        tokio::fs::read(target.join("new-file")).await.unwrap(),
        b"staged"
    );
    assert!(!is_mount_point(&combiner).await.unwrap());
}

#[tokio::test]
async fn busy_combiner_is_not_reused() {
    if !running_as_root() {
        eprintln!("skipping: requires root");
        return;
    }
    let dir = TempDir::new().unwrap();
    let lock = lock(&dir);
    let lower = dir.path().join("lower");
    tokio::fs::create_dir_all(&lower).await.unwrap();
    let base = dir.path().join("overlay");

    let mut first = OverlayEngine::new(&base, None);
    first.new_overlay_fs(&lock, &[lower.clone()]).await.unwrap();

    let mut second = OverlayEngine::new(&base, None);
    let err = second
        .new_overlay_fs(&lock, &[lower.clone()])
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Overlay(OverlayError::Busy { .. })));

    first.cleanup_overlay_paths().await.unwrap();
    assert_eq!(first.state(), OverlayState::Aborted);
    assert!(!is_mount_point(&base.join("combined")).await.unwrap());
}

#[tokio::test]
async fn chroot_binds_and_releases_kernel_filesystems() {
    if !running_as_root() {
        eprintln!("skipping: requires root");
        return;
    }
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("root");
    tokio::fs::create_dir_all(&root).await.unwrap();

    let chroot = Chroot::new(&root, None).await.unwrap();
    assert!(is_mount_point(&root.join("proc")).await.unwrap());
    assert!(is_mount_point(&root.join("dev/pts")).await.unwrap());
    chroot.close().await.unwrap();

    for sub in ["dev", "dev/pts", "proc", "run", "sys"] {
        let path: PathBuf = root.join(sub);
        assert!(!is_mount_point(&path).await.unwrap(), "{sub} still mounted");
    }
}
