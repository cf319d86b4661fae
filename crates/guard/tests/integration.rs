//! Integrity checker tests against temporary slot trees

use abroot_errors::{Error, GuardError};
use abroot_guard::{GuardEntryKind, IntegrityChecker, ROOT_PATHS, STANDARD_LINKS};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

async fn snapshot(root: &Path) -> Vec<(PathBuf, bool)> {
    let mut entries = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let mut reader = tokio::fs::read_dir(&dir).await.unwrap();
        while let Some(entry) = reader.next_entry().await.unwrap() {
            let file_type = entry.file_type().await.unwrap();
            let path = entry.path();
            entries.push((path.clone(), file_type.is_symlink()));
            if file_type.is_dir() {
                stack.push(path);
            }
        }
    }
    entries.sort();
    entries
}

#[tokio::test]
async fn report_only_mode_changes_nothing() {
    let dir = TempDir::new().unwrap();
    let checker = IntegrityChecker::new(dir.path(), None);

    let report = checker.check(false).await.unwrap();

    assert_eq!(
        report.missing.len(),
        STANDARD_LINKS.len() + ROOT_PATHS.len() + 4
    );
    assert!(report.repaired.is_empty());
    assert!(snapshot(dir.path()).await.is_empty());
}

#[tokio::test]
async fn repair_builds_skeleton() {
    let dir = TempDir::new().unwrap();
    let checker = IntegrityChecker::new(dir.path(), None);

    let report = checker.check(true).await.unwrap();
    assert_eq!(report.repaired.len(), report.missing.len());

    let bin = tokio::fs::read_link(dir.path().join("bin")).await.unwrap();
    assert_eq!(bin, PathBuf::from(".system/bin"));

    let etc = dir.path().join("var/lib/abroot/etc/a-work");
    let meta = tokio::fs::metadata(&etc).await.unwrap();
    assert!(meta.is_dir());
    assert_eq!(meta.permissions().mode() & 0o777, 0o755);

    assert!(checker.check(false).await.unwrap().is_clean());
}

#[tokio::test]
async fn repair_twice_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let checker = IntegrityChecker::new(dir.path(), None);

    checker.check(true).await.unwrap();
    let before = snapshot(dir.path()).await;
    let second = checker.check(true).await.unwrap();

    assert!(second.missing.is_empty());
    assert!(second.repaired.is_empty());
    assert_eq!(snapshot(dir.path()).await, before);
}

#[tokio::test]
async fn mispointed_link_is_replaced() {
    let dir = TempDir::new().unwrap();
    tokio::fs::symlink("/elsewhere/sbin", dir.path().join("sbin"))
        .await
        .unwrap();
    let checker = IntegrityChecker::new(dir.path(), None);

    let report = checker.check(true).await.unwrap();

    assert!(report
        .missing
        .iter()
        .any(|d| d.kind == GuardEntryKind::Link && d.path == Path::new("sbin")));
    let sbin = tokio::fs::read_link(dir.path().join("sbin")).await.unwrap();
    assert_eq!(sbin, PathBuf::from(".system/sbin"));
}

#[tokio::test]
async fn file_in_place_of_directory_is_a_conflict() {
    let dir = TempDir::new().unwrap();
    tokio::fs::write(dir.path().join("home"), b"not a directory")
        .await
        .unwrap();
    let checker = IntegrityChecker::new(dir.path(), None);

    let report = checker.check(false).await.unwrap();
    assert!(report.missing.iter().any(|d| d.path == Path::new("home")));

    let err = checker.check(true).await.unwrap_err();
    assert!(matches!(err, Error::Guard(GuardError::Conflict { .. })));
}

#[tokio::test]
async fn missing_root_is_rejected() {
    let dir = TempDir::new().unwrap();
    let checker = IntegrityChecker::new(dir.path().join("absent"), None);
    let err = checker.check(true).await.unwrap_err();
    assert!(matches!(err, Error::Guard(GuardError::RootMissing { .. })));
}

#[tokio::test]
async fn discrepancies_are_emitted_as_events() {
    let dir = TempDir::new().unwrap();
    let (tx, mut rx) = abroot_events::channel();
    let checker = IntegrityChecker::new(dir.path(), Some(tx));

    checker.check(true).await.unwrap();

    let mut repaired = 0;
    let mut completed = false;
    while let Ok(event) = rx.try_recv() {
        match event {
            abroot_events::AppEvent::Guard(abroot_events::GuardEvent::Repaired { .. }) => {
                repaired += 1;
            }
            abroot_events::AppEvent::Guard(
                abroot_events::GuardEvent::VerificationCompleted { missing, .. },
            ) => {
                assert_eq!(missing, repaired);
                completed = true;
            }
            _ => {}
        }
    }
    assert!(completed);
}
