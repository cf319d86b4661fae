//! Integration tests for the state crate

use abroot_config::PackagesConfig;
use abroot_errors::{Error, LedgerError, LockError};
use abroot_state::{
    image, InstalledPackages, KernelArgsLedger, LedgerChange, LockOwner, LockStatus,
    PackageIndex, PackageLedger, TransactionLock,
};
use abroot_types::ABImage;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use tempfile::TempDir;

struct FixedIndex(HashSet<&'static str>);

#[async_trait]
impl PackageIndex for FixedIndex {
    async fn exists(&self, name: &str) -> Result<bool, Error> {
        Ok(self.0.contains(name))
    }
}

struct FixedInstalled(HashSet<&'static str>);

#[async_trait]
impl InstalledPackages for FixedInstalled {
    async fn is_installed(&self, name: &str) -> Result<bool, Error> {
        Ok(self.0.contains(name))
    }
}

fn ledger(dir: &TempDir) -> PackageLedger {
    let installed = Arc::new(FixedInstalled(["nano", "vim"].into_iter().collect()));
    let index = Arc::new(FixedIndex(["foo", "bar", "htop"].into_iter().collect()));
    PackageLedger::new(dir.path().join("state"), PackagesConfig::default(), installed)
        .with_index(index)
}

#[test]
fn lock_acquire_and_release() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("run/abroot.lock");

    let lock = TransactionLock::acquire(&path, "upgrade", None).unwrap();
    assert!(path.exists());
    assert_eq!(lock.owner().pid, std::process::id());

    match TransactionLock::inspect(&path).unwrap() {
        LockStatus::Held(Some(owner)) => assert_eq!(owner.operation, "upgrade"),
        other => panic!("expected held lock, got {other:?}"),
    }

    lock.release().unwrap();
    assert!(!path.exists());
    assert_eq!(TransactionLock::inspect(&path).unwrap(), LockStatus::Free);
}

#[test]
fn second_acquire_reports_holder() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("abroot.lock");

    let _lock = TransactionLock::acquire(&path, "upgrade", None).unwrap();
    let err = TransactionLock::acquire(&path, "pkg-apply", None).unwrap_err();
    match err {
        Error::Lock(LockError::Held { pid, since, .. }) => {
            assert_eq!(pid, Some(std::process::id()));
            assert!(since.is_some());
        }
        other => panic!("expected held error, got {other:?}"),
    }
}

#[test]
fn drop_releases_lock() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("abroot.lock");
    {
        let _lock = TransactionLock::acquire(&path, "kargs", None).unwrap();
    }
    assert!(!path.exists());
    let again = TransactionLock::acquire(&path, "kargs", None).unwrap();
    again.release().unwrap();
}

#[test]
fn stale_lock_is_reported_not_healed() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("abroot.lock");
    let crashed = LockOwner {
        pid: 999_999,
        acquired_at: chrono::Utc::now(),
        operation: "upgrade".to_string(),
    };
    std::fs::write(&path, serde_json::to_vec(&crashed).unwrap()).unwrap();

    let err = TransactionLock::acquire(&path, "upgrade", None).unwrap_err();
    assert!(matches!(
        err,
        Error::Lock(LockError::Stale {
            pid: Some(999_999),
            ..
        })
    ));
    assert!(path.exists());
    assert_eq!(
        TransactionLock::inspect(&path).unwrap(),
        LockStatus::Stale(Some(crashed))
    );

    assert!(TransactionLock::clear_stale(&path, None).unwrap());
    assert!(!TransactionLock::clear_stale(&path, None).unwrap());
    TransactionLock::acquire(&path, "upgrade", None)
        .unwrap()
        .release()
        .unwrap();
}

#[test]
fn clear_stale_refuses_active_lock() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("abroot.lock");
    let _lock = TransactionLock::acquire(&path, "upgrade", None).unwrap();

    let err = TransactionLock::clear_stale(&path, None).unwrap_err();
    assert!(matches!(err, Error::Lock(LockError::Held { .. })));
    assert!(path.exists());
}

#[test]
fn lock_events_are_emitted() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("abroot.lock");
    let (tx, mut rx) = abroot_events::channel();

    let lock = TransactionLock::acquire(&path, "upgrade", Some(tx)).unwrap();
    lock.release().unwrap();

    let mut kinds = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let abroot_events::AppEvent::Lock(event) = event {
            kinds.push(event);
        }
    }
    assert!(matches!(
        kinds.as_slice(),
        [
            abroot_events::LockEvent::Acquired { .. },
            abroot_events::LockEvent::Released { .. }
        ]
    ));
}

#[tokio::test]
async fn image_record_round_trips_through_slot() {
    let dir = TempDir::new().unwrap();
    let record = ABImage::new("sha256:abc123", "ghcr.io/vanilla-os/desktop:main");

    image::write_to(dir.path(), &record).await.unwrap();
    assert!(dir.path().join("abimage.abr").exists());

    let loaded = image::read_from(dir.path()).await.unwrap();
    assert_eq!(loaded, record);
}

#[tokio::test]
async fn image_record_with_missing_fields_is_rejected() {
    let dir = TempDir::new().unwrap();
    tokio::fs::write(
        dir.path().join("abimage.abr"),
        br#"{"digest":"sha256:abc"}"#,
    )
    .await
    .unwrap();

    let err = image::read_from(dir.path()).await.unwrap_err();
    assert!(matches!(
        err,
        Error::Ledger(LedgerError::InvalidImageRecord { .. })
    ));

    let empty = ABImage::new("", "ghcr.io/vanilla-os/desktop:main");
    assert!(image::write_to(dir.path(), &empty).await.is_err());
}

#[tokio::test]
async fn add_then_remove_cancels() {
    let dir = TempDir::new().unwrap();
    let ledger = ledger(&dir);

    assert_eq!(ledger.add("foo").await.unwrap(), LedgerChange::Staged);
    assert_eq!(ledger.add("foo").await.unwrap(), LedgerChange::Unchanged);
    assert_eq!(ledger.list_add().await.unwrap(), vec!["foo".to_string()]);

    assert_eq!(ledger.remove("foo").await.unwrap(), LedgerChange::Cancelled);
    assert!(ledger.list_add().await.unwrap().is_empty());
    assert!(ledger.list_remove().await.unwrap().is_empty());
}

#[tokio::test]
async fn remove_then_add_cancels() {
    let dir = TempDir::new().unwrap();
    let ledger = ledger(&dir);

    assert_eq!(ledger.remove("nano").await.unwrap(), LedgerChange::Staged);
    assert_eq!(ledger.remove("nano").await.unwrap(), LedgerChange::Unchanged);
    assert_eq!(ledger.add("nano").await.unwrap(), LedgerChange::Cancelled);
    assert!(ledger.list_add().await.unwrap().is_empty());
    assert!(ledger.list_remove().await.unwrap().is_empty());
}

#[tokio::test]
async fn ledger_validates_against_index_and_installed_set() {
    let dir = TempDir::new().unwrap();
    let ledger = ledger(&dir);

    let err = ledger.add("does-not-exist").await.unwrap_err();
    assert!(matches!(
        err,
        Error::Ledger(LedgerError::PackageNotInIndex { .. })
    ));

    let err = ledger.remove("htop").await.unwrap_err();
    assert!(matches!(
        err,
        Error::Ledger(LedgerError::PackageNotInstalled { .. })
    ));

    let err = ledger.add("foo bar").await.unwrap_err();
    assert!(matches!(
        err,
        Error::Ledger(LedgerError::InvalidPackageName { .. })
    ));
}

#[tokio::test]
async fn unstaged_packages_against_summary() {
    let dir = TempDir::new().unwrap();
    let ledger = ledger(&dir);
    let root = dir.path().join("root");

    ledger.add("foo").await.unwrap();
    ledger.write_summary(&root).await.unwrap();
    ledger.add("bar").await.unwrap();

    let drift = ledger.get_unstaged_packages(&root).await.unwrap();
    assert_eq!(drift.add, vec!["bar".to_string()]);
    assert!(drift.remove.is_empty());

    let cleared = ledger.clear_unstaged(&root).await.unwrap();
    assert_eq!(cleared, drift);
    assert!(ledger.get_unstaged_packages(&root).await.unwrap().is_empty());

    let summary = tokio::fs::read_to_string(PackageLedger::summary_path(&root))
        .await
        .unwrap();
    assert_eq!(summary, "+foo\n+bar\n");
}

#[tokio::test]
async fn final_command_lists_all_pending_packages() {
    let dir = TempDir::new().unwrap();
    let ledger = ledger(&dir);
    assert_eq!(ledger.final_command().await.unwrap(), "");

    ledger.add("htop").await.unwrap();
    ledger.add("foo").await.unwrap();
    ledger.remove("vim").await.unwrap();

    assert_eq!(
        ledger.final_command().await.unwrap(),
        "apt-get install -y htop foo && apt-get remove -y --autoremove vim"
    );
}

#[tokio::test]
async fn dry_run_ledger_starts_from_production_state() {
    let dir = TempDir::new().unwrap();
    let production = ledger(&dir);
    production.add("foo").await.unwrap();
    let production_add = production.add_path();

    let scratch = dir.path().join("dry-run");
    let dry = production.into_dry_run(&scratch).await.unwrap();
    assert_eq!(dry.list_add().await.unwrap(), vec!["foo".to_string()]);

    dry.add("bar").await.unwrap();
    let real = tokio::fs::read_to_string(&production_add).await.unwrap();
    assert_eq!(real, "foo\n");

    // A second dry run keeps the scratch edits
    let again = dry.into_dry_run(&scratch).await.unwrap();
    assert_eq!(
        again.list_add().await.unwrap(),
        vec!["foo".to_string(), "bar".to_string()]
    );
}

#[tokio::test]
async fn kargs_default_is_seeded_on_first_read() {
    let dir = TempDir::new().unwrap();
    let kargs = KernelArgsLedger::new(dir.path().join("etc/abroot/kargs"), None);

    let content = kargs.read().await.unwrap();
    assert_eq!(content, "quiet splash bgrt_disable $vt_handoff");
    assert!(kargs.path().exists());
    assert!(!kargs.backup_path().exists());
}

#[tokio::test]
async fn kargs_write_keeps_backup_and_normal_form() {
    let dir = TempDir::new().unwrap();
    let kargs = KernelArgsLedger::new(dir.path().join("kargs"), None);
    kargs.write("quiet splash").await.unwrap();

    let written = kargs.write("quiet quiet nomodeset\nsplash").await.unwrap();
    assert_eq!(written, "quiet nomodeset splash");

    let backup = tokio::fs::read_to_string(kargs.backup_path()).await.unwrap();
    assert_eq!(backup.trim(), "quiet splash");
    assert_eq!(kargs.read().await.unwrap(), "quiet nomodeset splash");
}

#[tokio::test]
async fn kargs_add_and_remove_tokens() {
    let dir = TempDir::new().unwrap();
    let kargs = KernelArgsLedger::new(dir.path().join("kargs"), None);
    kargs.write("quiet splash").await.unwrap();

    assert!(kargs.add("nomodeset").await.unwrap());
    assert!(!kargs.add("quiet").await.unwrap());
    assert!(kargs.remove("splash").await.unwrap());
    assert!(!kargs.remove("splash").await.unwrap());
    assert_eq!(kargs.read().await.unwrap(), "quiet nomodeset");
}
