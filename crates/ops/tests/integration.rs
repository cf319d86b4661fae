use abroot_config::{Config, PathConfig};
use abroot_errors::{Error, LedgerError, OpsError};
use abroot_events::{AppEvent, LockEvent, TransactionEvent};
use abroot_ops::{
    clear_stale_lock, diff_upgrade, kargs_add, kargs_remove, kargs_set, kargs_show, lock_status,
    pending_changes, pkg_add, pkg_clear_unstaged, pkg_list, pkg_remove, pkg_unstaged,
    spawn_event_logger, upgrade, DiffService, ImageProvider, InstalledPackages, OperationResult,
    OpsContextBuilder, OpsCtx, PackageIndex, RegistryClient, UpgradeOptions,
};
use abroot_state::{image, LedgerChange, LockStatus};
use abroot_types::{ABImage, PackageChange, PackageDiff, RegistryCheck};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

struct NoImages;

#[async_trait]
impl ImageProvider for NoImages {
    async fn pull(&self, reference: &str) -> Result<PathBuf, Error> {
        Err(OpsError::ImageProviderFailed {
            reference: reference.to_string(),
            message: "offline".to_string(),
        }
        .into())
    }
}

/// Registry always advertising `digest`
struct StaticRegistry {
    digest: &'static str,
}

#[async_trait]
impl RegistryClient for StaticRegistry {
    async fn check(&self, _reference: &str, current_digest: &str) -> Result<RegistryCheck, Error> {
        Ok(RegistryCheck {
            digest: self.digest.to_string(),
            available: self.digest != current_digest,
        })
    }
}

struct OneAddedPackage;

#[async_trait]
impl DiffService for OneAddedPackage {
    async fn diff(&self, _old: &str, _new: &str) -> Result<PackageDiff, Error> {
        Ok(PackageDiff {
            added: vec![PackageChange {
                name: "htop".into(),
                previous_version: None,
                new_version: Some("3.2".into()),
            }],
            ..PackageDiff::default()
        })
    }
}

/// Only `vim` is installed
struct Installed;

#[async_trait]
impl InstalledPackages for Installed {
    async fn is_installed(&self, name: &str) -> Result<bool, Error> {
        Ok(name == "vim")
    }
}

/// Index knowing every package but `ghost`
struct Index;

#[async_trait]
impl PackageIndex for Index {
    async fn exists(&self, name: &str) -> Result<bool, Error> {
        Ok(name != "ghost")
    }
}

fn config(temp: &TempDir) -> Config {
    let base = temp.path();
    Config {
        paths: PathConfig {
            state_dir: Some(base.join("state")),
            lock_path: Some(base.join("abroot.lock")),
            kargs_path: Some(base.join("state/kargs")),
            overlay_dir: Some(base.join("overlay")),
            dry_run_dir: Some(base.join("dry-run")),
        },
        ..Config::default()
    }
}

fn builder(temp: &TempDir) -> OpsContextBuilder {
    let (tx, _rx) = abroot_events::channel();
    OpsContextBuilder::new()
        .with_config(config(temp))
        .with_event_sender(tx)
        .with_image_provider(Arc::new(NoImages))
        .with_registry(Arc::new(StaticRegistry {
            digest: "sha256:new",
        }))
        .with_installed_packages(Arc::new(Installed))
        .with_package_index(Arc::new(Index))
        .with_host_root(temp.path().join("host"))
}

async fn ctx(temp: &TempDir) -> OpsCtx {
    builder(temp).build().await.unwrap()
}

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| (*s).to_string()).collect()
}

#[tokio::test]
async fn builder_requires_collaborators() {
    let err = OpsContextBuilder::new().build().await.err().unwrap();
    assert!(matches!(
        err,
        Error::Ops(OpsError::MissingComponent { component }) if component == "event sender"
    ));
}

#[tokio::test]
async fn package_requests_cancel_each_other() {
    let temp = TempDir::new().unwrap();
    let ctx = ctx(&temp).await;

    let added = pkg_add(&ctx, &names(&["htop", "foo"])).await.unwrap();
    assert!(added.iter().all(|r| r.change == LedgerChange::Staged));
    let removed = pkg_remove(&ctx, &names(&["htop", "vim"])).await.unwrap();
    assert_eq!(removed[0].change, LedgerChange::Cancelled);
    assert_eq!(removed[1].change, LedgerChange::Staged);

    let pending = pkg_list(&ctx).await.unwrap();
    assert_eq!(pending.add, names(&["foo"]));
    assert_eq!(pending.remove, names(&["vim"]));
}

#[tokio::test]
async fn package_requests_are_validated() {
    let temp = TempDir::new().unwrap();
    let ctx = ctx(&temp).await;

    let err = pkg_add(&ctx, &names(&["ghost"])).await.unwrap_err();
    assert!(matches!(err, Error::Ledger(LedgerError::PackageNotInIndex { .. })));
    let err = pkg_remove(&ctx, &names(&["nano"])).await.unwrap_err();
    assert!(matches!(err, Error::Ledger(LedgerError::PackageNotInstalled { .. })));
    let err = pkg_add(&ctx, &names(&["-rf"])).await.unwrap_err();
    assert!(matches!(err, Error::Ledger(LedgerError::InvalidPackageName { .. })));
}

#[tokio::test]
async fn unstaged_changes_can_be_discarded() {
    let temp = TempDir::new().unwrap();
    let ctx = ctx(&temp).await;
    pkg_add(&ctx, &names(&["foo"])).await.unwrap();

    let unstaged = pkg_unstaged(&ctx).await.unwrap();
    assert_eq!(unstaged.add, names(&["foo"]));

    let discarded = pkg_clear_unstaged(&ctx).await.unwrap();
    assert_eq!(discarded.add, names(&["foo"]));
    assert!(pkg_unstaged(&ctx).await.unwrap().is_empty());
}

#[tokio::test]
async fn dry_run_ledgers_start_from_production_state() {
    let temp = TempDir::new().unwrap();
    let production = ctx(&temp).await;
    pkg_add(&production, &names(&["foo"])).await.unwrap();
    kargs_set(&production, "quiet").await.unwrap();

    let dry = builder(&temp).with_dry_run(true).build().await.unwrap();
    assert!(dry.dry_run);
    pkg_add(&dry, &names(&["bar"])).await.unwrap();
    kargs_add(&dry, "nomodeset").await.unwrap();

    assert_eq!(pkg_list(&dry).await.unwrap().add, names(&["foo", "bar"]));
    assert_eq!(kargs_show(&dry).await.unwrap(), "quiet nomodeset");
    assert_eq!(pkg_list(&production).await.unwrap().add, names(&["foo"]));
    assert_eq!(kargs_show(&production).await.unwrap(), "quiet");
}

#[tokio::test]
async fn kargs_operations_normalize_and_back_up() {
    let temp = TempDir::new().unwrap();
    let ctx = ctx(&temp).await;

    assert_eq!(
        kargs_show(&ctx).await.unwrap(),
        abroot_config::fixed_paths::DEFAULT_KARGS
    );
    assert_eq!(
        kargs_set(&ctx, "quiet quiet\nsplash").await.unwrap(),
        "quiet splash"
    );
    assert!(!kargs_add(&ctx, "splash").await.unwrap());
    assert!(kargs_remove(&ctx, "splash").await.unwrap());
    assert_eq!(kargs_show(&ctx).await.unwrap(), "quiet");

    let backup = std::fs::read_to_string(temp.path().join("state/kargs.bak")).unwrap();
    assert_eq!(backup, "quiet splash\n");
}

#[tokio::test]
async fn stale_lock_is_reported_and_cleared() {
    let temp = TempDir::new().unwrap();
    let (tx, mut rx) = abroot_events::channel();
    let ctx = builder(&temp).with_event_sender(tx).build().await.unwrap();
    assert_eq!(lock_status(&ctx).unwrap(), LockStatus::Free);
    assert!(!clear_stale_lock(&ctx).unwrap());

    std::fs::write(
        temp.path().join("abroot.lock"),
        r#"{"pid":4242,"acquired_at":"2024-05-01T10:00:00Z","operation":"upgrade"}"#,
    )
    .unwrap();
    match lock_status(&ctx).unwrap() {
        LockStatus::Stale(Some(owner)) => assert_eq!(owner.pid, 4242),
        other => panic!("unexpected {other:?}"),
    }
    assert!(OperationResult::Lock(lock_status(&ctx).unwrap())
        .to_json()
        .unwrap()
        .contains("\"stale\""));

    assert!(clear_stale_lock(&ctx).unwrap());
    assert!(lock_status(&ctx).unwrap().is_free());

    drop(ctx);
    let mut cleared = false;
    while let Some(event) = rx.recv().await {
        cleared |= matches!(event, AppEvent::Lock(LockEvent::StaleCleared { .. }));
    }
    assert!(cleared);
}

#[tokio::test]
async fn upgrade_requires_root() {
    if nix::unistd::Uid::effective().is_root() {
        return;
    }
    let temp = TempDir::new().unwrap();
    let ctx = ctx(&temp).await;
    let err = upgrade(&ctx, UpgradeOptions::default()).await.unwrap_err();
    assert!(matches!(err, Error::Ops(OpsError::NotRoot)));
    assert!(lock_status(&ctx).unwrap().is_free());
}

#[tokio::test]
async fn pending_changes_track_ledgers_and_booted_kargs() {
    let temp = TempDir::new().unwrap();
    let ctx = ctx(&temp).await;
    assert!(pending_changes(&ctx).await.unwrap().is_empty());

    pkg_add(&ctx, &names(&["htop"])).await.unwrap();
    let pending = pending_changes(&ctx).await.unwrap();
    assert_eq!(pending.packages.add, names(&["htop"]));
    assert!(!pending.kargs_changed);
    pkg_clear_unstaged(&ctx).await.unwrap();

    let entry_dir = temp.path().join("host/.system/boot/grub");
    std::fs::create_dir_all(&entry_dir).unwrap();
    std::fs::write(
        entry_dir.join("abroot.cfg"),
        abroot_boot::render_slot_entry("6.1", "abcd", "vos-a", "quiet splash"),
    )
    .unwrap();
    assert!(pending_changes(&ctx).await.unwrap().kargs_changed);

    kargs_set(&ctx, "quiet splash").await.unwrap();
    assert!(pending_changes(&ctx).await.unwrap().is_empty());
}

/// Registry with nothing new, but a package staged: the transaction starts,
/// fails on slots that do not exist, and leaves nothing behind
#[tokio::test]
async fn failed_upgrade_releases_lock_and_overlay() {
    if !nix::unistd::Uid::effective().is_root() {
        return;
    }
    let temp = TempDir::new().unwrap();
    let host = temp.path().join("host");
    std::fs::create_dir_all(&host).unwrap();
    image::write_to(&host, &ABImage::new("sha256:new", "ghcr.io/vanilla-os/desktop:main"))
        .await
        .unwrap();

    let mut config = config(&temp);
    config.partitions.label_a = "abroot-missing-a".into();
    config.partitions.label_b = "abroot-missing-b".into();
    let (tx, mut rx) = abroot_events::channel();
    let ctx = builder(&temp)
        .with_config(config)
        .with_event_sender(tx)
        .build()
        .await
        .unwrap();
    pkg_add(&ctx, &names(&["htop"])).await.unwrap();

    let err = upgrade(&ctx, UpgradeOptions::default()).await.unwrap_err();
    assert!(matches!(err, Error::Disk(_)), "unexpected {err:?}");
    assert!(lock_status(&ctx).unwrap().is_free());
    let overlay = temp.path().join("overlay");
    assert!(!overlay.exists() || std::fs::read_dir(&overlay).unwrap().next().is_none());

    drop(ctx);
    let mut failed_step = None;
    while let Some(event) = rx.recv().await {
        if let AppEvent::Transaction(TransactionEvent::Failed { step, .. }) = event {
            failed_step = Some(step);
        }
    }
    assert_eq!(failed_step.as_deref(), Some("resolve roots"));
}

#[tokio::test]
async fn diff_upgrade_compares_running_and_available_images() {
    let temp = TempDir::new().unwrap();
    let host = temp.path().join("host");
    std::fs::create_dir_all(&host).unwrap();

    let without_service = ctx(&temp).await;
    image::write_to(&host, &ABImage::new("sha256:old", "ghcr.io/vanilla-os/desktop:main"))
        .await
        .unwrap();
    let err = diff_upgrade(&without_service).await.unwrap_err();
    assert!(matches!(err, Error::Ops(OpsError::MissingComponent { .. })));

    let ctx = builder(&temp)
        .with_diff_service(Arc::new(OneAddedPackage))
        .build()
        .await
        .unwrap();
    let diff = diff_upgrade(&ctx).await.unwrap();
    assert_eq!(diff.added.len(), 1);
    assert_eq!(diff.added[0].name, "htop");

    // Already on the advertised digest: nothing to compare
    image::write_to(&host, &ABImage::new("sha256:new", "ghcr.io/vanilla-os/desktop:main"))
        .await
        .unwrap();
    assert!(diff_upgrade(&ctx).await.unwrap().is_empty());
}

#[tokio::test]
async fn event_logger_drains_until_senders_drop() {
    let (tx, rx) = abroot_events::channel();
    let handle = spawn_event_logger(rx);
    let temp = TempDir::new().unwrap();
    let ctx = builder(&temp).with_event_sender(tx).build().await.unwrap();

    pkg_add(&ctx, &names(&["foo"])).await.unwrap();
    drop(ctx);

    assert!(handle.await.unwrap() >= 1);
}
