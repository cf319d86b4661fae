//! Upgrade transaction
//!
//! Writes a new image into the future slot while the present slot keeps
//! running untouched. Every step after the lock is taken runs inside
//! [`Transaction::run`]; whatever it leaves behind (a staged overlay, the
//! future slot mount) is torn down by [`Transaction::finish`] before the lock
//! is released, on success and on failure alike.

use abroot_boot::{
    discover_kernel, entry_kargs, publish_menu, render_menu, render_slot_entry, slot_entry_config_path,
    slot_entry_path, write_slot_entry, MenuSlot,
};
use abroot_config::{fixed_paths, Config};
use abroot_disk::{is_mount_point, resolve_roots, PartitionTable, RootPair, SlotPartition};
use abroot_errors::{DiskError, Error, OpsError};
use abroot_events::{AppEvent, EventEmitter, FailureContext, TransactionEvent};
use abroot_guard::IntegrityChecker;
use abroot_overlay::{Chroot, OverlayEngine, OverlayState};
use abroot_state::{image, TransactionLock};
use abroot_types::{ABImage, PackageDiff, RegistryCheck, UpgradeReport};
use std::path::{Path, PathBuf};
use std::time::Instant;
use uuid::Uuid;

use crate::{fstab, OpsCtx, PendingChanges, UpgradeOptions, UpgradeOutcome};

const OPERATION: &str = "upgrade";

/// Upgrade the future root to the newest image
///
/// The transaction runs when the registry has a newer image, when local
/// changes are pending (see [`pending_changes`]) or when forced; otherwise it
/// returns [`UpgradeOutcome::UpToDate`] without taking the lock.
///
/// In a dry run the overlay is staged and the ledger's command executed in
/// it, but the overlay is discarded instead of merged and nothing is written
/// to the future slot.
///
/// # Errors
///
/// Returns `OpsError::NotRoot` without root privileges, `LockError::Held` /
/// `LockError::Stale` when the lock cannot be taken, and the error of the
/// first failing step otherwise. A failed run leaves the future slot
/// unmounted and the lock released.
pub async fn upgrade(ctx: &OpsCtx, options: UpgradeOptions) -> Result<UpgradeOutcome, Error> {
    let start = Instant::now();
    ensure_root()?;
    let transaction_id = Uuid::new_v4();

    let reference = ctx.config.image.reference();
    let current = image::read_from(&ctx.host_root).await?;
    let check = ctx.registry.check(&reference, &current.digest).await?;
    let pending = pending_changes(ctx).await?;
    if !needs_upgrade(&check, &pending, options.force) {
        tracing::info!(digest = %check.digest, "image is up to date");
        ctx.emit(AppEvent::Transaction(TransactionEvent::Skipped {
            transaction_id,
            reason: format!("{reference} is up to date"),
        }));
        return Ok(UpgradeOutcome::UpToDate { check });
    }

    ctx.emit(AppEvent::Transaction(TransactionEvent::Started {
        transaction_id,
        operation: OPERATION.to_string(),
        dry_run: ctx.dry_run,
    }));
    let lock = match TransactionLock::acquire(
        &ctx.config.lock_path(),
        OPERATION,
        Some(ctx.tx.clone()),
    ) {
        Ok(lock) => lock,
        Err(e) => {
            ctx.emit(failed_event(transaction_id, "acquire lock", &e));
            return Err(e);
        }
    };

    let mut transaction = Transaction::new(ctx, transaction_id);
    let result = transaction.run(&lock, &reference, &check).await;
    let teardown = transaction.finish().await;

    match result {
        Ok(mut report) => {
            if let Err(e) = teardown {
                tracing::warn!(error = %e, "teardown after a successful upgrade failed");
                ctx.emit_warning(format!("teardown after a successful upgrade failed: {e}"));
            }
            lock.release()?;
            report.duration_ms = elapsed_ms(start);
            ctx.emit(AppEvent::Transaction(TransactionEvent::Completed {
                transaction_id,
                duration_ms: report.duration_ms,
            }));
            Ok(UpgradeOutcome::Applied(report))
        }
        Err(e) => {
            ctx.emit(failed_event(transaction_id, transaction.step, &e));
            if let Err(teardown) = teardown {
                tracing::error!(error = %teardown, "teardown after a failed upgrade failed");
                ctx.emit_error(format!("teardown after a failed upgrade failed: {teardown}"));
            }
            if let Err(release) = lock.release() {
                tracing::error!(error = %release, "releasing the transaction lock failed");
                ctx.emit_error(format!("releasing the transaction lock failed: {release}"));
            }
            Err(e)
        }
    }
}

/// Package changes between the running image and the newest one
///
/// Returns an empty diff when the registry has nothing newer.
///
/// # Errors
///
/// Returns `OpsError::MissingComponent` without a diff service, and the
/// registry's or diff service's error otherwise.
pub async fn diff_upgrade(ctx: &OpsCtx) -> Result<PackageDiff, Error> {
    let service = ctx.diff.as_ref().ok_or_else(|| OpsError::MissingComponent {
        component: "diff service".to_string(),
    })?;
    let reference = ctx.config.image.reference();
    let current = image::read_from(&ctx.host_root).await?;
    let check = ctx.registry.check(&reference, &current.digest).await?;
    if !check.available {
        return Ok(PackageDiff::default());
    }
    service.diff(&current.digest, &check.digest).await
}

/// Whether the transaction should run
#[must_use]
pub fn needs_upgrade(check: &RegistryCheck, pending: &PendingChanges, force: bool) -> bool {
    check.available || force || !pending.is_empty()
}

/// Ledger changes not yet applied to the running slot
///
/// Kernel arguments count as changed when the ledger differs from the
/// arguments in the running slot's boot entry. A missing or unreadable entry
/// is not a change.
///
/// # Errors
///
/// Returns an error if a ledger or the applied summary cannot be read, or,
/// with thin provisioning, if the running slot cannot be resolved.
pub async fn pending_changes(ctx: &OpsCtx) -> Result<PendingChanges, Error> {
    let packages = ctx.packages.get_unstaged_packages(&ctx.host_root).await?;
    let kargs = ctx.kargs.read().await?;
    let kargs_changed = booted_kargs(ctx)
        .await?
        .is_some_and(|booted| booted != kargs);
    Ok(PendingChanges {
        packages,
        kargs_changed,
    })
}

/// Kernel arguments of the running slot's boot entry
async fn booted_kargs(ctx: &OpsCtx) -> Result<Option<String>, Error> {
    let label = if ctx.config.boot.thin_provisioning {
        let table = ctx.disk.get_partitions("").await?;
        resolve_roots(&table, ctx.disk.labels(), &ctx.host_root)?
            .present
            .label
    } else {
        String::new()
    };
    let path = slot_entry_path(
        &ctx.host_root,
        &ctx.host_path("/boot"),
        &ctx.config.boot,
        &label,
    );
    match tokio::fs::read_to_string(&path).await {
        Ok(entry) => Ok(entry_kargs(&entry)),
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "no boot entry to compare kargs");
            Ok(None)
        }
    }
}

/// Menu entries for booting `roots.future` by default
///
/// # Errors
///
/// Returns `DiskError::LabelNotFound` when thin provisioning is on and the
/// boot partition is missing from `table`.
pub fn menu_slots(
    config: &Config,
    roots: &RootPair,
    table: &PartitionTable,
) -> Result<(MenuSlot, MenuSlot), DiskError> {
    let boot_uuid = if config.boot.thin_provisioning {
        let label = &config.partitions.label_boot;
        let boot = table
            .by_label(label)
            .ok_or_else(|| DiskError::LabelNotFound {
                label: label.clone(),
            })?;
        Some(boot.uuid.clone())
    } else {
        None
    };
    let entry = |slot: &SlotPartition| MenuSlot {
        slot: slot.slot,
        uuid: boot_uuid
            .clone()
            .unwrap_or_else(|| slot.partition.uuid.clone()),
        config_path: slot_entry_config_path(&config.boot, &slot.label),
    };
    Ok((entry(&roots.future), entry(&roots.present)))
}

fn ensure_root() -> Result<(), Error> {
    if nix::unistd::Uid::effective().is_root() {
        Ok(())
    } else {
        Err(OpsError::NotRoot.into())
    }
}

fn failed_event(transaction_id: Uuid, step: &str, error: &Error) -> AppEvent {
    AppEvent::Transaction(TransactionEvent::Failed {
        transaction_id,
        step: step.to_string(),
        failure: FailureContext::from_error(error),
    })
}

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// Resources held by one running upgrade
struct Transaction<'a> {
    ctx: &'a OpsCtx,
    id: Uuid,
    step: &'static str,
    overlay: OverlayEngine,
    future_mount: PathBuf,
    /// Set when this transaction mounted the future slot itself
    mounted_future: bool,
}

impl<'a> Transaction<'a> {
    fn new(ctx: &'a OpsCtx, id: Uuid) -> Self {
        Self {
            ctx,
            id,
            step: "start",
            overlay: OverlayEngine::new(ctx.config.overlay_dir(), Some(ctx.tx.clone())),
            future_mount: ctx.host_path(fixed_paths::FUTURE_MOUNT_POINT),
            mounted_future: false,
        }
    }

    fn begin(&mut self, step: &'static str) {
        tracing::debug!(transaction = %self.id, step, "upgrade step");
        self.step = step;
        self.ctx
            .emit(AppEvent::Transaction(TransactionEvent::StepStarted {
                transaction_id: self.id,
                step: step.to_string(),
            }));
    }

    async fn run(
        &mut self,
        lock: &TransactionLock,
        reference: &str,
        check: &RegistryCheck,
    ) -> Result<UpgradeReport, Error> {
        let ctx = self.ctx;

        self.begin("resolve roots");
        let table = ctx.disk.get_partitions("").await?;
        let roots = resolve_roots(&table, ctx.disk.labels(), &ctx.host_root)?;

        self.begin("mount future root");
        if !is_mount_point(&self.future_mount).await? {
            let mut partition = roots.future.partition.clone();
            ctx.disk
                .mount(&mut partition, &self.future_mount, None)
                .await?;
            self.mounted_future = true;
        }

        self.begin("pull image");
        let rootfs = ctx.images.pull(reference).await?;

        self.begin("stage overlay");
        let combiner = self
            .overlay
            .new_overlay_fs(lock, &[rootfs])
            .await?
            .to_path_buf();

        self.begin("apply packages");
        let packages_added = ctx.packages.list_add().await?;
        let packages_removed = ctx.packages.list_remove().await?;
        let command = ctx.packages.final_command().await?;
        if !command.is_empty() {
            run_in_chroot(ctx, &combiner, &command).await?;
        }

        let mut report = UpgradeReport {
            transaction_id: self.id,
            future_slot: roots.future.slot,
            image: ABImage::new(check.digest.clone(), reference),
            command: (!command.is_empty()).then_some(command),
            packages_added,
            packages_removed,
            repaired: Vec::new(),
            dry_run: ctx.dry_run,
            duration_ms: 0,
        };

        if ctx.dry_run {
            self.begin("verify future root");
            let integrity = IntegrityChecker::new(&self.future_mount, Some(ctx.tx.clone()))
                .check(false)
                .await?;
            tracing::info!(
                missing = integrity.missing.len(),
                "dry run finished, discarding staged overlay"
            );
            return Ok(report);
        }

        self.begin("merge overlay");
        let system_dir = self.future_mount.join(fixed_paths::SYSTEM_DIR);
        self.overlay.merge_overlay_fs(&system_dir).await?;

        self.begin("repair future root");
        let integrity = IntegrityChecker::new(&self.future_mount, Some(ctx.tx.clone()))
            .check(true)
            .await?;
        report.repaired = integrity.repaired;

        self.begin("write image record");
        image::write_to(&self.future_mount, &report.image).await?;

        self.begin("write fstab");
        let content = fstab::render(
            &ctx.config.partitions,
            &roots.future.partition,
            roots.future.slot,
            &table,
        );
        fstab::publish(&self.future_mount, &content).await?;

        self.begin("write boot entry");
        let boot_mount = ctx.host_path("/boot");
        self.write_boot_entry(&roots.future, &boot_mount).await?;

        self.begin("publish boot menu");
        let (default, fallback) = menu_slots(&ctx.config, &roots, &table)?;
        publish_menu(
            &boot_mount.join("grub/grub.cfg"),
            &render_menu(&default, &fallback),
            roots.future.slot,
            Some(&ctx.tx),
        )
        .await?;

        self.begin("write package summary");
        ctx.packages.write_summary(&system_dir).await?;

        Ok(report)
    }

    async fn write_boot_entry(
        &self,
        future: &SlotPartition,
        boot_mount: &Path,
    ) -> Result<(), Error> {
        let kernel = discover_kernel(&self.future_mount).await?;
        let kargs = self.ctx.kargs.read().await?;
        let entry = render_slot_entry(&kernel, &future.partition.uuid, &future.label, &kargs);
        let path = slot_entry_path(
            &self.future_mount,
            boot_mount,
            &self.ctx.config.boot,
            &future.label,
        );
        write_slot_entry(&path, &entry, future.slot, Some(&self.ctx.tx)).await
    }

    /// Abort a still staged overlay, then unmount the future slot if this
    /// transaction mounted it
    ///
    /// Both steps run even when the first fails; the first error is returned.
    async fn finish(&mut self) -> Result<(), Error> {
        let mut first_error = None;

        if self.overlay.state() == OverlayState::Staged {
            if let Err(e) = self.overlay.cleanup_overlay_paths().await {
                tracing::error!(error = %e, "aborting the staged overlay failed");
                first_error.get_or_insert(e);
            }
        }

        if self.mounted_future {
            match self
                .ctx
                .disk
                .unmount_recursive(&self.future_mount, false)
                .await
            {
                Ok(_) => self.mounted_future = false,
                Err(e) => {
                    tracing::error!(error = %e, "unmounting the future root failed");
                    first_error.get_or_insert(e);
                }
            }
        }

        first_error.map_or(Ok(()), Err)
    }
}

async fn run_in_chroot(ctx: &OpsCtx, root: &Path, command: &str) -> Result<(), Error> {
    let chroot = Chroot::new(root, Some(ctx.tx.clone())).await?;
    let executed = chroot.execute(command).await;
    let closed = chroot.close().await;
    executed?;
    closed
}
