//! System status report

use abroot_boot::BootStateResolver;
use abroot_config::fixed_paths;
use abroot_disk::RootPair;
use abroot_errors::Error;
use abroot_state::{image, LockStatus, TransactionLock, UnstagedPackages};
use abroot_types::{ABImage, SlotId};
use serde::Serialize;

use crate::OpsCtx;

/// One slot as shown by the status report
#[derive(Clone, Debug, Serialize)]
pub struct SlotStatus {
    pub slot: SlotId,
    pub label: String,
    pub device: String,
    pub uuid: String,
}

/// Snapshot of the transaction engine's view of the system
#[derive(Clone, Debug, Serialize)]
pub struct StatusReport {
    pub present: SlotStatus,
    pub future: SlotStatus,
    /// Whether grub's default entry is the present slot; `None` when the
    /// generated configuration could not be classified
    pub booted_into_present: Option<bool>,
    /// Image record of the running slot
    pub image: Option<ABImage>,
    pub kargs: String,
    pub packages_add: Vec<String>,
    pub packages_remove: Vec<String>,
    pub unstaged: UnstagedPackages,
    pub lock: LockStatus,
}

/// Gather the status report
///
/// # Errors
///
/// Returns an error if the slots cannot be resolved or a ledger cannot be
/// read.
pub async fn status(ctx: &OpsCtx) -> Result<StatusReport, Error> {
    let roots = ctx.disk.roots().await?;
    status_for(ctx, &roots).await
}

async fn status_for(ctx: &OpsCtx, roots: &RootPair) -> Result<StatusReport, Error> {
    let resolver = BootStateResolver::new(
        ctx.host_path(fixed_paths::GRUB_CONFIG),
        Some(ctx.tx.clone()),
    );
    let booted_into_present = match resolver.is_booted_into_present_root(roots.future.slot).await
    {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(error = %e, "boot state unavailable");
            None
        }
    };

    let image = match image::read_from(&ctx.host_root).await {
        Ok(image) => Some(image),
        Err(e) => {
            tracing::warn!(error = %e, "image record unavailable");
            None
        }
    };

    Ok(StatusReport {
        present: slot_status(&roots.present),
        future: slot_status(&roots.future),
        booted_into_present,
        image,
        kargs: ctx.kargs.read().await?,
        packages_add: ctx.packages.list_add().await?,
        packages_remove: ctx.packages.list_remove().await?,
        unstaged: ctx.packages.get_unstaged_packages(&ctx.host_root).await?,
        lock: TransactionLock::inspect(&ctx.config.lock_path())?,
    })
}

fn slot_status(slot: &abroot_disk::SlotPartition) -> SlotStatus {
    SlotStatus {
        slot: slot.slot,
        label: slot.label.clone(),
        device: slot.partition.device.display().to_string(),
        uuid: slot.partition.uuid.clone(),
    }
}
