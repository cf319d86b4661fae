//! Ledger and lock operations
//!
//! These only touch the ledgers under the state directory (or the dry-run
//! scratch directory); the root slots are never mounted.

use abroot_errors::Error;
use abroot_events::EventEmitter;
use abroot_state::{LockStatus, TransactionLock, UnstagedPackages};

use crate::{OpsCtx, PackageRequest, PendingPackages};

/// Stage `names` for installation
///
/// Each name is processed in order; a rejected name stops the batch.
///
/// # Errors
///
/// Returns the first ledger error (invalid name, unknown package).
pub async fn pkg_add(ctx: &OpsCtx, names: &[String]) -> Result<Vec<PackageRequest>, Error> {
    let mut results = Vec::with_capacity(names.len());
    for name in names {
        let change = ctx.packages.add(name).await?;
        results.push(PackageRequest {
            name: name.clone(),
            change,
        });
    }
    Ok(results)
}

/// Stage `names` for removal
///
/// # Errors
///
/// Returns the first ledger error (invalid name, package not installed).
pub async fn pkg_remove(ctx: &OpsCtx, names: &[String]) -> Result<Vec<PackageRequest>, Error> {
    let mut results = Vec::with_capacity(names.len());
    for name in names {
        let change = ctx.packages.remove(name).await?;
        results.push(PackageRequest {
            name: name.clone(),
            change,
        });
    }
    Ok(results)
}

/// # Errors
///
/// Returns an error if a ledger file cannot be read.
pub async fn pkg_list(ctx: &OpsCtx) -> Result<PendingPackages, Error> {
    Ok(PendingPackages {
        add: ctx.packages.list_add().await?,
        remove: ctx.packages.list_remove().await?,
    })
}

/// Ledger changes not yet applied to the running slot
///
/// # Errors
///
/// Returns an error if a ledger or the applied summary cannot be read.
pub async fn pkg_unstaged(ctx: &OpsCtx) -> Result<UnstagedPackages, Error> {
    ctx.packages.get_unstaged_packages(&ctx.host_root).await
}

/// Drop ledger changes not yet applied, returning what was discarded
///
/// # Errors
///
/// Returns an error if the ledgers cannot be rewritten.
pub async fn pkg_clear_unstaged(ctx: &OpsCtx) -> Result<UnstagedPackages, Error> {
    let discarded = ctx.packages.clear_unstaged(&ctx.host_root).await?;
    if !discarded.is_empty() {
        ctx.emit_debug(format!(
            "discarded {} unstaged package changes",
            discarded.add.len() + discarded.remove.len()
        ));
    }
    Ok(discarded)
}

/// # Errors
///
/// Returns an error if the kernel arguments cannot be read or seeded.
pub async fn kargs_show(ctx: &OpsCtx) -> Result<String, Error> {
    ctx.kargs.read().await
}

/// Replace the kernel arguments, returning the normalized line
///
/// # Errors
///
/// Returns an error if the backup or the new file cannot be written.
pub async fn kargs_set(ctx: &OpsCtx, content: &str) -> Result<String, Error> {
    ctx.kargs.write(content).await
}

/// # Errors
///
/// Returns an error if the kernel arguments cannot be rewritten.
pub async fn kargs_add(ctx: &OpsCtx, tokens: &str) -> Result<bool, Error> {
    ctx.kargs.add(tokens).await
}

/// # Errors
///
/// Returns an error if the kernel arguments cannot be rewritten.
pub async fn kargs_remove(ctx: &OpsCtx, tokens: &str) -> Result<bool, Error> {
    ctx.kargs.remove(tokens).await
}

/// # Errors
///
/// Returns an error if the lock file exists but cannot be read.
pub fn lock_status(ctx: &OpsCtx) -> Result<LockStatus, Error> {
    TransactionLock::inspect(&ctx.config.lock_path())
}

/// Remove a lock left behind by a crashed transaction
///
/// Returns `false` when there was nothing to clear.
///
/// # Errors
///
/// Returns `LockError::Held` if a running transaction holds the lock.
pub fn clear_stale_lock(ctx: &OpsCtx) -> Result<bool, Error> {
    TransactionLock::clear_stale(&ctx.config.lock_path(), Some(ctx.tx.clone()))
}
