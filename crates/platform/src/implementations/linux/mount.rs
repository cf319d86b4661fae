//! Linux mount operations implementation

use abroot_errors::PlatformError;
use abroot_events::{AppEvent, PlatformEvent};
use async_trait::async_trait;
use nix::mount::{mount, umount2, MntFlags, MsFlags};
use std::path::Path;
use std::time::Instant;

use super::duration_to_millis;
use crate::core::PlatformContext;
use crate::mount::{MountOperations, MountRequest};

/// Linux implementation of mount operations
pub struct LinuxMountOperations;

impl LinuxMountOperations {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Default for LinuxMountOperations {
    fn default() -> Self {
        Self::new()
    }
}

fn request_flags(request: &MountRequest) -> MsFlags {
    let mut flags = MsFlags::empty();
    if request.bind {
        flags |= MsFlags::MS_BIND;
    }
    if request.recursive {
        flags |= MsFlags::MS_REC;
    }
    flags
}

fn operation_name(request: &MountRequest) -> &'static str {
    if request.bind {
        "bind"
    } else if request.fstype.as_deref() == Some("overlay") {
        "overlay"
    } else {
        "mount"
    }
}

fn do_mount(request: &MountRequest) -> Result<(), PlatformError> {
    mount(
        request.source.as_deref(),
        request.target.as_path(),
        request.fstype.as_deref(),
        request_flags(request),
        request.data.as_deref(),
    )
    .map_err(|errno| PlatformError::mount(operation_name(request), &request.target, errno.desc()))
}

#[async_trait]
impl MountOperations for LinuxMountOperations {
    async fn mount(
        &self,
        ctx: &PlatformContext,
        request: MountRequest,
    ) -> Result<(), PlatformError> {
        let start = Instant::now();
        let operation = operation_name(&request).to_string();
        let target = request.target.display().to_string();
        ctx.emit_event(AppEvent::Platform(PlatformEvent::MountOperationStarted {
            operation: operation.clone(),
            source: request.source.clone(),
            target: target.clone(),
        }));
        tracing::debug!(
            operation = %operation,
            source = ?request.source,
            target = %target,
            data = ?request.data,
            "mounting"
        );

        let result = tokio::task::spawn_blocking(move || do_mount(&request))
            .await
            .map_err(|e| PlatformError::MountFailed {
                operation: operation.clone(),
                target: target.clone(),
                message: format!("mount task failed: {e}"),
            })
            .and_then(|r| r);

        match &result {
            Ok(()) => ctx.emit_event(AppEvent::Platform(PlatformEvent::MountOperationCompleted {
                operation,
                target,
                duration_ms: duration_to_millis(start.elapsed()),
            })),
            Err(e) => ctx.emit_event(AppEvent::Platform(PlatformEvent::MountOperationFailed {
                operation,
                target,
                error_message: e.to_string(),
            })),
        }
        result
    }

    async fn unmount(
        &self,
        ctx: &PlatformContext,
        target: &Path,
        detach: bool,
    ) -> Result<(), PlatformError> {
        let start = Instant::now();
        let display = target.display().to_string();
        ctx.emit_event(AppEvent::Platform(PlatformEvent::MountOperationStarted {
            operation: "umount".to_string(),
            source: None,
            target: display.clone(),
        }));

        let flags = if detach {
            MntFlags::MNT_DETACH
        } else {
            MntFlags::empty()
        };
        let owned = target.to_path_buf();
        let result = tokio::task::spawn_blocking(move || {
            umount2(owned.as_path(), flags)
                .map_err(|errno| PlatformError::mount("umount", &owned, errno.desc()))
        })
        .await
        .map_err(|e| PlatformError::MountFailed {
            operation: "umount".to_string(),
            target: display.clone(),
            message: format!("umount task failed: {e}"),
        })
        .and_then(|r| r);

        match &result {
            Ok(()) => ctx.emit_event(AppEvent::Platform(PlatformEvent::MountOperationCompleted {
                operation: "umount".to_string(),
                target: display,
                duration_ms: duration_to_millis(start.elapsed()),
            })),
            Err(e) => ctx.emit_event(AppEvent::Platform(PlatformEvent::MountOperationFailed {
                operation: "umount".to_string(),
                target: display,
                error_message: e.to_string(),
            })),
        }
        result
    }
}
