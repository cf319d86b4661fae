//! Platform handle and the per-call context

use abroot_errors::{Error, PlatformError};
use abroot_events::{AppEvent, EventSender};
use std::path::Path;

use crate::filesystem::{FilesystemOperations, MirrorStats};
use crate::mount::{MountOperations, MountRequest};
use crate::process::{CommandOutput, PlatformCommand, ProcessOperations};

/// Where platform operations report `PlatformEvent`s
#[derive(Clone, Default)]
pub struct PlatformContext {
    event_sender: Option<EventSender>,
}

impl PlatformContext {
    #[must_use]
    pub fn new(event_sender: Option<EventSender>) -> Self {
        Self { event_sender }
    }

    pub fn emit_event(&self, event: AppEvent) {
        if let Some(sender) = &self.event_sender {
            let _ = sender.send(event);
        }
    }
}

/// Filesystem, mount and process operations behind trait objects
pub struct Platform {
    filesystem_ops: Box<dyn FilesystemOperations>,
    mount_ops: Box<dyn MountOperations>,
    process_ops: Box<dyn ProcessOperations>,
}

impl Platform {
    pub fn new(
        filesystem_ops: Box<dyn FilesystemOperations>,
        mount_ops: Box<dyn MountOperations>,
        process_ops: Box<dyn ProcessOperations>,
    ) -> Self {
        Self {
            filesystem_ops,
            mount_ops,
            process_ops,
        }
    }

    #[must_use]
    pub fn current() -> Self {
        crate::implementations::linux::LinuxPlatform::new()
    }

    #[must_use]
    pub fn filesystem(&self) -> &dyn FilesystemOperations {
        &*self.filesystem_ops
    }

    #[must_use]
    pub fn mount(&self) -> &dyn MountOperations {
        &*self.mount_ops
    }

    #[must_use]
    pub fn process(&self) -> &dyn ProcessOperations {
        &*self.process_ops
    }

    #[must_use]
    pub fn create_context(&self, event_sender: Option<EventSender>) -> PlatformContext {
        PlatformContext::new(event_sender)
    }

    /// Exchange two paths in one `renameat2(RENAME_EXCHANGE)` call
    ///
    /// # Errors
    ///
    /// Returns an error if either path is missing or the exchange is refused.
    pub async fn atomic_swap(
        &self,
        ctx: &PlatformContext,
        path_a: &Path,
        path_b: &Path,
    ) -> Result<(), PlatformError> {
        self.filesystem().atomic_swap(ctx, path_a, path_b).await
    }

    /// # Errors
    ///
    /// Returns an error if any entry cannot be copied or removed.
    pub async fn mirror_directory(
        &self,
        ctx: &PlatformContext,
        src: &Path,
        dst: &Path,
    ) -> Result<MirrorStats, PlatformError> {
        self.filesystem().mirror_directory(ctx, src, dst).await
    }

    /// # Errors
    ///
    /// Returns an error if the mount syscall fails.
    pub async fn mount_with(
        &self,
        ctx: &PlatformContext,
        request: MountRequest,
    ) -> Result<(), PlatformError> {
        self.mount().mount(ctx, request).await
    }

    /// # Errors
    ///
    /// Returns an error if the process cannot be spawned.
    pub async fn execute_command(
        &self,
        ctx: &PlatformContext,
        cmd: PlatformCommand,
    ) -> Result<CommandOutput, Error> {
        self.process().execute_command(ctx, cmd).await
    }

    #[must_use]
    pub fn command(&self, program: &str) -> PlatformCommand {
        self.process().create_command(program)
    }
}
