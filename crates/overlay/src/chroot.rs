//! Command execution inside a staged root

use abroot_disk::unmount_tree;
use abroot_errors::{Error, OverlayError};
use abroot_events::{AppEvent, EventEmitter, EventSender, OverlayEvent};
use abroot_platform::{CommandOutput, MountRequest, Platform, PlatformContext};
use std::path::{Path, PathBuf};

/// Host trees bound into the root, parents before children
pub const CHROOT_BIND_MOUNTS: [&str; 5] = ["/dev", "/dev/pts", "/proc", "/run", "/sys"];

/// A root with the kernel filesystems bound in
///
/// Call [`Chroot::close`] to release the bind mounts.
pub struct Chroot {
    root: PathBuf,
    mounted: Vec<PathBuf>,
    platform: Platform,
    ctx: PlatformContext,
    event_sender: Option<EventSender>,
}

impl EventEmitter for Chroot {
    fn event_sender(&self) -> Option<&EventSender> {
        self.event_sender.as_ref()
    }
}

impl Chroot {
    /// Bind the host's kernel filesystems into `root`
    ///
    /// Mounts made before a failure are released again.
    ///
    /// # Errors
    ///
    /// Returns an error if a mount point cannot be created or a bind mount
    /// is refused.
    pub async fn new(root: &Path, event_sender: Option<EventSender>) -> Result<Self, Error> {
        let platform = Platform::current();
        let ctx = platform.create_context(event_sender.clone());
        let mut chroot = Self {
            root: root.to_path_buf(),
            mounted: Vec::new(),
            platform,
            ctx,
            event_sender,
        };

        for source in CHROOT_BIND_MOUNTS {
            if let Err(e) = chroot.bind(Path::new(source)).await {
                if let Err(cleanup) = chroot.release().await {
                    tracing::warn!(root = %root.display(), error = %cleanup, "failed to release partial chroot");
                }
                return Err(e);
            }
        }
        tracing::debug!(root = %root.display(), "chroot ready");
        Ok(chroot)
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    async fn bind(&mut self, source: &Path) -> Result<(), Error> {
        let relative = source.strip_prefix("/").unwrap_or(source);
        let target = self.root.join(relative);
        self.platform
            .filesystem()
            .create_dir_all(&self.ctx, &target)
            .await?;

        let mut request = MountRequest::bind(source, &target);
        request.recursive = false;
        self.platform.mount_with(&self.ctx, request).await?;
        self.mounted.push(target);
        Ok(())
    }

    /// Run `command` through `sh -c` inside the root
    ///
    /// # Errors
    ///
    /// Returns `OverlayError::ChrootCommandFailed` if the command cannot be
    /// started or exits non-zero.
    pub async fn execute(&self, command: &str) -> Result<CommandOutput, Error> {
        let failed = |message: String| OverlayError::ChrootCommandFailed {
            root: self.root.display().to_string(),
            command: command.to_string(),
            message,
        };

        let mut cmd = self.platform.command("chroot");
        cmd.arg(self.root.display().to_string())
            .args(["sh", "-c", command]);
        let output = self
            .platform
            .execute_command(&self.ctx, cmd)
            .await
            .map_err(|e| failed(e.to_string()))?;

        self.emit(AppEvent::Overlay(OverlayEvent::ChrootCommand {
            root: self.root.display().to_string(),
            command: command.to_string(),
            exit_code: output.status.code(),
        }));

        if output.success() {
            Ok(output)
        } else {
            let stderr = output.stderr_string();
            let message = if stderr.is_empty() {
                format!("exit status {:?}", output.status.code())
            } else {
                stderr
            };
            Err(failed(message).into())
        }
    }

    /// Release every bind mount, children first
    ///
    /// # Errors
    ///
    /// Returns the first unmount failure; remaining mounts are still attempted.
    pub async fn close(mut self) -> Result<(), Error> {
        self.release().await
    }

    async fn release(&mut self) -> Result<(), Error> {
        let mut first_error = None;
        while let Some(target) = self.mounted.pop() {
            if let Err(e) = unmount_tree(&self.platform, &self.ctx, &target, true).await {
                tracing::warn!(target = %target.display(), error = %e, "failed to release chroot mount");
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

impl Drop for Chroot {
    fn drop(&mut self) {
        if !self.mounted.is_empty() {
            tracing::warn!(
                root = %self.root.display(),
                mounts = self.mounted.len(),
                "chroot dropped without close; bind mounts remain"
            );
        }
    }
}
