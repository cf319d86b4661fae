//! Overlay transaction state machine
//!
//! `Idle -> Staged -> (Merged | Aborted)`. Staging requires the transaction
//! lock, so only one overlay can exist per system at a time.

use abroot_disk::{is_mount_point, unmount_tree};
use abroot_errors::{Error, OverlayError};
use abroot_events::{AppEvent, EventEmitter, EventSender, OverlayEvent};
use abroot_platform::{MirrorStats, MountRequest, Platform, PlatformContext};
use abroot_state::TransactionLock;
use std::fmt;
use std::path::{Path, PathBuf};

/// Lifecycle of one overlay transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayState {
    Idle,
    Staged,
    Merged,
    Aborted,
}

impl fmt::Display for OverlayState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Staged => "staged",
            Self::Merged => "merged",
            Self::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

/// Scratch layout under one base directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlayPaths {
    pub base: PathBuf,
    pub upper: PathBuf,
    pub work: PathBuf,
    pub combiner: PathBuf,
}

impl OverlayPaths {
    #[must_use]
    pub fn new(base: impl Into<PathBuf>) -> Self {
        let base = base.into();
        Self {
            upper: base.join("upper"),
            work: base.join("work"),
            combiner: base.join("combined"),
            base,
        }
    }
}

/// Mount data for an overlay with `lowers` searched in the given order
///
/// Separators inside paths are escaped the way overlayfs expects.
#[must_use]
pub fn overlay_mount_data(lowers: &[PathBuf], upper: &Path, work: &Path) -> String {
    let lowerdir = lowers
        .iter()
        .map(|p| escape_option(&p.display().to_string()))
        .collect::<Vec<_>>()
        .join(":");
    format!(
        "lowerdir={lowerdir},upperdir={},workdir={}",
        escape_option(&upper.display().to_string()),
        escape_option(&work.display().to_string())
    )
}

fn escape_option(path: &str) -> String {
    let mut escaped = String::with_capacity(path.len());
    for c in path.chars() {
        if matches!(c, ':' | ',' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Union mount over a read-only tree with a throwaway upper layer
pub struct OverlayEngine {
    paths: OverlayPaths,
    lowers: Vec<PathBuf>,
    state: OverlayState,
    platform: Platform,
    ctx: PlatformContext,
    event_sender: Option<EventSender>,
}

impl EventEmitter for OverlayEngine {
    fn event_sender(&self) -> Option<&EventSender> {
        self.event_sender.as_ref()
    }
}

impl OverlayEngine {
    #[must_use]
    pub fn new(base: impl Into<PathBuf>, event_sender: Option<EventSender>) -> Self {
        let platform = Platform::current();
        let ctx = platform.create_context(event_sender.clone());
        Self {
            paths: OverlayPaths::new(base),
            lowers: Vec::new(),
            state: OverlayState::Idle,
            platform,
            ctx,
            event_sender,
        }
    }

    #[must_use]
    pub fn state(&self) -> OverlayState {
        self.state
    }

    #[must_use]
    pub fn paths(&self) -> &OverlayPaths {
        &self.paths
    }

    /// Where the staged tree is visible while the overlay is mounted
    #[must_use]
    pub fn combiner(&self) -> &Path {
        &self.paths.combiner
    }

    /// Mount a fresh overlay over `lowers` at the combiner
    ///
    /// Borrowing the lock ties the overlay to the session that holds it.
    ///
    /// # Errors
    ///
    /// Returns `OverlayError::InvalidTransition` unless idle,
    /// `OverlayError::NoLowerDirs` for an empty `lowers`, `OverlayError::Busy`
    /// when the combiner or scratch directory is already mounted, and
    /// `OverlayError::MountFailed` if the union mount is refused.
    pub async fn new_overlay_fs(
        &mut self,
        _lock: &TransactionLock,
        lowers: &[PathBuf],
    ) -> Result<&Path, Error> {
        self.expect_state(OverlayState::Idle, OverlayState::Staged)?;
        if lowers.is_empty() {
            return Err(OverlayError::NoLowerDirs.into());
        }
        for path in [&self.paths.combiner, &self.paths.base] {
            if is_mount_point(path).await? {
                return Err(OverlayError::Busy {
                    path: path.display().to_string(),
                }
                .into());
            }
        }

        let fs = self.platform.filesystem();
        for dir in [&self.paths.upper, &self.paths.work, &self.paths.combiner] {
            fs.remove_dir_all(&self.ctx, dir).await?;
            fs.create_dir_all(&self.ctx, dir).await?;
        }

        let data = overlay_mount_data(lowers, &self.paths.upper, &self.paths.work);
        tracing::debug!(combiner = %self.paths.combiner.display(), %data, "mounting overlay");
        self.platform
            .mount_with(&self.ctx, MountRequest::overlay(&self.paths.combiner, data))
            .await
            .map_err(|e| OverlayError::MountFailed {
                path: self.paths.combiner.display().to_string(),
                message: e.to_string(),
            })?;

        self.lowers = lowers.to_vec();
        self.state = OverlayState::Staged;
        self.emit(AppEvent::Overlay(OverlayEvent::Staged {
            combiner: self.paths.combiner.display().to_string(),
            lowers: self.lowers.iter().map(|p| p.display().to_string()).collect(),
        }));
        Ok(&self.paths.combiner)
    }

    /// Mirror the staged tree into `target` and unmount the combiner
    ///
    /// Once the mirror succeeds `target` is authoritative; a failing unmount
    /// afterwards is reported as a warning and the merge still succeeds.
    ///
    /// # Errors
    ///
    /// Returns `OverlayError::InvalidTransition` unless staged and
    /// `OverlayError::MergeFailed` if the mirror fails.
    pub async fn merge_overlay_fs(&mut self, target: &Path) -> Result<MirrorStats, Error> {
        self.expect_state(OverlayState::Staged, OverlayState::Merged)?;

        let stats = self
            .platform
            .mirror_directory(&self.ctx, &self.paths.combiner, target)
            .await
            .map_err(|e| OverlayError::MergeFailed {
                target: target.display().to_string(),
                message: e.to_string(),
            })?;
        self.state = OverlayState::Merged;
        tracing::info!(
            target = %target.display(),
            copied = stats.files_copied,
            removed = stats.removed,
            "merged overlay"
        );

        match self
            .platform
            .mount()
            .unmount(&self.ctx, &self.paths.combiner, false)
            .await
        {
            Ok(()) => self.remove_scratch().await,
            Err(e) => {
                tracing::warn!(combiner = %self.paths.combiner.display(), error = %e, "overlay left mounted after merge");
                self.emit(AppEvent::Overlay(OverlayEvent::UnmountDeferred {
                    combiner: self.paths.combiner.display().to_string(),
                    message: e.to_string(),
                }));
            }
        }

        self.emit(AppEvent::Overlay(OverlayEvent::Merged {
            combiner: self.paths.combiner.display().to_string(),
            target: target.display().to_string(),
        }));
        Ok(stats)
    }

    /// Tear down scratch mounts and directories
    ///
    /// Runs from any state; a staged overlay becomes aborted, other states
    /// are kept.
    ///
    /// # Errors
    ///
    /// Returns an error if a scratch mount cannot be released or a scratch
    /// directory cannot be removed.
    pub async fn cleanup_overlay_paths(&mut self) -> Result<(), Error> {
        if is_mount_point(&self.paths.combiner).await? {
            unmount_tree(&self.platform, &self.ctx, &self.paths.combiner, true).await?;
        }

        let fs = self.platform.filesystem();
        for dir in [&self.paths.upper, &self.paths.work, &self.paths.combiner] {
            fs.remove_dir_all(&self.ctx, dir).await?;
        }

        if self.state == OverlayState::Staged {
            self.state = OverlayState::Aborted;
            self.emit(AppEvent::Overlay(OverlayEvent::Aborted {
                combiner: self.paths.combiner.display().to_string(),
            }));
        }
        Ok(())
    }

    async fn remove_scratch(&self) {
        let fs = self.platform.filesystem();
        for dir in [&self.paths.upper, &self.paths.work] {
            if let Err(e) = fs.remove_dir_all(&self.ctx, dir).await {
                tracing::warn!(path = %dir.display(), error = %e, "failed to remove overlay scratch");
            }
        }
    }

    fn expect_state(&self, from: OverlayState, to: OverlayState) -> Result<(), OverlayError> {
        if self.state == from {
            Ok(())
        } else {
            Err(OverlayError::InvalidTransition {
                from: self.state.to_string(),
                to: to.to_string(),
            })
        }
    }
}

impl Drop for OverlayEngine {
    fn drop(&mut self) {
        if self.state == OverlayState::Staged {
            tracing::warn!(
                combiner = %self.paths.combiner.display(),
                "overlay dropped while staged; run cleanup to release it"
            );
        }
    }
}
