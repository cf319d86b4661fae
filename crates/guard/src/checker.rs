//! Integrity checker for one root slot

use abroot_errors::{Error, GuardError};
use abroot_events::{
    AppEvent, EventEmitter, EventSender, FailureContext, GuardEntryKind, GuardEvent,
};
use serde::Serialize;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::skeleton::{etc_paths, relative_link_target, ROOT_PATHS, STANDARD_LINKS};

const DIR_MODE: u32 = 0o755;

/// A skeleton entry that is missing or wrong
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Discrepancy {
    pub kind: GuardEntryKind,
    /// Slot-relative path
    pub path: PathBuf,
}

/// Result of one check
#[derive(Debug, Clone, Default, Serialize)]
pub struct IntegrityReport {
    pub missing: Vec<Discrepancy>,
    /// Slot-relative paths created by the repair
    pub repaired: Vec<PathBuf>,
    pub duration_ms: u64,
}

impl IntegrityReport {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.missing.is_empty()
    }
}

enum EntryState {
    Present,
    Missing,
    /// A symlink with another target
    WrongLink,
    /// Something that is not the expected kind of entry
    Conflict,
}

/// Verifies (and optionally repairs) the skeleton of the slot at `root`
pub struct IntegrityChecker {
    root: PathBuf,
    event_sender: Option<EventSender>,
}

impl EventEmitter for IntegrityChecker {
    fn event_sender(&self) -> Option<&EventSender> {
        self.event_sender.as_ref()
    }
}

impl IntegrityChecker {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, event_sender: Option<EventSender>) -> Self {
        Self {
            root: root.into(),
            event_sender,
        }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Compare the slot against the expected skeleton
    ///
    /// With `repair` set, missing directories are created with mode 0755 and
    /// missing or mispointed links are recreated relative to their location.
    /// A second repairing run on the same slot changes nothing.
    ///
    /// # Errors
    ///
    /// Returns `GuardError::RootMissing` when the slot does not exist,
    /// `GuardError::Conflict` when repair meets an entry of the wrong type,
    /// and `GuardError::RepairFailed` when creating an entry fails.
    pub async fn check(&self, repair: bool) -> Result<IntegrityReport, Error> {
        let start = Instant::now();
        if !tokio::fs::metadata(&self.root)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
        {
            return Err(GuardError::RootMissing {
                path: self.root.display().to_string(),
            }
            .into());
        }

        self.emit(AppEvent::Guard(GuardEvent::VerificationStarted {
            root: self.root.display().to_string(),
            repair,
        }));

        let mut report = IntegrityReport::default();

        for name in STANDARD_LINKS {
            let relative = PathBuf::from(name);
            let expected = relative_link_target(&relative);
            let state = link_state(&self.root.join(&relative), &expected).await;
            self.visit(GuardEntryKind::Link, relative, state, repair, &mut report)
                .await?;
        }

        let directories = ROOT_PATHS
            .iter()
            .map(|name| (GuardEntryKind::RootPath, PathBuf::from(name)))
            .chain(etc_paths().into_iter().map(|p| (GuardEntryKind::EtcPath, p)));
        for (kind, relative) in directories {
            let state = dir_state(&self.root.join(&relative)).await;
            self.visit(kind, relative, state, repair, &mut report).await?;
        }

        report.duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
        tracing::info!(
            root = %self.root.display(),
            missing = report.missing.len(),
            repaired = report.repaired.len(),
            "integrity check finished"
        );
        self.emit(AppEvent::Guard(GuardEvent::VerificationCompleted {
            root: self.root.display().to_string(),
            missing: report.missing.len(),
            repaired: report.repaired.len(),
            duration_ms: report.duration_ms,
        }));
        Ok(report)
    }

    async fn visit(
        &self,
        kind: GuardEntryKind,
        relative: PathBuf,
        state: EntryState,
        repair: bool,
        report: &mut IntegrityReport,
    ) -> Result<(), Error> {
        if matches!(state, EntryState::Present) {
            return Ok(());
        }

        self.emit(AppEvent::Guard(GuardEvent::DiscrepancyReported {
            kind,
            path: relative.display().to_string(),
        }));
        report.missing.push(Discrepancy {
            kind,
            path: relative.clone(),
        });
        if !repair {
            return Ok(());
        }

        if matches!(state, EntryState::Conflict) {
            let expected = match kind {
                GuardEntryKind::Link => "symlink",
                GuardEntryKind::RootPath | GuardEntryKind::EtcPath => "directory",
            };
            return Err(GuardError::Conflict {
                path: self.root.join(&relative).display().to_string(),
                expected: expected.to_string(),
            }
            .into());
        }

        let absolute = self.root.join(&relative);
        let result = match kind {
            GuardEntryKind::Link => {
                let replace = matches!(state, EntryState::WrongLink);
                create_link(&absolute, &relative_link_target(&relative), replace).await
            }
            GuardEntryKind::RootPath | GuardEntryKind::EtcPath => create_dir(&absolute).await,
        };

        match result {
            Ok(()) => {
                tracing::debug!(path = %absolute.display(), ?kind, "repaired skeleton entry");
                self.emit(AppEvent::Guard(GuardEvent::Repaired {
                    kind,
                    path: relative.display().to_string(),
                }));
                report.repaired.push(relative);
                Ok(())
            }
            Err(e) => {
                let error = GuardError::RepairFailed {
                    kind: format!("{kind:?}"),
                    path: absolute.display().to_string(),
                    reason: e.to_string(),
                };
                self.emit(AppEvent::Guard(GuardEvent::HealingFailed {
                    path: absolute.display().to_string(),
                    failure: FailureContext::from_error(&error),
                }));
                Err(error.into())
            }
        }
    }
}

async fn link_state(path: &Path, expected: &Path) -> EntryState {
    match tokio::fs::symlink_metadata(path).await {
        Err(_) => EntryState::Missing,
        Ok(meta) if meta.file_type().is_symlink() => match tokio::fs::read_link(path).await {
            Ok(target) if target == expected => EntryState::Present,
            _ => EntryState::WrongLink,
        },
        Ok(_) => EntryState::Conflict,
    }
}

async fn dir_state(path: &Path) -> EntryState {
    match tokio::fs::metadata(path).await {
        Err(_) => match tokio::fs::symlink_metadata(path).await {
            // Dangling symlink in place of a directory
            Ok(_) => EntryState::Conflict,
            Err(_) => EntryState::Missing,
        },
        Ok(meta) if meta.is_dir() => EntryState::Present,
        Ok(_) => EntryState::Conflict,
    }
}

async fn create_link(link: &Path, target: &Path, replace: bool) -> std::io::Result<()> {
    if replace {
        tokio::fs::remove_file(link).await?;
    }
    tokio::fs::symlink(target, link).await
}

async fn create_dir(path: &Path) -> std::io::Result<()> {
    tokio::fs::DirBuilder::new()
        .recursive(true)
        .mode(DIR_MODE)
        .create(path)
        .await?;
    // The umask may have narrowed the requested mode
    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(DIR_MODE)).await
}
