//! System-wide transaction lock
//!
//! The lock is a sentinel file holding an advisory exclusive `flock` for as
//! long as a transaction runs. The holder writes its owner record into the
//! file, so a file left behind by a crashed process (record present, nobody
//! holding the `flock`) can be told apart from a running transaction. Stale
//! locks are reported, never cleared implicitly.
//!
//! ```ignore
//! let lock = TransactionLock::acquire(&config.lock_path(), "upgrade", sender)?;
//! // ... mutate the future root ...
//! lock.release()?;
//! ```

use abroot_errors::{Error, LockError};
use abroot_events::{AppEvent, EventEmitter, EventSender, LockEvent};
use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};

/// Attempts before giving up on a lock file that keeps being replaced
const ACQUIRE_ATTEMPTS: usize = 3;

/// Who holds (or held) the lock
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockOwner {
    pub pid: u32,
    pub acquired_at: DateTime<Utc>,
    pub operation: String,
}

impl LockOwner {
    fn current(operation: &str) -> Self {
        Self {
            pid: std::process::id(),
            acquired_at: Utc::now(),
            operation: operation.to_string(),
        }
    }
}

/// Observed state of the lock file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "owner", rename_all = "snake_case")]
pub enum LockStatus {
    /// No lock file, or an empty one nobody holds
    Free,
    /// A live process holds the advisory lock
    Held(Option<LockOwner>),
    /// An owner record exists but its process is gone
    Stale(Option<LockOwner>),
}

impl LockStatus {
    #[must_use]
    pub fn is_free(&self) -> bool {
        matches!(self, Self::Free)
    }
}

/// Exclusive transaction lock, released on [`TransactionLock::release`] or drop
pub struct TransactionLock {
    file: Option<File>,
    path: PathBuf,
    owner: LockOwner,
    event_sender: Option<EventSender>,
}

impl EventEmitter for TransactionLock {
    fn event_sender(&self) -> Option<&EventSender> {
        self.event_sender.as_ref()
    }
}

impl std::fmt::Debug for TransactionLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionLock")
            .field("path", &self.path)
            .field("owner", &self.owner)
            .field("held", &self.file.is_some())
            .finish()
    }
}

impl TransactionLock {
    /// Take the lock without blocking
    ///
    /// # Errors
    ///
    /// Returns `LockError::Held` when another process holds the lock,
    /// `LockError::Stale` when a crashed owner left its record behind, and
    /// `LockError::Io` when the lock file cannot be opened or written.
    pub fn acquire(
        path: &Path,
        operation: &str,
        event_sender: Option<EventSender>,
    ) -> Result<Self, Error> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| io_error(path, &e))?;
        }

        for _ in 0..ACQUIRE_ATTEMPTS {
            let mut file = OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(false)
                .open(path)
                .map_err(|e| io_error(path, &e))?;

            match file.try_lock_exclusive() {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::WouldBlock => {
                    let owner = read_owner(path);
                    tracing::debug!(path = %path.display(), pid = ?owner.as_ref().map(|o| o.pid), "transaction lock busy");
                    return Err(held(path, owner.as_ref()).into());
                }
                Err(e) => return Err(io_error(path, &e).into()),
            }

            // The previous holder may have unlinked the file between our open
            // and our flock; that inode no longer guards anything.
            if !same_file(&file, path) {
                let _ = FileExt::unlock(&file);
                continue;
            }

            let mut previous = String::new();
            file.read_to_string(&mut previous)
                .map_err(|e| io_error(path, &e))?;
            if !previous.trim().is_empty() {
                let owner = parse_owner(&previous);
                let _ = FileExt::unlock(&file);
                event_sender.emit(AppEvent::Lock(LockEvent::StaleDetected {
                    path: path.display().to_string(),
                    pid: owner.as_ref().map(|o| o.pid),
                }));
                return Err(stale(path, owner.as_ref()).into());
            }

            let owner = LockOwner::current(operation);
            let record = serde_json::to_vec(&owner)?;
            file.set_len(0).map_err(|e| io_error(path, &e))?;
            file.seek(SeekFrom::Start(0))
                .map_err(|e| io_error(path, &e))?;
            file.write_all(&record).map_err(|e| io_error(path, &e))?;
            file.sync_all().map_err(|e| io_error(path, &e))?;

            tracing::info!(path = %path.display(), pid = owner.pid, operation, "acquired transaction lock");
            let lock = Self {
                file: Some(file),
                path: path.to_path_buf(),
                owner,
                event_sender,
            };
            lock.emit(AppEvent::Lock(LockEvent::Acquired {
                path: lock.path.display().to_string(),
                pid: lock.owner.pid,
                operation: lock.owner.operation.clone(),
            }));
            return Ok(lock);
        }

        Err(LockError::Io {
            path: path.display().to_string(),
            message: "lock file was replaced repeatedly while acquiring".to_string(),
        }
        .into())
    }

    /// Report the lock state without taking it
    ///
    /// # Errors
    ///
    /// Returns `LockError::Io` if the lock file exists but cannot be read.
    pub fn inspect(path: &Path) -> Result<LockStatus, Error> {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(LockStatus::Free),
            Err(e) => return Err(io_error(path, &e).into()),
        };

        match file.try_lock_exclusive() {
            Ok(()) => {
                let _ = FileExt::unlock(&file);
                let content = fs::read_to_string(path).unwrap_or_default();
                if content.trim().is_empty() {
                    Ok(LockStatus::Free)
                } else {
                    Ok(LockStatus::Stale(parse_owner(&content)))
                }
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => Ok(LockStatus::Held(read_owner(path))),
            Err(e) => Err(io_error(path, &e).into()),
        }
    }

    /// Remove a lock file nobody holds
    ///
    /// Returns `false` when there was nothing to clear.
    ///
    /// # Errors
    ///
    /// Returns `LockError::Held` if a live process holds the lock.
    pub fn clear_stale(path: &Path, event_sender: Option<EventSender>) -> Result<bool, Error> {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(io_error(path, &e).into()),
        };

        match file.try_lock_exclusive() {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::WouldBlock => {
                return Err(held(path, read_owner(path).as_ref()).into());
            }
            Err(e) => return Err(io_error(path, &e).into()),
        }

        let removed = fs::remove_file(path);
        let _ = FileExt::unlock(&file);
        match removed {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(io_error(path, &e).into()),
        }

        tracing::warn!(path = %path.display(), "cleared stale transaction lock");
        event_sender.emit(AppEvent::Lock(LockEvent::StaleCleared {
            path: path.display().to_string(),
        }));
        Ok(true)
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn owner(&self) -> &LockOwner {
        &self.owner
    }

    /// Release the lock and remove the sentinel file
    ///
    /// # Errors
    ///
    /// Returns `LockError::Io` if the sentinel file cannot be removed.
    pub fn release(mut self) -> Result<(), Error> {
        self.release_inner()
    }

    fn release_inner(&mut self) -> Result<(), Error> {
        let Some(file) = self.file.take() else {
            return Ok(());
        };

        // Unlink while still holding the flock so no waiter can lock the
        // inode we are about to abandon.
        let removed = match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error(&self.path, &e)),
        };
        let _ = FileExt::unlock(&file);
        drop(file);

        tracing::info!(path = %self.path.display(), "released transaction lock");
        self.emit(AppEvent::Lock(LockEvent::Released {
            path: self.path.display().to_string(),
        }));
        removed.map_err(Error::from)
    }
}

impl Drop for TransactionLock {
    fn drop(&mut self) {
        if let Err(e) = self.release_inner() {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to release transaction lock");
        }
    }
}

fn same_file(file: &File, path: &Path) -> bool {
    match (file.metadata(), fs::metadata(path)) {
        (Ok(held), Ok(named)) => held.dev() == named.dev() && held.ino() == named.ino(),
        _ => false,
    }
}

fn read_owner(path: &Path) -> Option<LockOwner> {
    fs::read_to_string(path)
        .ok()
        .and_then(|content| parse_owner(&content))
}

fn parse_owner(content: &str) -> Option<LockOwner> {
    serde_json::from_str(content.trim()).ok()
}

fn held(path: &Path, owner: Option<&LockOwner>) -> LockError {
    LockError::Held {
        path: path.display().to_string(),
        pid: owner.map(|o| o.pid),
        since: owner.map(|o| o.acquired_at.to_rfc3339()),
    }
}

fn stale(path: &Path, owner: Option<&LockOwner>) -> LockError {
    LockError::Stale {
        path: path.display().to_string(),
        pid: owner.map(|o| o.pid),
        since: owner.map(|o| o.acquired_at.to_rfc3339()),
    }
}

fn io_error(path: &Path, err: &std::io::Error) -> LockError {
    LockError::Io {
        path: path.display().to_string(),
        message: err.to_string(),
    }
}
