//! Kernel command-line ledger

use abroot_config::fixed_paths;
use abroot_errors::{Error, LedgerError};
use abroot_events::{AppEvent, EventEmitter, EventSender, LedgerEvent};
use abroot_platform::fs;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Canonical form of a kernel command line
///
/// Tokens are split on any whitespace, duplicates are dropped keeping the
/// first occurrence, and the result is joined with single spaces.
#[must_use]
pub fn kargs_format(content: &str) -> String {
    let mut seen = HashSet::new();
    content
        .split_whitespace()
        .filter(|token| seen.insert(*token))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Flat-file kernel arguments with a `.bak` copy of the previous content
pub struct KernelArgsLedger {
    path: PathBuf,
    event_sender: Option<EventSender>,
}

impl EventEmitter for KernelArgsLedger {
    fn event_sender(&self) -> Option<&EventSender> {
        self.event_sender.as_ref()
    }
}

impl KernelArgsLedger {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, event_sender: Option<EventSender>) -> Self {
        Self {
            path: path.into(),
            event_sender,
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn backup_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".bak");
        PathBuf::from(name)
    }

    /// Current kernel arguments, seeding the defaults on first use
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Unreadable` if the file exists but cannot be read
    /// and `LedgerError::WriteFailed` if the defaults cannot be written.
    pub async fn read(&self) -> Result<String, Error> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => Ok(kargs_format(&content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "seeding default kernel arguments");
                self.write(fixed_paths::DEFAULT_KARGS).await
            }
            Err(e) => Err(LedgerError::Unreadable {
                path: self.path.display().to_string(),
                message: e.to_string(),
            }
            .into()),
        }
    }

    /// Replace the kernel arguments, keeping the old file as `<path>.bak`
    ///
    /// Returns the normalized content that was written.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::WriteFailed` if the backup or the new file cannot
    /// be written.
    pub async fn write(&self, content: &str) -> Result<String, Error> {
        let formatted = kargs_format(content);
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let backup = match tokio::fs::read(&self.path).await {
            Ok(previous) => {
                let backup = self.backup_path();
                fs::write_atomic(&backup, &previous)
                    .await
                    .map_err(|e| write_failed(&backup, &e))?;
                Some(backup)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                return Err(LedgerError::Unreadable {
                    path: self.path.display().to_string(),
                    message: e.to_string(),
                }
                .into())
            }
        };

        let mut payload = formatted.clone();
        payload.push('\n');
        fs::write_atomic(&self.path, payload.as_bytes())
            .await
            .map_err(|e| write_failed(&self.path, &e))?;

        self.emit(AppEvent::Ledger(LedgerEvent::KargsWritten {
            path: self.path.display().to_string(),
            backup: backup.map(|p| p.display().to_string()),
        }));
        Ok(formatted)
    }

    /// Append `tokens` not already present
    ///
    /// Returns `false` without touching the file when nothing was new.
    ///
    /// # Errors
    ///
    /// See [`KernelArgsLedger::write`].
    pub async fn add(&self, tokens: &str) -> Result<bool, Error> {
        let current = self.read().await?;
        let updated = kargs_format(&format!("{current} {tokens}"));
        if updated == current {
            return Ok(false);
        }
        self.write(&updated).await?;
        Ok(true)
    }

    /// Drop every occurrence of `tokens`
    ///
    /// Returns `false` without touching the file when none was present.
    ///
    /// # Errors
    ///
    /// See [`KernelArgsLedger::write`].
    pub async fn remove(&self, tokens: &str) -> Result<bool, Error> {
        let current = self.read().await?;
        let unwanted: HashSet<&str> = tokens.split_whitespace().collect();
        let updated = current
            .split_whitespace()
            .filter(|token| !unwanted.contains(token))
            .collect::<Vec<_>>()
            .join(" ");
        if updated == current {
            return Ok(false);
        }
        self.write(&updated).await?;
        Ok(true)
    }
}

fn write_failed(path: &Path, err: &Error) -> LedgerError {
    LedgerError::WriteFailed {
        path: path.display().to_string(),
        message: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_collapses_duplicates_in_order() {
        assert_eq!(kargs_format("quiet quiet splash"), "quiet splash");
        assert_eq!(
            kargs_format("  quiet\nsplash\t\tquiet  nomodeset \n"),
            "quiet splash nomodeset"
        );
        assert_eq!(kargs_format(""), "");
    }

    #[test]
    fn format_is_idempotent() {
        for input in [
            "quiet splash bgrt_disable $vt_handoff",
            "a b a c b\n d",
            "   ",
            "root=UUID=1234 ro quiet",
        ] {
            let once = kargs_format(input);
            assert_eq!(kargs_format(&once), once);
        }
    }
}
