//! Package ledger layered on top of the image
//!
//! Two flat files under the ledger's base directory hold the packages the
//! operator wants added to or removed from the image, one name per line. A
//! separate summary inside each root slot records what the last committed
//! transaction actually applied (`+name` / `-name`), which is what drift
//! detection compares against.

use abroot_config::{fixed_paths, PackagesConfig};
use abroot_errors::{Error, LedgerError};
use abroot_events::{AppEvent, EventEmitter, EventSender, LedgerEvent};
use abroot_platform::{fs, Platform, PlatformContext};
use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Remote package index consulted before staging an addition
#[async_trait]
pub trait PackageIndex: Send + Sync {
    async fn exists(&self, name: &str) -> Result<bool, Error>;
}

/// Local package database of the running system
#[async_trait]
pub trait InstalledPackages: Send + Sync {
    async fn is_installed(&self, name: &str) -> Result<bool, Error>;
}

/// Probe the package database with the configured status command
///
/// The command runs through `sh -c` with `{pkg}` replaced by the package
/// name; exit status zero means installed.
pub struct StatusCommandProbe {
    platform: Platform,
    ctx: PlatformContext,
    status_command: String,
}

impl StatusCommandProbe {
    #[must_use]
    pub fn new(status_command: impl Into<String>, event_sender: Option<EventSender>) -> Self {
        let platform = Platform::current();
        let ctx = platform.create_context(event_sender);
        Self {
            platform,
            ctx,
            status_command: status_command.into(),
        }
    }
}

#[async_trait]
impl InstalledPackages for StatusCommandProbe {
    async fn is_installed(&self, name: &str) -> Result<bool, Error> {
        let script = self.status_command.replace("{pkg}", name);
        let mut cmd = self.platform.command("sh");
        cmd.args(["-c", script.as_str()]);
        let output = self.platform.execute_command(&self.ctx, cmd).await?;
        Ok(output.success())
    }
}

/// Outcome of an add or remove request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerChange {
    /// The name was appended to the target list
    Staged,
    /// The name was dropped from the opposite list instead
    Cancelled,
    /// The name was already in the target list
    Unchanged,
}

/// Packages whose ledger state differs from the applied summary
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UnstagedPackages {
    pub add: Vec<String>,
    pub remove: Vec<String>,
}

impl UnstagedPackages {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.remove.is_empty()
    }
}

/// Add/remove ledger bound to one base directory
pub struct PackageLedger {
    base_dir: PathBuf,
    commands: PackagesConfig,
    installed: Arc<dyn InstalledPackages>,
    index: Option<Arc<dyn PackageIndex>>,
    event_sender: Option<EventSender>,
}

impl EventEmitter for PackageLedger {
    fn event_sender(&self) -> Option<&EventSender> {
        self.event_sender.as_ref()
    }
}

impl PackageLedger {
    #[must_use]
    pub fn new(
        base_dir: impl Into<PathBuf>,
        commands: PackagesConfig,
        installed: Arc<dyn InstalledPackages>,
    ) -> Self {
        Self {
            base_dir: base_dir.into(),
            commands,
            installed,
            index: None,
            event_sender: None,
        }
    }

    #[must_use]
    pub fn with_index(mut self, index: Arc<dyn PackageIndex>) -> Self {
        self.index = Some(index);
        self
    }

    #[must_use]
    pub fn with_event_sender(mut self, event_sender: Option<EventSender>) -> Self {
        self.event_sender = event_sender;
        self
    }

    /// Rebind the ledger to a scratch directory for a dry run
    ///
    /// The scratch copy is seeded from the current ledger only when it holds
    /// no ledger yet, so repeated dry runs keep their own edits.
    ///
    /// # Errors
    ///
    /// Returns an error if the scratch directory cannot be prepared.
    pub async fn into_dry_run(mut self, scratch_dir: &Path) -> Result<Self, Error> {
        fs::create_dir_all(scratch_dir).await?;
        for file in [fixed_paths::PACKAGES_ADD_FILE, fixed_paths::PACKAGES_REMOVE_FILE] {
            let source = self.base_dir.join(file);
            let destination = scratch_dir.join(file);
            if fs::exists(&destination).await || !fs::exists(&source).await {
                continue;
            }
            tokio::fs::copy(&source, &destination)
                .await
                .map_err(|e| Error::io_with_path(&e, &destination))?;
        }
        tracing::debug!(scratch = %scratch_dir.display(), "package ledger switched to dry-run directory");
        self.base_dir = scratch_dir.to_path_buf();
        Ok(self)
    }

    #[must_use]
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    #[must_use]
    pub fn add_path(&self) -> PathBuf {
        self.base_dir.join(fixed_paths::PACKAGES_ADD_FILE)
    }

    #[must_use]
    pub fn remove_path(&self) -> PathBuf {
        self.base_dir.join(fixed_paths::PACKAGES_REMOVE_FILE)
    }

    /// Location of the applied summary inside the system tree at `root`
    #[must_use]
    pub fn summary_path(root: &Path) -> PathBuf {
        root.join(fixed_paths::PACKAGES_SUMMARY_DIR)
            .join(fixed_paths::PACKAGES_SUMMARY_FILE)
    }

    /// Packages staged for installation, in staging order
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Unreadable` if the ledger file exists but cannot be read.
    pub async fn list_add(&self) -> Result<Vec<String>, Error> {
        read_list(&self.add_path()).await
    }

    /// Packages staged for removal, in staging order
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Unreadable` if the ledger file exists but cannot be read.
    pub async fn list_remove(&self) -> Result<Vec<String>, Error> {
        read_list(&self.remove_path()).await
    }

    /// Stage `name` for installation
    ///
    /// A pending removal of the same name is cancelled instead.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::InvalidPackageName` for malformed names and
    /// `LedgerError::PackageNotInIndex` when a configured index lacks the package.
    pub async fn add(&self, name: &str) -> Result<LedgerChange, Error> {
        validate_name(name)?;
        let mut add = self.list_add().await?;
        if add.iter().any(|p| p == name) {
            return Ok(LedgerChange::Unchanged);
        }

        let mut remove = self.list_remove().await?;
        if let Some(pos) = remove.iter().position(|p| p == name) {
            remove.remove(pos);
            write_list(&self.remove_path(), &remove).await?;
            self.emit(AppEvent::Ledger(LedgerEvent::PackageAdded {
                name: name.to_string(),
                cancelled_removal: true,
            }));
            return Ok(LedgerChange::Cancelled);
        }

        if let Some(index) = &self.index {
            if !index.exists(name).await? {
                return Err(LedgerError::PackageNotInIndex {
                    package: name.to_string(),
                }
                .into());
            }
        }

        add.push(name.to_string());
        write_list(&self.add_path(), &add).await?;
        self.emit(AppEvent::Ledger(LedgerEvent::PackageAdded {
            name: name.to_string(),
            cancelled_removal: false,
        }));
        Ok(LedgerChange::Staged)
    }

    /// Stage `name` for removal
    ///
    /// A pending addition of the same name is cancelled instead.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::InvalidPackageName` for malformed names and
    /// `LedgerError::PackageNotInstalled` when the package is neither pending
    /// nor installed.
    pub async fn remove(&self, name: &str) -> Result<LedgerChange, Error> {
        validate_name(name)?;
        let mut remove = self.list_remove().await?;
        if remove.iter().any(|p| p == name) {
            return Ok(LedgerChange::Unchanged);
        }

        let mut add = self.list_add().await?;
        if let Some(pos) = add.iter().position(|p| p == name) {
            add.remove(pos);
            write_list(&self.add_path(), &add).await?;
            self.emit(AppEvent::Ledger(LedgerEvent::PackageRemoved {
                name: name.to_string(),
                cancelled_addition: true,
            }));
            return Ok(LedgerChange::Cancelled);
        }

        if !self.installed.is_installed(name).await? {
            return Err(LedgerError::PackageNotInstalled {
                package: name.to_string(),
            }
            .into());
        }

        remove.push(name.to_string());
        write_list(&self.remove_path(), &remove).await?;
        self.emit(AppEvent::Ledger(LedgerEvent::PackageRemoved {
            name: name.to_string(),
            cancelled_addition: false,
        }));
        Ok(LedgerChange::Staged)
    }

    /// Compare the ledgers with the summary applied to the system tree at `root`
    ///
    /// Reports the symmetric difference: a pending name the summary never
    /// recorded, and a recorded name the ledger no longer carries.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Unreadable` if a ledger or the summary cannot be read.
    pub async fn get_unstaged_packages(&self, root: &Path) -> Result<UnstagedPackages, Error> {
        let add = self.list_add().await?;
        let remove = self.list_remove().await?;
        let (applied_add, applied_remove) = read_summary(&Self::summary_path(root)).await?;
        Ok(unstaged(&add, &remove, &applied_add, &applied_remove))
    }

    /// Record the current ledgers as applied to the system tree at `root`
    ///
    /// Returns the number of summary entries written.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::WriteFailed` if the summary cannot be published.
    pub async fn write_summary(&self, root: &Path) -> Result<usize, Error> {
        let add = self.list_add().await?;
        let remove = self.list_remove().await?;
        let path = Self::summary_path(root);

        let mut content = String::new();
        for name in &add {
            content.push('+');
            content.push_str(name);
            content.push('\n');
        }
        for name in &remove {
            content.push('-');
            content.push_str(name);
            content.push('\n');
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write_atomic(&path, content.as_bytes())
            .await
            .map_err(|e| write_failed(&path, &e))?;

        let entries = add.len() + remove.len();
        self.emit(AppEvent::Ledger(LedgerEvent::SummaryWritten {
            path: path.display().to_string(),
            entries,
        }));
        Ok(entries)
    }

    /// Align the applied summary at `root` with the ledgers
    ///
    /// Returns the drift that was discarded.
    ///
    /// # Errors
    ///
    /// Returns an error if the summary cannot be read or rewritten.
    pub async fn clear_unstaged(&self, root: &Path) -> Result<UnstagedPackages, Error> {
        let drift = self.get_unstaged_packages(root).await?;
        if !drift.is_empty() {
            self.write_summary(root).await?;
            tracing::info!(
                add = drift.add.len(),
                remove = drift.remove.len(),
                "cleared unstaged packages"
            );
        }
        Ok(drift)
    }

    /// Shell command applying both ledgers inside a transaction
    ///
    /// Segments are joined with `&&`; empty segments are left out and an
    /// empty ledger yields an empty command.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Unreadable` if a ledger file cannot be read.
    pub async fn final_command(&self) -> Result<String, Error> {
        let add = self.list_add().await?;
        let remove = self.list_remove().await?;
        Ok(compose_command(&self.commands, &add, &remove))
    }
}

fn compose_command(commands: &PackagesConfig, add: &[String], remove: &[String]) -> String {
    if add.is_empty() && remove.is_empty() {
        return String::new();
    }

    let mut segments: Vec<String> = Vec::new();
    if !commands.pre_command.trim().is_empty() {
        segments.push(commands.pre_command.trim().to_string());
    }
    if !add.is_empty() {
        segments.push(format!("{} {}", commands.add_command.trim(), add.join(" ")));
    }
    if !remove.is_empty() {
        segments.push(format!(
            "{} {}",
            commands.remove_command.trim(),
            remove.join(" ")
        ));
    }
    if !commands.post_command.trim().is_empty() {
        segments.push(commands.post_command.trim().to_string());
    }
    segments.join(" && ")
}

fn unstaged(
    add: &[String],
    remove: &[String],
    applied_add: &[String],
    applied_remove: &[String],
) -> UnstagedPackages {
    let missing = |wanted: &[String], have: &[String]| -> Vec<String> {
        let have: HashSet<&str> = have.iter().map(String::as_str).collect();
        wanted
            .iter()
            .filter(|p| !have.contains(p.as_str()))
            .cloned()
            .collect()
    };

    let mut to_add = missing(add, applied_add);
    let mut to_remove = missing(remove, applied_remove);
    // Applied entries the ledger dropped since the last commit
    to_add.extend(missing(applied_remove, remove));
    to_remove.extend(missing(applied_add, add));

    UnstagedPackages {
        add: dedup(to_add),
        remove: dedup(to_remove),
    }
}

fn validate_name(name: &str) -> Result<(), LedgerError> {
    let valid = !name.is_empty()
        && !name.starts_with('-')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.' | '_' | ':'));
    if valid {
        Ok(())
    } else {
        Err(LedgerError::InvalidPackageName {
            package: name.to_string(),
        })
    }
}

fn dedup(names: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    names
        .into_iter()
        .filter(|name| seen.insert(name.clone()))
        .collect()
}

async fn read_file(path: &Path) -> Result<String, Error> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => Ok(content),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
        Err(e) => Err(LedgerError::Unreadable {
            path: path.display().to_string(),
            message: e.to_string(),
        }
        .into()),
    }
}

async fn read_list(path: &Path) -> Result<Vec<String>, Error> {
    let content = read_file(path).await?;
    Ok(dedup(
        content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect(),
    ))
}

async fn write_list(path: &Path, names: &[String]) -> Result<(), Error> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    let mut content = names.join("\n");
    if !content.is_empty() {
        content.push('\n');
    }
    fs::write_atomic(path, content.as_bytes())
        .await
        .map_err(|e| write_failed(path, &e).into())
}

async fn read_summary(path: &Path) -> Result<(Vec<String>, Vec<String>), Error> {
    let content = read_file(path).await?;
    let mut added = Vec::new();
    let mut removed = Vec::new();
    for line in content.lines().map(str::trim) {
        if let Some(name) = line.strip_prefix('+') {
            added.push(name.trim().to_string());
        } else if let Some(name) = line.strip_prefix('-') {
            removed.push(name.trim().to_string());
        }
    }
    Ok((dedup(added), dedup(removed)))
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

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn drift_reports_only_unrecorded_additions() {
        let drift = unstaged(&names(&["foo", "bar"]), &[], &names(&["foo"]), &[]);
        assert_eq!(drift.add, names(&["bar"]));
        assert!(drift.remove.is_empty());
    }

    #[test]
    fn drift_covers_entries_dropped_from_ledger() {
        let drift = unstaged(&[], &[], &names(&["vim"]), &names(&["nano"]));
        assert_eq!(drift.add, names(&["nano"]));
        assert_eq!(drift.remove, names(&["vim"]));
    }

    #[test]
    fn command_skips_empty_segments() {
        let commands = PackagesConfig::default();
        let cmd = compose_command(&commands, &names(&["htop", "git"]), &[]);
        assert_eq!(cmd, "apt-get install -y htop git");

        let mut commands = PackagesConfig::default();
        commands.pre_command = "apt-get update".to_string();
        commands.post_command = "apt-get clean".to_string();
        let cmd = compose_command(&commands, &[], &names(&["nano"]));
        assert_eq!(
            cmd,
            "apt-get update && apt-get remove -y --autoremove nano && apt-get clean"
        );
    }

    #[test]
    fn empty_ledger_gives_empty_command() {
        let mut commands = PackagesConfig::default();
        commands.pre_command = "apt-get update".to_string();
        assert_eq!(compose_command(&commands, &[], &[]), "");
    }

    #[test]
    fn package_names_are_validated() {
        assert!(validate_name("libfoo1:amd64").is_ok());
        assert!(validate_name("g++-12").is_ok());
        assert!(validate_name("").is_err());
        assert!(validate_name("-rf").is_err());
        assert!(validate_name("foo; rm -rf /").is_err());
        assert!(validate_name("a b").is_err());
    }
}
