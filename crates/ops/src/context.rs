//! Operations context for dependency injection

use abroot_config::Config;
use abroot_disk::DiskModel;
use abroot_errors::{Error, OpsError};
use abroot_events::{EventEmitter, EventSender};
use abroot_platform::fs;
use abroot_state::{KernelArgsLedger, PackageLedger, StatusCommandProbe};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::external::{DiffService, ImageProvider, InstalledPackages, PackageIndex, RegistryClient};

/// Everything an operation needs, built once per invocation
pub struct OpsCtx {
    /// System configuration
    pub config: Config,
    /// Event sender for progress reporting
    pub tx: EventSender,
    /// Block device model bound to the configured slot labels
    pub disk: DiskModel,
    /// Package ledger (production or dry-run directory)
    pub packages: PackageLedger,
    /// Kernel argument ledger
    pub kargs: KernelArgsLedger,
    pub images: Arc<dyn ImageProvider>,
    pub registry: Arc<dyn RegistryClient>,
    pub diff: Option<Arc<dyn DiffService>>,
    /// Root of the running system, `/` outside of tests
    pub host_root: PathBuf,
    /// Stop before anything touches the future root
    pub dry_run: bool,
}

impl EventEmitter for OpsCtx {
    fn event_sender(&self) -> Option<&EventSender> {
        Some(&self.tx)
    }
}

impl OpsCtx {
    /// Host path of the running system's `relative` path
    #[must_use]
    pub fn host_path(&self, relative: impl AsRef<Path>) -> PathBuf {
        let relative = relative.as_ref();
        self.host_root
            .join(relative.strip_prefix("/").unwrap_or(relative))
    }
}

/// Builder for [`OpsCtx`]
pub struct OpsContextBuilder {
    config: Option<Config>,
    tx: Option<EventSender>,
    images: Option<Arc<dyn ImageProvider>>,
    registry: Option<Arc<dyn RegistryClient>>,
    diff: Option<Arc<dyn DiffService>>,
    index: Option<Arc<dyn PackageIndex>>,
    installed: Option<Arc<dyn InstalledPackages>>,
    host_root: PathBuf,
    dry_run: bool,
}

impl Default for OpsContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl OpsContextBuilder {
    /// Create new context builder
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: None,
            tx: None,
            images: None,
            registry: None,
            diff: None,
            index: None,
            installed: None,
            host_root: PathBuf::from("/"),
            dry_run: false,
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    #[must_use]
    pub fn with_event_sender(mut self, tx: EventSender) -> Self {
        self.tx = Some(tx);
        self
    }

    #[must_use]
    pub fn with_image_provider(mut self, images: Arc<dyn ImageProvider>) -> Self {
        self.images = Some(images);
        self
    }

    #[must_use]
    pub fn with_registry(mut self, registry: Arc<dyn RegistryClient>) -> Self {
        self.registry = Some(registry);
        self
    }

    #[must_use]
    pub fn with_diff_service(mut self, diff: Arc<dyn DiffService>) -> Self {
        self.diff = Some(diff);
        self
    }

    /// Validate additions against a remote package index
    #[must_use]
    pub fn with_package_index(mut self, index: Arc<dyn PackageIndex>) -> Self {
        self.index = Some(index);
        self
    }

    /// Replace the status-command probe of the local package database
    #[must_use]
    pub fn with_installed_packages(mut self, installed: Arc<dyn InstalledPackages>) -> Self {
        self.installed = Some(installed);
        self
    }

    #[must_use]
    pub fn with_host_root(mut self, host_root: impl Into<PathBuf>) -> Self {
        self.host_root = host_root.into();
        self
    }

    /// Point the ledgers at the dry-run scratch directory
    #[must_use]
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Build the context
    ///
    /// # Errors
    ///
    /// Returns `OpsError::MissingComponent` if the event sender, image
    /// provider or registry client is missing, and an I/O error if the
    /// dry-run scratch directory cannot be seeded.
    pub async fn build(self) -> Result<OpsCtx, Error> {
        let config = self.config.unwrap_or_default();
        let tx = self.tx.ok_or_else(|| missing("event sender"))?;
        let images = self.images.ok_or_else(|| missing("image provider"))?;
        let registry = self.registry.ok_or_else(|| missing("registry client"))?;

        let installed = self.installed.unwrap_or_else(|| {
            Arc::new(StatusCommandProbe::new(
                config.packages.status_command.clone(),
                Some(tx.clone()),
            ))
        });
        let mut packages =
            PackageLedger::new(config.state_dir(), config.packages.clone(), installed)
                .with_event_sender(Some(tx.clone()));
        if let Some(index) = self.index {
            packages = packages.with_index(index);
        }

        let mut kargs_path = config.kargs_path();
        if self.dry_run {
            let scratch = config.dry_run_dir();
            packages = packages.into_dry_run(&scratch).await?;
            kargs_path = seed_dry_run_kargs(&kargs_path, &scratch).await?;
        }

        Ok(OpsCtx {
            disk: DiskModel::new(config.partitions.clone(), Some(tx.clone())),
            kargs: KernelArgsLedger::new(kargs_path, Some(tx.clone())),
            packages,
            images,
            registry,
            diff: self.diff,
            host_root: self.host_root,
            dry_run: self.dry_run,
            config,
            tx,
        })
    }
}

/// Copy the production kernel arguments into the scratch directory once
async fn seed_dry_run_kargs(production: &Path, scratch: &Path) -> Result<PathBuf, Error> {
    let file_name = production
        .file_name()
        .map_or_else(|| PathBuf::from("kargs"), PathBuf::from);
    let destination = scratch.join(file_name);
    if !fs::exists(&destination).await && fs::exists(production).await {
        fs::create_dir_all(scratch).await?;
        tokio::fs::copy(production, &destination)
            .await
            .map_err(|e| Error::io_with_path(&e, &destination))?;
    }
    Ok(destination)
}

fn missing(component: &str) -> Error {
    OpsError::MissingComponent {
        component: component.to_string(),
    }
    .into()
}
