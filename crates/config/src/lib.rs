#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Configuration management for abroot
//!
//! This crate handles loading and merging configuration from:
//! - Default values (hard-coded)
//! - Configuration file (/etc/abroot/abroot.toml)
//! - Environment variables

pub mod constants;
pub mod core;

pub use constants as fixed_paths;
pub use core::{
    BootConfig, GeneralConfig, ImageConfig, PackagesConfig, PartitionsConfig, PathConfig,
};

use abroot_errors::{ConfigError, Error};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub image: ImageConfig,

    #[serde(default)]
    pub packages: PackagesConfig,

    #[serde(default)]
    pub partitions: PartitionsConfig,

    #[serde(default)]
    pub boot: BootConfig,

    #[serde(default)]
    pub paths: PathConfig,
}

impl Config {
    /// Get the default config file path
    #[must_use]
    pub fn default_path() -> PathBuf {
        PathBuf::from(fixed_paths::CONFIG_FILE)
    }

    /// Load configuration from file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or if the file contents
    /// contain invalid TOML syntax that cannot be parsed.
    pub async fn load_from_file(path: &Path) -> Result<Self, Error> {
        let contents = fs::read_to_string(path)
            .await
            .map_err(|_| ConfigError::NotFound {
                path: path.display().to_string(),
            })?;

        let config: Self = toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration with fallback to defaults
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file exists but cannot be read
    /// or contains invalid TOML syntax.
    pub async fn load() -> Result<Self, Error> {
        let config_path = Self::default_path();

        if config_path.exists() {
            Self::load_from_file(&config_path).await
        } else {
            tracing::debug!(path = %config_path.display(), "no config file, using defaults");
            Ok(Self::default())
        }
    }

    /// Load configuration from an optional path or use default
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read or parsed
    pub async fn load_or_default(path: Option<PathBuf>) -> Result<Self, Error> {
        match path {
            Some(config_path) => Self::load_from_file(&config_path).await,
            None => Self::load().await,
        }
    }

    /// Reject configurations the transaction core cannot act on
    ///
    /// # Errors
    ///
    /// Returns an error naming the first offending field.
    pub fn validate(&self) -> Result<(), Error> {
        let p = &self.partitions;
        if p.label_a.trim().is_empty() {
            return Err(missing("partitions.label_a"));
        }
        if p.label_b.trim().is_empty() {
            return Err(missing("partitions.label_b"));
        }
        if p.label_a == p.label_b {
            return Err(ConfigError::InvalidValue {
                field: "partitions.label_b".to_string(),
                value: p.label_b.clone(),
            }
            .into());
        }
        if self.boot.thin_provisioning && self.boot.thin_init_volume.trim().is_empty() {
            return Err(missing("boot.thin_init_volume"));
        }
        Ok(())
    }

    /// Merge with environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if environment variables contain invalid values
    /// that cannot be parsed into the expected types.
    pub fn merge_env(&mut self) -> Result<(), Error> {
        // ABROOT_KARGS_PATH
        if let Ok(path) = std::env::var("ABROOT_KARGS_PATH") {
            if !path.trim().is_empty() {
                self.paths.kargs_path = Some(PathBuf::from(path));
            }
        }

        // ABROOT_VERBOSE
        if let Ok(verbose) = std::env::var("ABROOT_VERBOSE") {
            self.general.verbose = match verbose.as_str() {
                "true" | "1" | "yes" => true,
                "false" | "0" | "no" => false,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        field: "ABROOT_VERBOSE".to_string(),
                        value: verbose,
                    }
                    .into())
                }
            };
        }

        Ok(())
    }

    /// Get the state directory (with default)
    #[must_use]
    pub fn state_dir(&self) -> PathBuf {
        self.paths
            .state_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(fixed_paths::STATE_DIR))
    }

    /// Get the transaction lock path (with default)
    #[must_use]
    pub fn lock_path(&self) -> PathBuf {
        self.paths
            .lock_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(fixed_paths::LOCK_PATH))
    }

    /// Get the kernel arguments file (with default)
    #[must_use]
    pub fn kargs_path(&self) -> PathBuf {
        self.paths
            .kargs_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(fixed_paths::KARGS_FILE))
    }

    /// Get the overlay scratch directory (with default)
    #[must_use]
    pub fn overlay_dir(&self) -> PathBuf {
        self.paths
            .overlay_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(fixed_paths::OVERLAY_DIR))
    }

    /// Get the dry-run scratch directory (with default)
    #[must_use]
    pub fn dry_run_dir(&self) -> PathBuf {
        self.paths
            .dry_run_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(fixed_paths::DRY_RUN_DIR))
    }
}

fn missing(field: &str) -> Error {
    ConfigError::MissingField {
        field: field.to_string(),
    }
    .into()
}
