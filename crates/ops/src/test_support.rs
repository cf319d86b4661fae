//! Fakes shared by the unit tests

use abroot_config::{Config, PathConfig};
use abroot_errors::Error;
use abroot_types::RegistryCheck;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

use crate::{ImageProvider, InstalledPackages, OpsContextBuilder, OpsCtx, RegistryClient};

pub struct FakeImages;

#[async_trait]
impl ImageProvider for FakeImages {
    async fn pull(&self, _reference: &str) -> Result<PathBuf, Error> {
        Err(Error::internal("no images in tests"))
    }
}

pub struct FakeRegistry;

#[async_trait]
impl RegistryClient for FakeRegistry {
    async fn check(&self, _reference: &str, current_digest: &str) -> Result<RegistryCheck, Error> {
        Ok(RegistryCheck {
            digest: current_digest.to_string(),
            available: false,
        })
    }
}

pub struct NothingInstalled;

#[async_trait]
impl InstalledPackages for NothingInstalled {
    async fn is_installed(&self, _name: &str) -> Result<bool, Error> {
        Ok(false)
    }
}

pub struct TestEnv {
    pub temp: TempDir,
}

impl TestEnv {
    pub fn new() -> Self {
        Self {
            temp: TempDir::new().unwrap(),
        }
    }

    pub fn config(&self) -> Config {
        let base = self.temp.path();
        Config {
            paths: PathConfig {
                state_dir: Some(base.join("state")),
                lock_path: Some(base.join("abroot.lock")),
                kargs_path: Some(base.join("state/kargs")),
                overlay_dir: Some(base.join("overlay")),
                dry_run_dir: Some(base.join("dry-run")),
            },
            ..Config::default()
        }
    }

    pub fn host_root(&self) -> PathBuf {
        self.temp.path().join("host")
    }
}

pub async fn test_ctx(env: &TestEnv) -> OpsCtx {
    let (tx, _rx) = abroot_events::channel();
    OpsContextBuilder::new()
        .with_config(env.config())
        .with_event_sender(tx)
        .with_image_provider(Arc::new(FakeImages))
        .with_registry(Arc::new(FakeRegistry))
        .with_installed_packages(Arc::new(NothingInstalled))
        .with_host_root(env.host_root())
        .build()
        .await
        .unwrap()
}
