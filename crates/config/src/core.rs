//! Configuration sections

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// General application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GeneralConfig {
    #[serde(default)]
    pub verbose: bool,
}

/// Image the future root is built from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageConfig {
    #[serde(default = "default_registry")]
    pub registry: String,
    #[serde(default = "default_image_name")]
    pub name: String,
    #[serde(default = "default_image_tag")]
    pub tag: String,
}

impl ImageConfig {
    /// Full image reference (`registry/name:tag`)
    #[must_use]
    pub fn reference(&self) -> String {
        format!("{}/{}:{}", self.registry, self.name, self.tag)
    }
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            registry: default_registry(),
            name: default_image_name(),
            tag: default_image_tag(),
        }
    }
}

/// Package manager commands run inside a staged root
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackagesConfig {
    #[serde(default)]
    pub pre_command: String,
    #[serde(default)]
    pub post_command: String,
    #[serde(default = "default_add_command")]
    pub add_command: String,
    #[serde(default = "default_remove_command")]
    pub remove_command: String,
    /// Exits zero when `{pkg}` is installed
    #[serde(default = "default_status_command")]
    pub status_command: String,
    /// Package index lookup, `{pkg}` is substituted
    #[serde(default)]
    pub index_url: Option<String>,
}

impl Default for PackagesConfig {
    fn default() -> Self {
        Self {
            pre_command: String::new(),
            post_command: String::new(),
            add_command: default_add_command(),
            remove_command: default_remove_command(),
            status_command: default_status_command(),
            index_url: None,
        }
    }
}

/// Partition labels of the two-slot layout
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartitionsConfig {
    #[serde(default = "default_label_a")]
    pub label_a: String,
    #[serde(default = "default_label_b")]
    pub label_b: String,
    #[serde(default = "default_label_boot")]
    pub label_boot: String,
    #[serde(default = "default_label_efi")]
    pub label_efi: String,
    #[serde(default = "default_label_var")]
    pub label_var: String,
    #[serde(default)]
    pub crypt_var: bool,
}

impl Default for PartitionsConfig {
    fn default() -> Self {
        Self {
            label_a: default_label_a(),
            label_b: default_label_b(),
            label_boot: default_label_boot(),
            label_efi: default_label_efi(),
            label_var: default_label_var(),
            crypt_var: false,
        }
    }
}

/// Bootloader layout
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BootConfig {
    /// Each slot owns a boot volume under `thin_init_volume`
    #[serde(default)]
    pub thin_provisioning: bool,
    #[serde(default)]
    pub thin_init_volume: String,
}

/// Path overrides
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PathConfig {
    pub state_dir: Option<PathBuf>,
    pub lock_path: Option<PathBuf>,
    pub kargs_path: Option<PathBuf>,
    pub overlay_dir: Option<PathBuf>,
    pub dry_run_dir: Option<PathBuf>,
}

// Default value functions for serde
fn default_registry() -> String {
    "ghcr.io".to_string()
}

fn default_image_name() -> String {
    "vanilla-os/desktop".to_string()
}

fn default_image_tag() -> String {
    "main".to_string()
}

fn default_add_command() -> String {
    "apt-get install -y".to_string()
}

fn default_remove_command() -> String {
    "apt-get remove -y --autoremove".to_string()
}

fn default_status_command() -> String {
    "dpkg -s {pkg}".to_string()
}

fn default_label_a() -> String {
    "vos-a".to_string()
}

fn default_label_b() -> String {
    "vos-b".to_string()
}

fn default_label_boot() -> String {
    "vos-boot".to_string()
}

fn default_label_efi() -> String {
    "vos-efi".to_string()
}

fn default_label_var() -> String {
    "vos-var".to_string()
}
