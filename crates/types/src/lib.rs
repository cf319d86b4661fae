#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Core type definitions for the abroot transaction engine
//!
//! This crate provides the plain data shared by every other crate: root slot
//! identifiers, the image provenance record and operation reports.

pub mod image;
pub mod reports;
pub mod slot;

// Re-export commonly used types
pub use image::ABImage;
pub use reports::{PackageChange, PackageDiff, RegistryCheck, UpgradeReport};
pub use slot::SlotId;
pub use uuid::Uuid;

use serde::{Deserialize, Serialize};

/// Output format for reports rendered by a front end
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Plain,
    #[default]
    Tty,
    Json,
}
