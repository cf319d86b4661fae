//! Per-slot image record (`abimage.abr`)

use abroot_config::fixed_paths;
use abroot_errors::{Error, LedgerError};
use abroot_platform::fs;
use abroot_types::ABImage;
use std::path::{Path, PathBuf};

/// Location of the image record inside a root slot
#[must_use]
pub fn record_path(root: &Path) -> PathBuf {
    root.join(fixed_paths::ABIMAGE_FILE)
}

/// Read the image record of the slot mounted at `root`
///
/// # Errors
///
/// Returns `LedgerError::Unreadable` if the file cannot be read and
/// `LedgerError::InvalidImageRecord` if it is not a complete record.
pub async fn read_from(root: &Path) -> Result<ABImage, Error> {
    let path = record_path(root);
    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|e| LedgerError::Unreadable {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

    let image: ABImage = serde_json::from_slice(&bytes).map_err(|e| invalid(&path, e))?;
    if !image.is_complete() {
        return Err(invalid(&path, "digest and image reference must not be empty").into());
    }
    Ok(image)
}

/// Persist `image` as the record of the slot mounted at `root`
///
/// # Errors
///
/// Returns `LedgerError::InvalidImageRecord` for an incomplete record and
/// `LedgerError::WriteFailed` if the file cannot be published.
pub async fn write_to(root: &Path, image: &ABImage) -> Result<(), Error> {
    let path = record_path(root);
    if !image.is_complete() {
        return Err(invalid(&path, "digest and image reference must not be empty").into());
    }

    let payload = serde_json::to_vec_pretty(image)?;
    fs::write_atomic(&path, &payload)
        .await
        .map_err(|e| LedgerError::WriteFailed {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
    tracing::debug!(path = %path.display(), digest = %image.digest, "wrote image record");
    Ok(())
}

fn invalid(path: &Path, message: impl std::fmt::Display) -> LedgerError {
    LedgerError::InvalidImageRecord {
        path: path.display().to_string(),
        message: message.to_string(),
    }
}
