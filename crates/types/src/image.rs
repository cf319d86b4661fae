//! Image provenance record

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The OCI image that produced the contents of a root slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ABImage {
    /// Content digest of the image (`sha256:...`)
    pub digest: String,
    /// When the image was committed to the slot
    pub timestamp: DateTime<Utc>,
    /// Full image reference (`registry/name:tag`)
    pub image: String,
}

impl ABImage {
    /// Create a record stamped with the current time
    pub fn new(digest: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            digest: digest.into(),
            timestamp: Utc::now(),
            image: image.into(),
        }
    }

    /// Whether the record carries every field a committed image needs
    #[must_use]
    pub fn is_complete(&self) -> bool {
        !self.digest.trim().is_empty() && !self.image.trim().is_empty()
    }
}
