//! Root slot identifiers

use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the two root slots of an A/B system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotId {
    A,
    B,
}

impl SlotId {
    /// The opposite slot
    #[must_use]
    pub fn other(self) -> Self {
        match self {
            Self::A => Self::B,
            Self::B => Self::A,
        }
    }

    /// Short lowercase identifier used in state paths (`"a"` / `"b"`)
    #[must_use]
    pub fn identifier(self) -> &'static str {
        match self {
            Self::A => "a",
            Self::B => "b",
        }
    }

    /// Bootloader entry name for the slot (`abroot-a` / `abroot-b`)
    #[must_use]
    pub fn boot_entry_name(self) -> &'static str {
        match self {
            Self::A => "abroot-a",
            Self::B => "abroot-b",
        }
    }

    /// Parse an identifier as produced by [`SlotId::identifier`]
    #[must_use]
    pub fn from_identifier(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "a" => Some(Self::A),
            "b" => Some(Self::B),
            _ => None,
        }
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::A => write!(f, "A"),
            Self::B => write!(f, "B"),
        }
    }
}
