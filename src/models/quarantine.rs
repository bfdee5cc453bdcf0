//! Quarantine (issues) data model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Why a file was quarantined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuarantineReason {
    Unparsed,
    NoCatalogMatch,
}

impl std::fmt::Display for QuarantineReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QuarantineReason::Unparsed => write!(f, "unparsed"),
            QuarantineReason::NoCatalogMatch => write!(f, "no-catalog-match"),
        }
    }
}

/// A file held in the quarantine root.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuarantinedFile {
    /// Current location inside the quarantine root.
    pub path: PathBuf,
    /// Where the file came from.
    pub original_path: PathBuf,
    pub arrived_at: DateTime<Utc>,
    pub reason: QuarantineReason,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Optional grouping label (usually the source folder name).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}
