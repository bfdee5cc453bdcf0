//! Scan job data model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// What a scan covers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum ScanScope {
    /// Every library folder and download folder, plus link reconciliation.
    Full,
    /// Download folders only.
    Quick,
    /// Root folders of shows still airing.
    OngoingOnly,
    SingleShow { show_id: Uuid },
    SingleFolder { path: PathBuf },
    /// Shows and/or movies by id.
    SelectedItems { ids: Vec<Uuid> },
}

impl ScanScope {
    pub fn class(&self) -> ScopeClass {
        match self {
            ScanScope::Full => ScopeClass::Full,
            ScanScope::Quick => ScopeClass::Quick,
            ScanScope::OngoingOnly => ScopeClass::OngoingOnly,
            ScanScope::SingleShow { .. } => ScopeClass::SingleShow,
            ScanScope::SingleFolder { .. } => ScopeClass::SingleFolder,
            ScanScope::SelectedItems { .. } => ScopeClass::SelectedItems,
        }
    }
}

/// Single-flight key: at most one running job per class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeClass {
    Full,
    Quick,
    OngoingOnly,
    SingleShow,
    SingleFolder,
    SelectedItems,
}

impl std::fmt::Display for ScopeClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ScopeClass::Full => "full",
            ScopeClass::Quick => "quick",
            ScopeClass::OngoingOnly => "ongoing-only",
            ScopeClass::SingleShow => "single-show",
            ScopeClass::SingleFolder => "single-folder",
            ScopeClass::SelectedItems => "selected-items",
        };
        write!(f, "{}", s)
    }
}

/// State of a recorded job; a class with no record is idle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Running,
    Completed,
    Failed,
}

/// What happened to one file during a pipeline pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemOutcome {
    /// Moved/linked into the library.
    Added,
    /// Waiting for review.
    Proposed,
    /// Left in place.
    Skipped,
    Quarantined,
    Errored,
}

impl std::fmt::Display for ItemOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ItemOutcome::Added => "added",
            ItemOutcome::Proposed => "proposed",
            ItemOutcome::Skipped => "skipped",
            ItemOutcome::Quarantined => "quarantined",
            ItemOutcome::Errored => "errored",
        };
        write!(f, "{}", s)
    }
}

/// One row of a scan result table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanItem {
    pub path: PathBuf,
    pub outcome: ItemOutcome,
    pub reason: String,
}

/// Structured result of a scan.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanSummary {
    pub added: usize,
    pub proposed: usize,
    pub skipped: usize,
    pub quarantined: usize,
    pub errored: usize,
    /// Catalog links cleared because the file vanished.
    pub reconciled: usize,
    pub items: Vec<ScanItem>,
}

impl ScanSummary {
    pub fn record(&mut self, item: ScanItem) {
        match item.outcome {
            ItemOutcome::Added => self.added += 1,
            ItemOutcome::Proposed => self.proposed += 1,
            ItemOutcome::Skipped => self.skipped += 1,
            ItemOutcome::Quarantined => self.quarantined += 1,
            ItemOutcome::Errored => self.errored += 1,
        }
        self.items.push(item);
    }
}

/// A scan job record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanJob {
    pub id: Uuid,
    pub scope: ScanScope,
    pub state: JobState,
    /// 0-100.
    pub progress: u8,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ScanSummary>,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}
