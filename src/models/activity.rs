//! Library activity log entries (audit only).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    Import,
    Rename,
    Replace,
    ImportFailed,
    RenameFailed,
    Quarantine,
    Reconcile,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub at: DateTime<Utc>,
    pub kind: ActivityKind,
    pub path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ActivityEntry {
    pub fn new(kind: ActivityKind, path: PathBuf, detail: Option<String>) -> Self {
        Self {
            at: Utc::now(),
            kind,
            path,
            detail,
        }
    }
}
