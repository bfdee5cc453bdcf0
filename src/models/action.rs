//! Pending action data model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// Kind of filesystem mutation an action proposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    /// Bring a new file into the library.
    Import,
    /// Rename a file that is already linked.
    Rename,
    /// Swap a linked file for a better one.
    Replace,
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionKind::Import => write!(f, "import"),
            ActionKind::Rename => write!(f, "rename"),
            ActionKind::Replace => write!(f, "replace"),
        }
    }
}

/// Action lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionStatus {
    Pending,
    Approved,
    Rejected,
    Applied,
    Failed,
}

impl ActionStatus {
    /// Applied, failed and rejected actions never change again.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ActionStatus::Applied | ActionStatus::Failed | ActionStatus::Rejected
        )
    }
}

impl std::fmt::Display for ActionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ActionStatus::Pending => "pending",
            ActionStatus::Approved => "approved",
            ActionStatus::Rejected => "rejected",
            ActionStatus::Applied => "applied",
            ActionStatus::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

/// Catalog entity an action links its file to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ActionTarget {
    /// One or more episodes of a show (multi-episode files list several).
    Episode { show_id: Uuid, episode_ids: Vec<Uuid> },
    Movie { movie_id: Uuid },
}

impl ActionTarget {
    /// Lock/busy keys for every entity the target touches.
    pub fn entity_ids(&self) -> Vec<Uuid> {
        match self {
            ActionTarget::Episode { episode_ids, .. } => episode_ids.clone(),
            ActionTarget::Movie { movie_id } => vec![*movie_id],
        }
    }

    /// Whether the two targets share an entity.
    pub fn overlaps(&self, other: &ActionTarget) -> bool {
        let mine = self.entity_ids();
        other.entity_ids().iter().any(|id| mine.contains(id))
    }
}

impl std::fmt::Display for ActionTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionTarget::Episode { show_id, episode_ids } => {
                write!(f, "show {} ({} episode(s))", show_id, episode_ids.len())
            }
            ActionTarget::Movie { movie_id } => write!(f, "movie {}", movie_id),
        }
    }
}

/// A proposed, reviewable filesystem mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingAction {
    pub id: Uuid,
    pub kind: ActionKind,
    pub source: PathBuf,
    /// Resolved when the action is proposed; filled in at apply time otherwise.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<PathBuf>,
    pub target: ActionTarget,
    pub status: ActionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

impl PendingAction {
    pub fn new(
        kind: ActionKind,
        source: PathBuf,
        destination: Option<PathBuf>,
        target: ActionTarget,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            kind,
            source,
            destination,
            target,
            status: ActionStatus::Pending,
            created_at: now,
            updated_at: now,
            failure_reason: None,
        }
    }

    /// Pending or approved-but-not-yet-applied.
    pub fn is_unresolved(&self) -> bool {
        !self.status.is_terminal()
    }
}

/// Outcome of a single action inside a batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionOutcome {
    pub id: Uuid,
    pub source: PathBuf,
    pub status: ActionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Result of applying a batch of actions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchReport {
    pub success: usize,
    pub failed: usize,
    pub items: Vec<ActionOutcome>,
}

impl BatchReport {
    /// Record one item.
    pub fn push(&mut self, outcome: ActionOutcome) {
        if outcome.status == ActionStatus::Applied {
            self.success += 1;
        } else {
            self.failed += 1;
        }
        self.items.push(outcome);
    }

    /// Check if every item succeeded.
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(!ActionStatus::Pending.is_terminal());
        assert!(!ActionStatus::Approved.is_terminal());
        assert!(ActionStatus::Applied.is_terminal());
        assert!(ActionStatus::Failed.is_terminal());
        assert!(ActionStatus::Rejected.is_terminal());
    }

    #[test]
    fn test_target_overlap() {
        let show_id = Uuid::new_v4();
        let e1 = Uuid::new_v4();
        let e2 = Uuid::new_v4();
        let a = ActionTarget::Episode { show_id, episode_ids: vec![e1, e2] };
        let b = ActionTarget::Episode { show_id, episode_ids: vec![e2] };
        let c = ActionTarget::Movie { movie_id: Uuid::new_v4() };

        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));
    }

    #[test]
    fn test_batch_report_counts() {
        let mut report = BatchReport::default();
        for status in [ActionStatus::Applied, ActionStatus::Failed, ActionStatus::Applied] {
            report.push(ActionOutcome {
                id: Uuid::new_v4(),
                source: PathBuf::from("/x.mkv"),
                status,
                destination: None,
                reason: None,
            });
        }
        assert_eq!(report.success, 2);
        assert_eq!(report.failed, 1);
        assert!(!report.is_success());
    }
}
