//! Pending action manager.
//!
//! Durable queue of proposed filesystem mutations. `propose` is idempotent per
//! source path; `approve` runs the renamer and records `applied` or `failed`;
//! `approve_all` applies every pending action independently.

use crate::core::locks::KeyedLocks;
use crate::core::renamer::Renamer;
use crate::models::action::{
    ActionKind, ActionOutcome, ActionStatus, ActionTarget, BatchReport, PendingAction,
};
use crate::models::activity::{ActivityEntry, ActivityKind};
use crate::store::CatalogStore;
use crate::Result;
use futures::stream::{self, StreamExt};
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

/// How many actions `approve_all` applies at once.
pub const APPROVE_ALL_CONCURRENCY: usize = 4;

pub struct ActionManager {
    store: Arc<dyn CatalogStore>,
    renamer: Renamer,
    /// Serializes applies per catalog entity.
    locks: KeyedLocks<Uuid>,
}

impl ActionManager {
    pub fn new(store: Arc<dyn CatalogStore>, renamer: Renamer) -> Self {
        Self {
            store,
            renamer,
            locks: KeyedLocks::new(),
        }
    }

    /// Propose a mutation; an unresolved action for the same source is returned as-is.
    pub fn propose(&self, kind: ActionKind, source: PathBuf, target: ActionTarget) -> Result<PendingAction> {
        let destination = match self.renamer.destination(&target, &source) {
            Ok(dest) => Some(dest),
            Err(e) => {
                tracing::debug!("Destination for {:?} unresolved: {}", source, e);
                None
            }
        };

        let candidate = PendingAction::new(kind, source, destination, target);
        let candidate_id = candidate.id;
        let action = self.store.propose_action(candidate)?;

        if action.id == candidate_id {
            tracing::info!("Proposed {} of {:?}", action.kind, action.source);
        } else {
            tracing::debug!("Reusing pending action {} for {:?}", action.id, action.source);
        }
        Ok(action)
    }

    /// Where an apply would put the file of `target`.
    pub fn destination(&self, target: &ActionTarget, source: &std::path::Path) -> Result<PathBuf> {
        self.renamer.destination(target, source)
    }

    pub fn get(&self, id: Uuid) -> Result<PendingAction> {
        self.store.get_action(id)
    }

    pub fn list(&self, status: Option<ActionStatus>) -> Result<Vec<PendingAction>> {
        self.store.list_actions(status)
    }

    /// Apply an action; the returned outcome is `applied` or `failed`.
    ///
    /// Errors only when the action is unknown or not awaiting approval.
    pub async fn approve(&self, id: Uuid) -> Result<ActionOutcome> {
        let target = self.store.get_action(id)?.target;
        let _guards = self.locks.lock_all(&target.entity_ids()).await;

        // Re-read under the lock; a concurrent approve may have finished it
        let mut action = self.store.get_action(id)?;
        if action.status.is_terminal() {
            return Err(crate::Error::InvalidTransition {
                id,
                from: action.status.to_string(),
                to: ActionStatus::Approved.to_string(),
            });
        }

        action.status = ActionStatus::Approved;
        self.store.update_action(action.clone())?;

        match self.renamer.apply(&action).await {
            Ok(destination) => Ok(ActionOutcome {
                id,
                source: action.source,
                status: ActionStatus::Applied,
                destination: Some(destination),
                reason: None,
            }),
            Err(e) => {
                let reason = e.to_string();
                tracing::error!("Failed to apply {} of {:?}: {}", action.kind, action.source, reason);

                action.status = ActionStatus::Failed;
                action.failure_reason = Some(reason.clone());
                self.store.update_action(action.clone())?;

                let kind = match action.kind {
                    ActionKind::Import => ActivityKind::ImportFailed,
                    ActionKind::Rename | ActionKind::Replace => ActivityKind::RenameFailed,
                };
                self.store
                    .append_activity(ActivityEntry::new(kind, action.source.clone(), Some(reason.clone())))?;

                Ok(ActionOutcome {
                    id,
                    source: action.source,
                    status: ActionStatus::Failed,
                    destination: action.destination,
                    reason: Some(reason),
                })
            }
        }
    }

    /// Reject a pending action; no filesystem change.
    pub async fn reject(&self, id: Uuid) -> Result<PendingAction> {
        let target = self.store.get_action(id)?.target;
        let _guards = self.locks.lock_all(&target.entity_ids()).await;

        let mut action = self.store.get_action(id)?;
        if action.status != ActionStatus::Pending {
            return Err(crate::Error::InvalidTransition {
                id,
                from: action.status.to_string(),
                to: ActionStatus::Rejected.to_string(),
            });
        }

        action.status = ActionStatus::Rejected;
        self.store.update_action(action.clone())?;
        tracing::info!("Rejected {} of {:?}", action.kind, action.source);
        Ok(action)
    }

    /// Apply every pending action; one failure never blocks the others.
    pub async fn approve_all(&self) -> Result<BatchReport> {
        let pending = self.store.list_actions(Some(ActionStatus::Pending))?;
        let order: Vec<Uuid> = pending.iter().map(|a| a.id).collect();
        tracing::info!("Applying {} pending actions", pending.len());

        let mut outcomes: Vec<ActionOutcome> = stream::iter(pending)
            .map(|action| async move {
                match self.approve(action.id).await {
                    Ok(outcome) => outcome,
                    Err(e) => ActionOutcome {
                        id: action.id,
                        source: action.source,
                        status: ActionStatus::Failed,
                        destination: action.destination,
                        reason: Some(e.to_string()),
                    },
                }
            })
            .buffer_unordered(APPROVE_ALL_CONCURRENCY)
            .collect()
            .await;

        outcomes.sort_by_key(|o| order.iter().position(|id| *id == o.id));

        let mut report = BatchReport::default();
        for outcome in outcomes {
            report.push(outcome);
        }
        Ok(report)
    }
}
