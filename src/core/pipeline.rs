//! Per-file ingestion pipeline.
//!
//! classify -> match -> quality arbitration -> disposition -> propose/apply.
//! Unparsed or unmatched downloads exit to the quarantine; unparsed or
//! unmatched files already inside the library are reported as extras and
//! left where they are.

use crate::core::actions::ActionManager;
use crate::core::classifier::{self, Confidence, MovieHint, ParseResult, TvHint};
use crate::core::locks::KeyedLocks;
use crate::core::matcher::{self, NoMatch};
use crate::core::quality::{self, FileQuality, QualityPolicy};
use crate::core::quarantine::Quarantine;
use crate::models::action::{ActionKind, ActionStatus, ActionTarget};
use crate::models::activity::{ActivityEntry, ActivityKind};
use crate::models::catalog::CatalogSnapshot;
use crate::models::job::{ItemOutcome, ScanItem};
use crate::models::media::QualityTokens;
use crate::models::quarantine::QuarantineReason;
use crate::store::CatalogStore;
use crate::Result;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

/// Minimum match confidence for an unreviewed apply.
pub const AUTO_APPLY_MIN_CONFIDENCE: f64 = 0.9;

/// Confidence factor applied to matches from the low-confidence TV pattern.
const LOW_CONFIDENCE_FACTOR: f64 = 0.6;

/// Where a file was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// A download folder; failures go to quarantine.
    Download,
    /// Inside the library; failures are reported as extras.
    Library,
}

/// What to do with a matched file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    AutoApply,
    ProposeForReview,
}

/// Per-entity switches the disposition depends on.
#[derive(Debug, Clone, Copy)]
pub struct DispositionFlags {
    pub rename_enabled: bool,
}

/// Single policy point for auto vs. manual apply.
pub fn decide_disposition(confidence: f64, flags: DispositionFlags) -> Disposition {
    if flags.rename_enabled && confidence >= AUTO_APPLY_MIN_CONFIDENCE {
        Disposition::AutoApply
    } else {
        Disposition::ProposeForReview
    }
}

/// A match ready for action planning.
struct Resolved {
    target: ActionTarget,
    owner_id: Uuid,
    confidence: f64,
    flags: DispositionFlags,
    /// Currently linked file and its stored quality.
    existing: Option<(PathBuf, Option<QualityTokens>, Option<u64>)>,
}

fn item(path: &Path, outcome: ItemOutcome, reason: impl Into<String>) -> ScanItem {
    ScanItem {
        path: path.to_path_buf(),
        outcome,
        reason: reason.into(),
    }
}

fn stem_of(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default()
}

pub struct Pipeline {
    store: Arc<dyn CatalogStore>,
    actions: Arc<ActionManager>,
    quarantine: Arc<Quarantine>,
    policy: QualityPolicy,
    /// Serializes concurrent passes over the same path.
    path_locks: KeyedLocks<PathBuf>,
}

impl Pipeline {
    pub fn new(
        store: Arc<dyn CatalogStore>,
        actions: Arc<ActionManager>,
        quarantine: Arc<Quarantine>,
        policy: QualityPolicy,
    ) -> Self {
        Self {
            store,
            actions,
            quarantine,
            policy,
            path_locks: KeyedLocks::new(),
        }
    }

    pub fn actions(&self) -> &Arc<ActionManager> {
        &self.actions
    }

    pub fn store(&self) -> &Arc<dyn CatalogStore> {
        &self.store
    }

    /// Run one file through the pipeline.
    ///
    /// `scope` restricts which shows/movies the file may be attributed to;
    /// a file owned by anything else is skipped with no side effects.
    pub async fn process(&self, path: &Path, origin: Origin, scope: Option<&HashSet<Uuid>>) -> ScanItem {
        let _guard = self.path_locks.lock(&path.to_path_buf()).await;

        match self.process_inner(path, origin, scope).await {
            Ok(item) => item,
            Err(e) => {
                tracing::warn!("Pipeline error for {:?}: {}", path, e);
                item(path, ItemOutcome::Errored, e.to_string())
            }
        }
    }

    async fn process_inner(
        &self,
        path: &Path,
        origin: Origin,
        scope: Option<&HashSet<Uuid>>,
    ) -> Result<ScanItem> {
        if !path.is_file() {
            return Ok(item(path, ItemOutcome::Errored, "file vanished"));
        }
        let size = std::fs::metadata(path)?.len();
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        let parsed = classifier::classify(&filename);
        tracing::debug!("Classified {:?} as {:?}", filename, parsed);

        let snapshot = self.store.snapshot()?;
        let (resolved, tokens) = match parsed {
            ParseResult::Unparsed { reason } => {
                return self
                    .unresolved(path, origin, QuarantineReason::Unparsed, reason.to_string(), scope)
                    .await;
            }
            ParseResult::Tv(hint) => match self.resolve_tv(&hint, &snapshot, path) {
                Ok(resolved) => (resolved, hint.quality),
                Err(no_match) => {
                    let detail = if hint.confidence == Confidence::Low {
                        crate::Error::ClassificationAmbiguous(format!("{} ({})", filename, no_match))
                            .to_string()
                    } else {
                        crate::Error::NoCatalogMatch(no_match.to_string()).to_string()
                    };
                    let reason = if hint.confidence == Confidence::Low {
                        QuarantineReason::Unparsed
                    } else {
                        QuarantineReason::NoCatalogMatch
                    };
                    return self.unresolved(path, origin, reason, detail, scope).await;
                }
            },
            ParseResult::Movie(hint) => match self.resolve_movie(&hint, &snapshot) {
                Ok(resolved) => (resolved, hint.quality),
                Err(no_match) => {
                    let detail = crate::Error::NoCatalogMatch(no_match.to_string()).to_string();
                    return self
                        .unresolved(path, origin, QuarantineReason::NoCatalogMatch, detail, scope)
                        .await;
                }
            },
        };

        if let Some(ids) = scope {
            if !ids.contains(&resolved.owner_id) {
                return Ok(item(path, ItemOutcome::Skipped, "outside scan scope"));
            }
        }

        self.plan_and_dispatch(path, size, tokens, resolved).await
    }

    fn resolve_tv(
        &self,
        hint: &TvHint,
        snapshot: &CatalogSnapshot,
        path: &Path,
    ) -> std::result::Result<Resolved, NoMatch> {
        let matched = matcher::match_tv(hint, snapshot, Some(path))?;
        let mut confidence = matched.confidence;
        if hint.confidence == Confidence::Low {
            confidence *= LOW_CONFIDENCE_FACTOR;
        }

        let existing = matched
            .episodes
            .iter()
            .find_map(|e| e.file.clone().map(|f| (f, e.quality.clone(), e.file_size)));

        Ok(Resolved {
            target: ActionTarget::Episode {
                show_id: matched.show.id,
                episode_ids: matched.episodes.iter().map(|e| e.id).collect(),
            },
            owner_id: matched.show.id,
            confidence,
            flags: DispositionFlags {
                rename_enabled: matched.show.rename_enabled,
            },
            existing,
        })
    }

    fn resolve_movie(&self, hint: &MovieHint, snapshot: &CatalogSnapshot) -> std::result::Result<Resolved, NoMatch> {
        let matched = matcher::match_movie(hint, snapshot)?;
        let movie = matched.movie;
        Ok(Resolved {
            target: ActionTarget::Movie { movie_id: movie.id },
            owner_id: movie.id,
            confidence: matched.confidence,
            flags: DispositionFlags {
                rename_enabled: movie.rename_enabled,
            },
            existing: movie.file.map(|f| (f, movie.quality, movie.file_size)),
        })
    }

    /// Route a file that has no owner.
    async fn unresolved(
        &self,
        path: &Path,
        origin: Origin,
        reason: QuarantineReason,
        detail: String,
        scope: Option<&HashSet<Uuid>>,
    ) -> Result<ScanItem> {
        // Scoped scans never touch files they cannot attribute
        if scope.is_some() {
            return Ok(item(path, ItemOutcome::Skipped, format!("outside scan scope: {}", detail)));
        }

        match origin {
            Origin::Download => {
                let file = self.quarantine.quarantine(path, reason, Some(detail.clone())).await?;
                Ok(item(
                    path,
                    ItemOutcome::Quarantined,
                    format!("{}: {} -> {}", reason, detail, file.path.display()),
                ))
            }
            Origin::Library => Ok(item(path, ItemOutcome::Skipped, format!("extra: {}", detail))),
        }
    }

    /// Choose the action kind, propose it, and apply it when policy allows.
    async fn plan_and_dispatch(
        &self,
        path: &Path,
        size: u64,
        tokens: QualityTokens,
        resolved: Resolved,
    ) -> Result<ScanItem> {
        let kind = match resolved.existing {
            Some((ref current, _, _)) if current == path => {
                let destination = self.actions.destination(&resolved.target, path)?;
                if destination == path {
                    return Ok(item(path, ItemOutcome::Skipped, "already in place"));
                }
                ActionKind::Rename
            }
            Some((ref current, ref stored, stored_size)) if current.is_file() => {
                let existing = FileQuality::new(
                    stored.clone().unwrap_or_else(|| quality::parse_tokens(&stem_of(current))),
                    stored_size,
                );
                let incoming = FileQuality::new(tokens, Some(size));
                if !self.policy.should_replace(&existing, &incoming) {
                    return Ok(item(
                        path,
                        ItemOutcome::Skipped,
                        format!("not an upgrade over {}", current.display()),
                    ));
                }
                ActionKind::Replace
            }
            // No link, or a stale one
            _ => ActionKind::Import,
        };

        let action = match self.actions.propose(kind, path.to_path_buf(), resolved.target.clone()) {
            Ok(action) => action,
            Err(e @ crate::Error::TargetBusy(_)) => {
                return Ok(item(path, ItemOutcome::Skipped, e.to_string()));
            }
            Err(e) => return Err(e),
        };

        if action.status != ActionStatus::Pending {
            return Ok(item(path, ItemOutcome::Proposed, format!("action {} is {}", action.id, action.status)));
        }

        match decide_disposition(resolved.confidence, resolved.flags) {
            Disposition::ProposeForReview => Ok(item(
                path,
                ItemOutcome::Proposed,
                format!("{} awaiting review (action {})", kind, action.id),
            )),
            Disposition::AutoApply => {
                let outcome = self.actions.approve(action.id).await?;
                match outcome.status {
                    ActionStatus::Applied => Ok(item(
                        path,
                        ItemOutcome::Added,
                        outcome
                            .destination
                            .map(|d| format!("{} -> {}", kind, d.display()))
                            .unwrap_or_else(|| kind.to_string()),
                    )),
                    _ => Ok(item(
                        path,
                        ItemOutcome::Errored,
                        outcome.reason.unwrap_or_else(|| "apply failed".to_string()),
                    )),
                }
            }
        }
    }

    /// Clear catalog links whose file no longer exists; returns how many.
    ///
    /// Restricted to `scope` when given.
    pub fn reconcile(&self, scope: Option<&HashSet<Uuid>>) -> Result<usize> {
        let snapshot = self.store.snapshot()?;
        let in_scope = |id: &Uuid| scope.map(|ids| ids.contains(id)).unwrap_or(true);
        let mut cleared = 0;

        for mut episode in snapshot.episodes.into_iter().filter(|e| in_scope(&e.show_id)) {
            let Some(file) = episode.file.clone() else {
                continue;
            };
            if file.exists() {
                continue;
            }
            episode.unlink();
            self.store.update_episode(episode)?;
            self.store.append_activity(ActivityEntry::new(
                ActivityKind::Reconcile,
                file,
                Some("linked file missing".to_string()),
            ))?;
            cleared += 1;
        }

        for mut movie in snapshot.movies.into_iter().filter(|m| in_scope(&m.id)) {
            let Some(file) = movie.file.clone() else {
                continue;
            };
            if file.exists() {
                continue;
            }
            movie.file = None;
            movie.file_size = None;
            movie.quality = None;
            self.store.upsert_movie(movie)?;
            self.store.append_activity(ActivityEntry::new(
                ActivityKind::Reconcile,
                file,
                Some("linked file missing".to_string()),
            ))?;
            cleared += 1;
        }

        if cleared > 0 {
            tracing::info!("Reconciliation cleared {} stale links", cleared);
        }
        Ok(cleared)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decide_disposition() {
        let on = DispositionFlags { rename_enabled: true };
        let off = DispositionFlags { rename_enabled: false };

        assert_eq!(decide_disposition(1.0, on), Disposition::AutoApply);
        assert_eq!(decide_disposition(0.7, on), Disposition::ProposeForReview);
        assert_eq!(decide_disposition(1.0, off), Disposition::ProposeForReview);
    }
}
