//! Catalog store.
//!
//! CRUD over shows, episodes and movies, the pending-action table, the
//! quarantine index, and the append-only activity log. Operations that must
//! be atomic (proposing an action, replacing an episode set, committing an
//! apply) are single trait methods so implementations can hold one lock.

mod json;

pub use json::JsonCatalogStore;

use crate::models::action::{ActionStatus, PendingAction};
use crate::models::activity::ActivityEntry;
use crate::models::catalog::{
    CatalogEpisode, CatalogMovie, CatalogShow, CatalogSnapshot, FileStatus, ProviderKind,
};
use crate::models::media::QualityTokens;
use crate::models::quarantine::QuarantinedFile;
use crate::Result;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// New file link for the entities of an action target.
#[derive(Debug, Clone)]
pub struct FileLink {
    pub path: PathBuf,
    pub size: u64,
    pub quality: QualityTokens,
    pub status: FileStatus,
}

/// Persistence for the catalog and pipeline state.
pub trait CatalogStore: Send + Sync {
    /// Consistent copy of shows, episodes and movies.
    fn snapshot(&self) -> Result<CatalogSnapshot>;

    // Shows and episodes
    fn list_shows(&self) -> Result<Vec<CatalogShow>>;
    fn get_show(&self, id: Uuid) -> Result<CatalogShow>;
    fn upsert_show(&self, show: CatalogShow) -> Result<()>;
    fn episodes_of(&self, show_id: Uuid) -> Result<Vec<CatalogEpisode>>;
    fn get_episode(&self, id: Uuid) -> Result<CatalogEpisode>;
    /// Insert episodes; an existing (show, season, episode) is kept.
    fn insert_episodes(&self, episodes: Vec<CatalogEpisode>) -> Result<usize>;
    fn update_episode(&self, episode: CatalogEpisode) -> Result<()>;
    /// Swap a show's whole episode set and flip its metadata source, atomically.
    fn replace_show_episodes(
        &self,
        show_id: Uuid,
        episodes: Vec<CatalogEpisode>,
        source: ProviderKind,
        source_id: u64,
    ) -> Result<()>;

    // Movies
    fn list_movies(&self) -> Result<Vec<CatalogMovie>>;
    fn get_movie(&self, id: Uuid) -> Result<CatalogMovie>;
    fn upsert_movie(&self, movie: CatalogMovie) -> Result<()>;

    // Pending actions
    /// Insert `action` unless an unresolved one exists for the same source,
    /// in which case that one is returned. Rejects with `TargetBusy` when
    /// another source has an unresolved action on an overlapping target.
    fn propose_action(&self, action: PendingAction) -> Result<PendingAction>;
    fn get_action(&self, id: Uuid) -> Result<PendingAction>;
    fn list_actions(&self, status: Option<ActionStatus>) -> Result<Vec<PendingAction>>;
    fn update_action(&self, action: PendingAction) -> Result<()>;
    /// Mark `action` applied, link its target and log the activity as one unit.
    fn commit_apply(&self, action: PendingAction, link: &FileLink, entry: ActivityEntry) -> Result<()>;

    // Quarantine index
    fn add_quarantined(&self, file: QuarantinedFile) -> Result<()>;
    fn list_quarantined(&self) -> Result<Vec<QuarantinedFile>>;
    fn remove_quarantined(&self, path: &Path) -> Result<QuarantinedFile>;

    // Activity log
    fn append_activity(&self, entry: ActivityEntry) -> Result<()>;
    fn list_activity(&self, limit: usize) -> Result<Vec<ActivityEntry>>;
}
