//! JSON-file catalog store.

use super::{CatalogStore, FileLink};
use crate::models::action::{ActionStatus, ActionTarget, PendingAction};
use crate::models::activity::ActivityEntry;
use crate::models::catalog::{
    CatalogEpisode, CatalogMovie, CatalogShow, CatalogSnapshot, ProviderKind,
};
use crate::models::quarantine::QuarantinedFile;
use crate::Result;
use chrono::Utc;
use fs2::FileExt;
use parking_lot::{RwLock, RwLockReadGuard};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use uuid::Uuid;

/// Everything the store persists.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct CatalogData {
    shows: Vec<CatalogShow>,
    episodes: Vec<CatalogEpisode>,
    movies: Vec<CatalogMovie>,
    actions: Vec<PendingAction>,
    quarantine: Vec<QuarantinedFile>,
    activity: Vec<ActivityEntry>,
}

impl CatalogData {
    fn link(&mut self, target: &ActionTarget, link: &FileLink) -> Result<()> {
        match target {
            ActionTarget::Episode { episode_ids, .. } => {
                if let Some(missing) = episode_ids
                    .iter()
                    .find(|id| !self.episodes.iter().any(|e| e.id == **id))
                {
                    return Err(crate::Error::NotFound(format!("episode {}", missing)));
                }
                for episode in self.episodes.iter_mut().filter(|e| episode_ids.contains(&e.id)) {
                    episode.file = Some(link.path.clone());
                    episode.file_size = Some(link.size);
                    episode.quality = Some(link.quality.clone());
                    episode.status = link.status;
                }
            }
            ActionTarget::Movie { movie_id } => {
                let movie = self
                    .movies
                    .iter_mut()
                    .find(|m| m.id == *movie_id)
                    .ok_or_else(|| crate::Error::NotFound(format!("movie {}", movie_id)))?;
                movie.file = Some(link.path.clone());
                movie.file_size = Some(link.size);
                movie.quality = Some(link.quality.clone());
            }
        }
        Ok(())
    }
}

/// Identity of the catalog file as last seen on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileStamp {
    modified: SystemTime,
    len: u64,
}

impl FileStamp {
    fn of(path: &Path) -> Option<Self> {
        let meta = fs::metadata(path).ok()?;
        Some(Self {
            modified: meta.modified().ok()?,
            len: meta.len(),
        })
    }
}

#[derive(Debug, Default)]
struct Loaded {
    data: CatalogData,
    stamp: Option<FileStamp>,
}

/// Catalog held in memory and written to a JSON file after every change.
///
/// Several processes may share one file: every mutation takes an exclusive
/// lock on `<file>.lock`, reloads the file, applies the change to a copy and
/// swaps the copy in only once it is on disk. Reads pick up another
/// process's writes when the file changed since it was last loaded.
pub struct JsonCatalogStore {
    path: Option<PathBuf>,
    state: RwLock<Loaded>,
}

fn read_data(path: &Path) -> Result<CatalogData> {
    if !path.exists() {
        return Ok(CatalogData::default());
    }
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// Path of the advisory lock guarding `path`.
fn lock_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".lock");
    path.with_file_name(name)
}

/// Exclusive advisory lock on a file; released on drop.
struct FileLock {
    file: File,
}

impl FileLock {
    fn acquire(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(path)?;
        FileExt::lock_exclusive(&file)?;
        Ok(Self { file })
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            tracing::warn!("Failed to release catalog lock: {}", e);
        }
    }
}

impl JsonCatalogStore {
    /// Open (or create) the catalog at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        let data = read_data(path)?;

        tracing::debug!("Opened catalog at {:?}", path);
        Ok(Self {
            path: Some(path.to_path_buf()),
            state: RwLock::new(Loaded {
                data,
                stamp: FileStamp::of(path),
            }),
        })
    }

    /// A store that never touches disk.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            state: RwLock::new(Loaded::default()),
        }
    }

    /// Current tables, reloaded first if another writer changed the file.
    fn read(&self) -> Result<RwLockReadGuard<'_, Loaded>> {
        if let Some(ref path) = self.path {
            let current = FileStamp::of(path);
            let stale = current != self.state.read().stamp;
            if stale {
                let mut state = self.state.write();
                // Another thread may have reloaded while we waited
                let current = FileStamp::of(path);
                if current != state.stamp {
                    tracing::debug!("Catalog {:?} changed on disk, reloading", path);
                    state.data = read_data(path)?;
                    state.stamp = current;
                }
            }
        }
        Ok(self.state.read())
    }

    /// Run a mutation on a fresh copy of the tables, persist it, then swap it in.
    ///
    /// An `Err` from the mutation or from the write leaves memory and disk as
    /// they were.
    fn write<T>(&self, f: impl FnOnce(&mut CatalogData) -> Result<T>) -> Result<T> {
        let mut state = self.state.write();

        let Some(ref path) = self.path else {
            let mut data = state.data.clone();
            let value = f(&mut data)?;
            state.data = data;
            return Ok(value);
        };

        let _lock = FileLock::acquire(&lock_path(path))?;
        let mut data = read_data(path)?;
        let value = f(&mut data)?;
        persist(path, &data)?;

        state.stamp = FileStamp::of(path);
        state.data = data;
        Ok(value)
    }
}

fn persist(path: &Path, data: &CatalogData) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let content = serde_json::to_string_pretty(data)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, content)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

impl CatalogStore for JsonCatalogStore {
    fn snapshot(&self) -> Result<CatalogSnapshot> {
        let state = self.read()?;
        let data = &state.data;
        Ok(CatalogSnapshot {
            shows: data.shows.clone(),
            episodes: data.episodes.clone(),
            movies: data.movies.clone(),
        })
    }

    fn list_shows(&self) -> Result<Vec<CatalogShow>> {
        Ok(self.read()?.data.shows.clone())
    }

    fn get_show(&self, id: Uuid) -> Result<CatalogShow> {
        self.read()?
            .data
            .shows
            .iter()
            .find(|s| s.id == id)
            .cloned()
            .ok_or_else(|| crate::Error::NotFound(format!("show {}", id)))
    }

    fn upsert_show(&self, show: CatalogShow) -> Result<()> {
        self.write(|data| {
            match data.shows.iter_mut().find(|s| s.id == show.id) {
                Some(existing) => *existing = show,
                None => data.shows.push(show),
            }
            Ok(())
        })
    }

    fn episodes_of(&self, show_id: Uuid) -> Result<Vec<CatalogEpisode>> {
        let mut episodes: Vec<CatalogEpisode> = self
            .read()?
            .data
            .episodes
            .iter()
            .filter(|e| e.show_id == show_id)
            .cloned()
            .collect();
        episodes.sort_by_key(|e| (e.season, e.episode));
        Ok(episodes)
    }

    fn get_episode(&self, id: Uuid) -> Result<CatalogEpisode> {
        self.read()?
            .data
            .episodes
            .iter()
            .find(|e| e.id == id)
            .cloned()
            .ok_or_else(|| crate::Error::NotFound(format!("episode {}", id)))
    }

    fn insert_episodes(&self, episodes: Vec<CatalogEpisode>) -> Result<usize> {
        self.write(|data| {
            let mut inserted = 0;
            for episode in episodes {
                let exists = data.episodes.iter().any(|e| {
                    e.show_id == episode.show_id
                        && e.season == episode.season
                        && e.episode == episode.episode
                });
                if !exists {
                    data.episodes.push(episode);
                    inserted += 1;
                }
            }
            Ok(inserted)
        })
    }

    fn update_episode(&self, episode: CatalogEpisode) -> Result<()> {
        self.write(|data| {
            let existing = data
                .episodes
                .iter_mut()
                .find(|e| e.id == episode.id)
                .ok_or_else(|| crate::Error::NotFound(format!("episode {}", episode.id)))?;
            *existing = episode;
            Ok(())
        })
    }

    fn replace_show_episodes(
        &self,
        show_id: Uuid,
        episodes: Vec<CatalogEpisode>,
        source: ProviderKind,
        source_id: u64,
    ) -> Result<()> {
        self.write(|data| {
            let show = data
                .shows
                .iter_mut()
                .find(|s| s.id == show_id)
                .ok_or_else(|| crate::Error::NotFound(format!("show {}", show_id)))?;
            show.metadata_source = source;
            show.provider_ids.set(source, source_id);

            // Open actions point at episode ids that are about to disappear
            let now = Utc::now();
            for action in data.actions.iter_mut().filter(|a| {
                a.is_unresolved()
                    && matches!(a.target, ActionTarget::Episode { show_id: id, .. } if id == show_id)
            }) {
                action.status = ActionStatus::Failed;
                action.failure_reason = Some(format!("episode list replaced from {}", source));
                action.updated_at = now;
            }

            data.episodes.retain(|e| e.show_id != show_id);
            data.episodes.extend(episodes.into_iter().map(|mut e| {
                e.show_id = show_id;
                e
            }));
            Ok(())
        })
    }

    fn list_movies(&self) -> Result<Vec<CatalogMovie>> {
        Ok(self.read()?.data.movies.clone())
    }

    fn get_movie(&self, id: Uuid) -> Result<CatalogMovie> {
        self.read()?
            .data
            .movies
            .iter()
            .find(|m| m.id == id)
            .cloned()
            .ok_or_else(|| crate::Error::NotFound(format!("movie {}", id)))
    }

    fn upsert_movie(&self, movie: CatalogMovie) -> Result<()> {
        self.write(|data| {
            match data.movies.iter_mut().find(|m| m.id == movie.id) {
                Some(existing) => *existing = movie,
                None => data.movies.push(movie),
            }
            Ok(())
        })
    }

    fn propose_action(&self, action: PendingAction) -> Result<PendingAction> {
        self.write(|data| {
            if let Some(existing) = data
                .actions
                .iter()
                .find(|a| a.source == action.source && a.is_unresolved())
            {
                return Ok(existing.clone());
            }

            if let Some(busy) = data
                .actions
                .iter()
                .find(|a| a.is_unresolved() && a.target.overlaps(&action.target))
            {
                return Err(crate::Error::TargetBusy(format!(
                    "{} (action {} for {:?})",
                    action.target, busy.id, busy.source
                )));
            }

            // A finished row for the same path is superseded
            data.actions.retain(|a| a.source != action.source);
            data.actions.push(action.clone());
            Ok(action)
        })
    }

    fn get_action(&self, id: Uuid) -> Result<PendingAction> {
        self.read()?
            .data
            .actions
            .iter()
            .find(|a| a.id == id)
            .cloned()
            .ok_or_else(|| crate::Error::NotFound(format!("action {}", id)))
    }

    fn list_actions(&self, status: Option<ActionStatus>) -> Result<Vec<PendingAction>> {
        let mut actions: Vec<PendingAction> = self
            .read()?
            .data
            .actions
            .iter()
            .filter(|a| status.map(|s| a.status == s).unwrap_or(true))
            .cloned()
            .collect();
        actions.sort_by_key(|a| a.created_at);
        Ok(actions)
    }

    fn update_action(&self, mut action: PendingAction) -> Result<()> {
        self.write(|data| {
            let existing = data
                .actions
                .iter_mut()
                .find(|a| a.id == action.id)
                .ok_or_else(|| crate::Error::NotFound(format!("action {}", action.id)))?;
            action.updated_at = Utc::now();
            *existing = action;
            Ok(())
        })
    }

    fn commit_apply(&self, mut action: PendingAction, link: &FileLink, entry: ActivityEntry) -> Result<()> {
        self.write(|data| {
            let idx = data
                .actions
                .iter()
                .position(|a| a.id == action.id)
                .ok_or_else(|| crate::Error::NotFound(format!("action {}", action.id)))?;

            data.link(&action.target, link)?;

            action.status = ActionStatus::Applied;
            action.destination = Some(link.path.clone());
            action.failure_reason = None;
            action.updated_at = Utc::now();
            data.actions[idx] = action;
            data.activity.push(entry);
            Ok(())
        })
    }

    fn add_quarantined(&self, file: QuarantinedFile) -> Result<()> {
        self.write(|data| {
            data.quarantine.retain(|q| q.path != file.path);
            data.quarantine.push(file);
            Ok(())
        })
    }

    fn list_quarantined(&self) -> Result<Vec<QuarantinedFile>> {
        let mut files = self.read()?.data.quarantine.clone();
        files.sort_by(|a, b| b.arrived_at.cmp(&a.arrived_at));
        Ok(files)
    }

    fn remove_quarantined(&self, path: &Path) -> Result<QuarantinedFile> {
        self.write(|data| {
            let idx = data
                .quarantine
                .iter()
                .position(|q| q.path == path)
                .ok_or_else(|| crate::Error::NotFound(format!("quarantined file {:?}", path)))?;
            Ok(data.quarantine.remove(idx))
        })
    }

    fn append_activity(&self, entry: ActivityEntry) -> Result<()> {
        self.write(|data| {
            data.activity.push(entry);
            Ok(())
        })
    }

    fn list_activity(&self, limit: usize) -> Result<Vec<ActivityEntry>> {
        let state = self.read()?;
        let data = &state.data;
        Ok(data.activity.iter().rev().take(limit).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::action::ActionKind;
    use crate::models::activity::ActivityKind;
    use crate::models::catalog::FileStatus;

    fn episode_action(source: &str, show_id: Uuid, episode_id: Uuid) -> PendingAction {
        PendingAction::new(
            ActionKind::Import,
            PathBuf::from(source),
            None,
            ActionTarget::Episode {
                show_id,
                episode_ids: vec![episode_id],
            },
        )
    }

    #[test]
    fn test_propose_is_idempotent_per_source() {
        let store = JsonCatalogStore::in_memory();
        let (show, episode) = (Uuid::new_v4(), Uuid::new_v4());

        let first = store.propose_action(episode_action("/dl/a.mkv", show, episode)).unwrap();
        let second = store.propose_action(episode_action("/dl/a.mkv", show, episode)).unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(store.list_actions(None).unwrap().len(), 1);
    }

    #[test]
    fn test_propose_rejects_busy_target() {
        let store = JsonCatalogStore::in_memory();
        let (show, episode) = (Uuid::new_v4(), Uuid::new_v4());

        store.propose_action(episode_action("/dl/a.mkv", show, episode)).unwrap();
        let result = store.propose_action(episode_action("/dl/b.mkv", show, episode));

        assert!(matches!(result, Err(crate::Error::TargetBusy(_))));
        assert_eq!(store.list_actions(None).unwrap().len(), 1);
    }

    #[test]
    fn test_terminal_row_is_superseded() {
        let store = JsonCatalogStore::in_memory();
        let (show, episode) = (Uuid::new_v4(), Uuid::new_v4());

        let mut first = store.propose_action(episode_action("/dl/a.mkv", show, episode)).unwrap();
        first.status = ActionStatus::Failed;
        store.update_action(first.clone()).unwrap();

        let second = store.propose_action(episode_action("/dl/a.mkv", show, episode)).unwrap();
        assert_ne!(first.id, second.id);
        assert_eq!(store.list_actions(None).unwrap().len(), 1);
    }

    #[test]
    fn test_replace_show_episodes() {
        let store = JsonCatalogStore::in_memory();
        let show = CatalogShow::new("Borgen", Path::new("/tv/Borgen"), ProviderKind::Tmdb);
        store.upsert_show(show.clone()).unwrap();
        store
            .insert_episodes(vec![CatalogEpisode::new(show.id, 1, 1, "Old", None)])
            .unwrap();

        let replacement = vec![
            CatalogEpisode::new(show.id, 1, 1, "New 1", None),
            CatalogEpisode::new(show.id, 1, 2, "New 2", None),
        ];
        store
            .replace_show_episodes(show.id, replacement, ProviderKind::Tvmaze, 99)
            .unwrap();

        let episodes = store.episodes_of(show.id).unwrap();
        assert_eq!(episodes.len(), 2);
        assert_eq!(episodes[0].title, "New 1");
        let show = store.get_show(show.id).unwrap();
        assert_eq!(show.metadata_source, ProviderKind::Tvmaze);
        assert_eq!(show.provider_ids.tvmaze, Some(99));
    }

    #[test]
    fn test_insert_episodes_keeps_existing() {
        let store = JsonCatalogStore::in_memory();
        let show_id = Uuid::new_v4();
        assert_eq!(
            store.insert_episodes(vec![CatalogEpisode::new(show_id, 1, 1, "A", None)]).unwrap(),
            1
        );
        assert_eq!(
            store.insert_episodes(vec![CatalogEpisode::new(show_id, 1, 1, "B", None)]).unwrap(),
            0
        );
    }

    #[test]
    fn test_commit_apply_links_and_logs() {
        let store = JsonCatalogStore::in_memory();
        let show = CatalogShow::new("Borgen", Path::new("/tv/Borgen"), ProviderKind::Tmdb);
        let episode = CatalogEpisode::new(show.id, 1, 1, "Pilot", None);
        store.upsert_show(show.clone()).unwrap();
        store.insert_episodes(vec![episode.clone()]).unwrap();

        let action = store
            .propose_action(episode_action("/dl/a.mkv", show.id, episode.id))
            .unwrap();
        let link = FileLink {
            path: PathBuf::from("/tv/Borgen/Season 01/Borgen - S01E01 - Pilot.mkv"),
            size: 10,
            quality: Default::default(),
            status: FileStatus::Renamed,
        };
        store
            .commit_apply(
                action.clone(),
                &link,
                ActivityEntry::new(ActivityKind::Import, link.path.clone(), None),
            )
            .unwrap();

        assert_eq!(store.get_action(action.id).unwrap().status, ActionStatus::Applied);
        assert_eq!(store.get_episode(episode.id).unwrap().file, Some(link.path.clone()));
        assert_eq!(store.list_activity(10).unwrap().len(), 1);
    }

    #[test]
    fn test_persists_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data/catalog.json");

        let store = JsonCatalogStore::open(&path).unwrap();
        let movie = CatalogMovie::new("Heat", Some(1995));
        store.upsert_movie(movie.clone()).unwrap();
        drop(store);

        let reopened = JsonCatalogStore::open(&path).unwrap();
        assert_eq!(reopened.get_movie(movie.id).unwrap().title, "Heat");
    }

    #[test]
    fn test_two_stores_on_one_file_keep_both_writes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");

        let a = JsonCatalogStore::open(&path).unwrap();
        let b = JsonCatalogStore::open(&path).unwrap();
        a.upsert_movie(CatalogMovie::new("Alpha", None)).unwrap();
        b.upsert_movie(CatalogMovie::new("Beta", None)).unwrap();

        let mut titles: Vec<String> = JsonCatalogStore::open(&path)
            .unwrap()
            .list_movies()
            .unwrap()
            .into_iter()
            .map(|m| m.title)
            .collect();
        titles.sort();
        assert_eq!(titles, vec!["Alpha", "Beta"]);

        // A sees what B wrote without reopening
        assert_eq!(a.list_movies().unwrap().len(), 2);
    }

    #[test]
    fn test_failed_write_leaves_memory_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        let store = JsonCatalogStore::open(&path).unwrap();
        store.upsert_movie(CatalogMovie::new("Heat", Some(1995))).unwrap();

        // The temp file cannot be created where a directory sits
        fs::create_dir(path.with_extension("json.tmp")).unwrap();
        assert!(store.upsert_movie(CatalogMovie::new("Ronin", Some(1998))).is_err());

        let titles: Vec<String> = store.list_movies().unwrap().into_iter().map(|m| m.title).collect();
        assert_eq!(titles, vec!["Heat"]);
    }

    #[test]
    fn test_replace_show_episodes_fails_open_actions() {
        let store = JsonCatalogStore::in_memory();
        let show = CatalogShow::new("Borgen", Path::new("/tv/Borgen"), ProviderKind::Tmdb);
        let episode = CatalogEpisode::new(show.id, 1, 2, "Old", None);
        store.upsert_show(show.clone()).unwrap();
        store.insert_episodes(vec![episode.clone()]).unwrap();
        let action = store
            .propose_action(episode_action("/dl/b.mkv", show.id, episode.id))
            .unwrap();

        store
            .replace_show_episodes(
                show.id,
                vec![CatalogEpisode::new(show.id, 1, 2, "New", None)],
                ProviderKind::Tvmaze,
                7,
            )
            .unwrap();

        let stored = store.get_action(action.id).unwrap();
        assert_eq!(stored.status, ActionStatus::Failed);
        assert!(stored.failure_reason.unwrap().contains("tvmaze"));
    }

    #[test]
    fn test_remove_unknown_quarantined() {
        let store = JsonCatalogStore::in_memory();
        assert!(matches!(
            store.remove_quarantined(Path::new("/nope.mkv")),
            Err(crate::Error::NotFound(_))
        ));
    }
}
