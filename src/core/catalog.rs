//! Catalog maintenance: aliases, soft removal, episode status and the
//! missing-episode report.

use crate::models::catalog::{CatalogEpisode, CatalogMovie, CatalogShow, FileStatus};
use crate::store::CatalogStore;
use crate::Result;
use chrono::NaiveDate;
use std::sync::Arc;
use uuid::Uuid;

pub struct CatalogService {
    store: Arc<dyn CatalogStore>,
}

/// Whether `alias` already names the entity, ignoring case and spacing.
fn has_name<'a>(mut names: impl Iterator<Item = &'a str>, alias: &str) -> bool {
    let wanted = crate::core::matcher::normalize(alias);
    names.any(|n| crate::core::matcher::normalize(n) == wanted)
}

impl CatalogService {
    pub fn new(store: Arc<dyn CatalogStore>) -> Self {
        Self { store }
    }

    pub fn shows(&self) -> Result<Vec<CatalogShow>> {
        self.store.list_shows()
    }

    /// Add an alternate name used when matching filenames.
    pub fn add_show_alias(&self, show_id: Uuid, alias: &str) -> Result<CatalogShow> {
        let alias = alias.trim();
        if alias.is_empty() {
            return Err(crate::Error::other("alias must not be empty"));
        }
        let mut show = self.store.get_show(show_id)?;
        if !has_name(show.names(), alias) {
            show.aliases.push(alias.to_string());
            self.store.upsert_show(show.clone())?;
            tracing::info!("Added alias '{}' to {}", alias, show.name);
        }
        Ok(show)
    }

    pub fn remove_show_alias(&self, show_id: Uuid, alias: &str) -> Result<CatalogShow> {
        let mut show = self.store.get_show(show_id)?;
        let before = show.aliases.len();
        show.aliases.retain(|a| !a.eq_ignore_ascii_case(alias.trim()));
        if show.aliases.len() == before {
            return Err(crate::Error::NotFound(format!("alias '{}' on {}", alias, show.name)));
        }
        self.store.upsert_show(show.clone())?;
        Ok(show)
    }

    /// Stop tracking a show; its files stay on disk.
    pub fn untrack_show(&self, show_id: Uuid) -> Result<CatalogShow> {
        let mut show = self.store.get_show(show_id)?;
        show.tracked = false;
        self.store.upsert_show(show.clone())?;
        tracing::info!("Untracked {}", show.name);
        Ok(show)
    }

    pub fn movies(&self) -> Result<Vec<CatalogMovie>> {
        self.store.list_movies()
    }

    /// Track a movie so downloads of it can be imported.
    ///
    /// Adding a title and year the catalog already has returns that record,
    /// tracked again if it had been untracked.
    pub fn add_movie(&self, title: &str, year: Option<u16>, tmdb_id: Option<u64>) -> Result<CatalogMovie> {
        let title = title.trim();
        if title.is_empty() {
            return Err(crate::Error::other("movie title must not be empty"));
        }

        let existing = self
            .store
            .list_movies()?
            .into_iter()
            .find(|m| m.year == year && has_name(std::iter::once(m.title.as_str()), title));

        let movie = match existing {
            Some(mut movie) => {
                if movie.tracked && (tmdb_id.is_none() || movie.tmdb_id == tmdb_id) {
                    return Ok(movie);
                }
                movie.tracked = true;
                movie.tmdb_id = tmdb_id.or(movie.tmdb_id);
                movie
            }
            None => {
                let mut movie = CatalogMovie::new(title, year);
                movie.tmdb_id = tmdb_id;
                movie
            }
        };
        self.store.upsert_movie(movie.clone())?;
        tracing::info!("Tracking movie {}", movie.title);
        Ok(movie)
    }

    pub fn add_movie_alias(&self, movie_id: Uuid, alias: &str) -> Result<CatalogMovie> {
        let alias = alias.trim();
        if alias.is_empty() {
            return Err(crate::Error::other("alias must not be empty"));
        }
        let mut movie = self.store.get_movie(movie_id)?;
        if !has_name(movie.names(), alias) {
            movie.aliases.push(alias.to_string());
            self.store.upsert_movie(movie.clone())?;
        }
        Ok(movie)
    }

    pub fn remove_movie_alias(&self, movie_id: Uuid, alias: &str) -> Result<CatalogMovie> {
        let mut movie = self.store.get_movie(movie_id)?;
        let before = movie.aliases.len();
        movie.aliases.retain(|a| !a.eq_ignore_ascii_case(alias.trim()));
        if movie.aliases.len() == before {
            return Err(crate::Error::NotFound(format!("alias '{}' on {}", alias, movie.title)));
        }
        self.store.upsert_movie(movie.clone())?;
        Ok(movie)
    }

    pub fn untrack_movie(&self, movie_id: Uuid) -> Result<CatalogMovie> {
        let mut movie = self.store.get_movie(movie_id)?;
        movie.tracked = false;
        self.store.upsert_movie(movie.clone())?;
        Ok(movie)
    }

    /// Exclude an episode from missing reports.
    pub fn ignore_episode(&self, episode_id: Uuid) -> Result<CatalogEpisode> {
        let mut episode = self.store.get_episode(episode_id)?;
        episode.status = FileStatus::Ignored;
        self.store.update_episode(episode.clone())?;
        Ok(episode)
    }

    /// Clear `ignored`/`special` and recompute the status from the link and air date.
    pub fn reset_status(&self, episode_id: Uuid) -> Result<CatalogEpisode> {
        let mut episode = self.store.get_episode(episode_id)?;
        let today = chrono::Utc::now().date_naive();
        episode.status = if episode.file.is_some() {
            FileStatus::Found
        } else if episode.air_date.map(|d| d > today).unwrap_or(false) {
            FileStatus::NotAired
        } else {
            FileStatus::Missing
        };
        self.store.update_episode(episode.clone())?;
        Ok(episode)
    }

    /// Aired, unlinked episodes that are neither ignored nor specials.
    pub fn missing_episodes(&self, show_id: Uuid) -> Result<Vec<CatalogEpisode>> {
        self.missing_episodes_on(show_id, chrono::Utc::now().date_naive())
    }

    pub fn missing_episodes_on(&self, show_id: Uuid, today: NaiveDate) -> Result<Vec<CatalogEpisode>> {
        // Fail on unknown ids rather than report nothing
        self.store.get_show(show_id)?;
        let mut missing: Vec<CatalogEpisode> = self
            .store
            .episodes_of(show_id)?
            .into_iter()
            .filter(|e| e.counts_as_missing(today))
            .collect();
        missing.sort_by_key(|e| (e.season, e.episode));
        Ok(missing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::catalog::ProviderKind;
    use crate::store::JsonCatalogStore;
    use std::path::Path;

    fn setup() -> (CatalogService, Arc<dyn CatalogStore>, CatalogShow) {
        let store: Arc<dyn CatalogStore> = Arc::new(JsonCatalogStore::in_memory());
        let show = CatalogShow::new("The Bridge", Path::new("/tv/The Bridge"), ProviderKind::Tmdb);
        store.upsert_show(show.clone()).unwrap();
        (CatalogService::new(store.clone()), store, show)
    }

    #[test]
    fn test_alias_add_is_idempotent() {
        let (service, _, show) = setup();
        service.add_show_alias(show.id, "Bron").unwrap();
        let updated = service.add_show_alias(show.id, "bron").unwrap();
        assert_eq!(updated.aliases, vec!["Bron".to_string()]);

        service.remove_show_alias(show.id, "BRON").unwrap();
        assert!(service.remove_show_alias(show.id, "Bron").is_err());
    }

    #[test]
    fn test_missing_report_respects_status() {
        let (service, store, show) = setup();
        let day = |d| NaiveDate::from_ymd_opt(2020, 1, d);
        let episodes = vec![
            CatalogEpisode::new(show.id, 1, 1, "One", day(1)),
            CatalogEpisode::new(show.id, 1, 2, "Two", day(8)),
            CatalogEpisode::new(show.id, 0, 1, "Special", day(2)),
        ];
        store.insert_episodes(episodes.clone()).unwrap();

        let today = NaiveDate::from_ymd_opt(2020, 1, 5).unwrap();
        let missing = service.missing_episodes_on(show.id, today).unwrap();
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].episode, 1);

        service.ignore_episode(episodes[0].id).unwrap();
        assert!(service.missing_episodes_on(show.id, today).unwrap().is_empty());

        service.reset_status(episodes[0].id).unwrap();
        assert_eq!(service.missing_episodes_on(show.id, today).unwrap().len(), 1);
    }

    #[test]
    fn test_add_movie_reuses_existing_record() {
        let (service, store, _) = setup();
        let heat = service.add_movie("Heat", Some(1995), None).unwrap();
        assert_eq!(service.add_movie("heat ", Some(1995), None).unwrap().id, heat.id);

        // Same title, other year is another film
        let remake = service.add_movie("Heat", Some(1986), None).unwrap();
        assert_ne!(remake.id, heat.id);

        service.untrack_movie(heat.id).unwrap();
        let again = service.add_movie("Heat", Some(1995), Some(949)).unwrap();
        assert_eq!(again.id, heat.id);
        assert!(again.tracked);
        assert_eq!(store.get_movie(heat.id).unwrap().tmdb_id, Some(949));
        assert_eq!(service.movies().unwrap().len(), 2);

        assert!(service.add_movie("  ", None, None).is_err());
    }

    #[test]
    fn test_untrack_keeps_record() {
        let (service, store, show) = setup();
        service.untrack_show(show.id).unwrap();
        assert!(!store.get_show(show.id).unwrap().tracked);
    }
}
