//! Provider fallback for shows whose files do not fit the episode list.
//!
//! When a bulk import leaves extras, the alternate provider's episode list
//! is fetched and the show's files are counted against it without touching
//! the catalog. The list is swapped in only if every file would match.
//! Provider failures mean "no improvement".

use crate::core::classifier::{self, ParseResult};
use crate::core::matcher::DiscoveryScorer;
use crate::core::pipeline::{Origin, Pipeline};
use crate::core::scanner;
use crate::models::catalog::{CatalogEpisode, CatalogShow, ProviderKind};
use crate::models::job::ScanItem;
use crate::services::provider::{ProviderEpisode, Providers};
use crate::store::CatalogStore;
use crate::Result;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Result of a fallback attempt.
#[derive(Debug)]
pub enum FallbackOutcome {
    /// Every file already matches the current list.
    NotNeeded,
    /// The current list stays; `reason` says why.
    Kept { reason: String },
    /// Episodes were replaced from `source` and the files re-matched.
    Replaced {
        source: ProviderKind,
        items: Vec<ScanItem>,
    },
}

/// Episode numbers a file's name claims, or `None` when it is not an episode.
fn claimed_episodes(path: &Path) -> Option<Vec<(u16, u16)>> {
    let filename = path.file_name()?.to_string_lossy().to_string();
    match classifier::classify(&filename) {
        ParseResult::Tv(hint) => Some(hint.episodes().into_iter().map(|e| (hint.season, e)).collect()),
        _ => None,
    }
}

/// Files minus matched episode units; a multi-episode file counts once per episode.
///
/// Zero or below means the list explains every file.
pub fn unmatched_count(files: &[PathBuf], list: &HashSet<(u16, u16)>) -> i64 {
    let matched: usize = files
        .iter()
        .filter_map(|f| claimed_episodes(f))
        .filter(|eps| !eps.is_empty() && eps.iter().all(|key| list.contains(key)))
        .map(|eps| eps.len())
        .sum();
    files.len() as i64 - matched as i64
}

/// Files whose claimed episodes are not all on `list`.
pub fn extras(files: &[PathBuf], list: &HashSet<(u16, u16)>) -> Vec<PathBuf> {
    files
        .iter()
        .filter(|f| match claimed_episodes(f) {
            Some(eps) => !eps.iter().all(|key| list.contains(key)),
            None => true,
        })
        .cloned()
        .collect()
}

fn episode_keys(episodes: impl IntoIterator<Item = (u16, u16)>) -> HashSet<(u16, u16)> {
    episodes.into_iter().collect()
}

pub struct FallbackResolver {
    store: Arc<dyn CatalogStore>,
    providers: Providers,
    scorer: DiscoveryScorer,
    pipeline: Arc<Pipeline>,
    extensions: Vec<String>,
}

impl FallbackResolver {
    pub fn new(
        store: Arc<dyn CatalogStore>,
        providers: Providers,
        scorer: DiscoveryScorer,
        pipeline: Arc<Pipeline>,
    ) -> Self {
        Self {
            store,
            providers,
            scorer,
            pipeline,
            extensions: Vec::new(),
        }
    }

    /// Video extensions used when re-walking a show folder; empty means the defaults.
    pub fn with_extensions(mut self, extensions: Vec<String>) -> Self {
        self.extensions = extensions;
        self
    }

    /// Try the alternate provider for `show` given the files found in its folder.
    ///
    /// Never fails: provider and catalog errors keep the current list.
    pub async fn resolve_unmatched_extras(&self, show: &CatalogShow, files: &[PathBuf]) -> FallbackOutcome {
        let current = match self.store.episodes_of(show.id) {
            Ok(episodes) => episode_keys(episodes.iter().map(|e| (e.season, e.episode))),
            Err(e) => {
                return FallbackOutcome::Kept {
                    reason: e.to_string(),
                }
            }
        };
        let leftover = extras(files, &current);
        if leftover.is_empty() {
            return FallbackOutcome::NotNeeded;
        }

        let alternate = show.metadata_source.alternate();
        tracing::info!(
            "{} has {} unmatched files, trying {}",
            show.name,
            leftover.len(),
            alternate
        );

        let (alt_id, episodes) = match self.fetch_alternate(show, alternate).await {
            Ok(Some(found)) => found,
            Ok(None) => {
                return FallbackOutcome::Kept {
                    reason: format!("{} has no entry for {}", alternate, show.name),
                }
            }
            Err(e) => {
                tracing::warn!("Fallback to {} for {} failed: {}", alternate, show.name, e);
                return FallbackOutcome::Kept { reason: e.to_string() };
            }
        };

        let alt_keys = episode_keys(episodes.iter().map(|e| (e.season, e.episode)));
        let unmatched = unmatched_count(files, &alt_keys);
        if unmatched > 0 {
            tracing::info!(
                "{} still leaves {} files unmatched for {}; keeping {}",
                alternate,
                unmatched,
                show.name,
                show.metadata_source
            );
            return FallbackOutcome::Kept {
                reason: format!("{} leaves {} files unmatched", alternate, unmatched),
            };
        }

        let replacement: Vec<CatalogEpisode> = episodes
            .iter()
            .map(|e| CatalogEpisode::new(show.id, e.season, e.episode, &e.title, e.air_date))
            .collect();
        if let Err(e) = self
            .store
            .replace_show_episodes(show.id, replacement, alternate, alt_id)
        {
            tracing::error!("Failed to replace episodes of {}: {}", show.name, e);
            return FallbackOutcome::Kept { reason: e.to_string() };
        }
        tracing::info!(
            "Switched {} to {} ({} episodes)",
            show.name,
            alternate,
            episodes.len()
        );

        // The first import may have moved files; walk the folder again
        let current_files = match scanner::scan_directory(&show.root_folder, &self.extensions) {
            Ok(found) => found.videos.into_iter().map(|v| v.path).collect(),
            Err(e) => {
                tracing::warn!("Cannot re-walk {:?}: {}", show.root_folder, e);
                files.to_vec()
            }
        };
        let scope: HashSet<_> = [show.id].into_iter().collect();
        let mut items = Vec::with_capacity(current_files.len());
        for file in &current_files {
            items.push(self.pipeline.process(file, Origin::Library, Some(&scope)).await);
        }

        FallbackOutcome::Replaced {
            source: alternate,
            items,
        }
    }

    /// The show's id and episode list on `alternate`.
    async fn fetch_alternate(
        &self,
        show: &CatalogShow,
        alternate: ProviderKind,
    ) -> Result<Option<(u64, Vec<ProviderEpisode>)>> {
        let alt_id = match self.cross_reference(show, alternate).await? {
            Some(id) => Some(id),
            None => self.search_by_name(show, alternate).await?,
        };
        let Some(alt_id) = alt_id else {
            return Ok(None);
        };

        let episodes = self.providers.episodes(alternate, alt_id).await?;
        Ok(Some((alt_id, episodes)))
    }

    /// Resolve through external ids when leaving the primary provider.
    async fn cross_reference(&self, show: &CatalogShow, alternate: ProviderKind) -> Result<Option<u64>> {
        if let Some(id) = show.provider_ids.get(alternate) {
            return Ok(Some(id));
        }
        if show.metadata_source != self.providers.primary.kind() {
            return Ok(None);
        }
        let Some(source_id) = show.source_id() else {
            return Ok(None);
        };

        let ids = self.providers.external_ids(show.metadata_source, source_id).await?;
        if let Some(id) = match alternate {
            ProviderKind::Tmdb => ids.tmdb,
            ProviderKind::Tvmaze => ids.tvmaze,
        } {
            return Ok(Some(id));
        }
        if ids.is_empty() {
            return Ok(None);
        }
        self.providers.lookup(alternate, &ids).await
    }

    /// Name search on `alternate`, scored like folder discovery.
    async fn search_by_name(&self, show: &CatalogShow, alternate: ProviderKind) -> Result<Option<u64>> {
        let candidates = self.providers.search(alternate, &show.name, show.year).await?;
        let owned: HashSet<u64> = self
            .store
            .list_shows()?
            .iter()
            .filter(|s| s.id != show.id)
            .filter_map(|s| s.provider_ids.get(alternate))
            .collect();

        Ok(self
            .scorer
            .best_candidate(&show.name, show.year, &candidates, |c| owned.contains(&c.id))
            .map(|(candidate, _)| candidate.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn files(names: &[&str]) -> Vec<PathBuf> {
        names.iter().map(|n| PathBuf::from("/tv/Show").join(n)).collect()
    }

    #[test]
    fn test_unmatched_count() {
        let list: HashSet<_> = [(1, 1), (1, 2), (1, 3)].into_iter().collect();

        assert_eq!(unmatched_count(&files(&["Show.S01E01.mkv", "Show.S01E02.mkv"]), &list), 0);
        assert_eq!(unmatched_count(&files(&["Show.S01E01.mkv", "Show.S02E01.mkv"]), &list), 1);
        assert_eq!(unmatched_count(&files(&["Show.S01E01.mkv", "notes.mkv"]), &list), 1);
    }

    #[test]
    fn test_multi_episode_counts_per_episode() {
        let list: HashSet<_> = [(1, 1), (1, 2), (1, 3)].into_iter().collect();
        let found = files(&["Show.S01E01E02.mkv", "Show.S01E99.mkv"]);

        // 2 files, 2 matched units from the double episode
        assert_eq!(unmatched_count(&found, &list), 0);
        assert_eq!(extras(&found, &list).len(), 1);
    }
}
