//! Folder discovery.
//!
//! Turns un-owned subfolders of the TV root into tracked shows: search the
//! primary provider by folder name, pick the best candidate that is not
//! already in the catalog, fetch its episodes, import the folder and let
//! the fallback resolver look at whatever is left over.

use crate::core::classifier;
use crate::core::fallback::{FallbackOutcome, FallbackResolver};
use crate::core::matcher::DiscoveryScorer;
use crate::core::pipeline::{Origin, Pipeline};
use crate::core::scanner;
use crate::models::catalog::{CatalogEpisode, CatalogShow};
use crate::models::config::Config;
use crate::models::job::{ItemOutcome, ScanItem};
use crate::services::provider::Providers;
use crate::store::CatalogStore;
use crate::Result;
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

/// What happened to one folder.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DiscoveryOutcome {
    Added {
        show_id: Uuid,
        name: String,
        score: f64,
        episodes: usize,
        imported: usize,
        fallback: String,
    },
    NoCandidate {
        reason: String,
    },
    Failed {
        reason: String,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct DiscoveryEntry {
    pub folder: PathBuf,
    pub outcome: DiscoveryOutcome,
}

pub struct Discovery {
    store: Arc<dyn CatalogStore>,
    providers: Providers,
    pipeline: Arc<Pipeline>,
    fallback: FallbackResolver,
    scorer: DiscoveryScorer,
    config: Config,
}

impl Discovery {
    pub fn new(store: Arc<dyn CatalogStore>, providers: Providers, pipeline: Arc<Pipeline>, config: Config) -> Self {
        let scorer = DiscoveryScorer::from_config(&config.matching);
        let fallback = FallbackResolver::new(store.clone(), providers.clone(), scorer, pipeline.clone())
            .with_extensions(config.watcher.extensions.clone());
        Self {
            store,
            providers,
            pipeline,
            fallback,
            scorer,
            config,
        }
    }

    /// Subfolders of `root` that no tracked show owns, sorted.
    pub fn unowned_folders(&self, root: &Path) -> Result<Vec<PathBuf>> {
        crate::utils::fs::ensure_directory(root)?;
        let owned: Vec<PathBuf> = self
            .store
            .list_shows()?
            .into_iter()
            .filter(|s| s.tracked)
            .map(|s| s.root_folder)
            .collect();

        let mut folders = Vec::new();
        for entry in std::fs::read_dir(root)? {
            let path = entry?.path();
            let hidden = path
                .file_name()
                .map(|n| n.to_string_lossy().starts_with('.'))
                .unwrap_or(true);
            if !path.is_dir() || hidden {
                continue;
            }
            if owned.iter().any(|r| path.starts_with(r) || r.starts_with(&path)) {
                continue;
            }
            folders.push(path);
        }
        folders.sort();
        Ok(folders)
    }

    /// Discover every un-owned folder under `root`.
    pub async fn discover(&self, root: &Path) -> Result<Vec<DiscoveryEntry>> {
        let folders = self.unowned_folders(root)?;
        tracing::info!("Discovering {} folders under {:?}", folders.len(), root);

        let mut entries = Vec::with_capacity(folders.len());
        for folder in folders {
            let outcome = match self.discover_folder(&folder).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::warn!("Discovery of {:?} failed: {}", folder, e);
                    DiscoveryOutcome::Failed { reason: e.to_string() }
                }
            };
            entries.push(DiscoveryEntry { folder, outcome });
        }
        Ok(entries)
    }

    /// Identify, add and import one folder.
    pub async fn discover_folder(&self, folder: &Path) -> Result<DiscoveryOutcome> {
        let name = folder
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let (title, year) = classifier::folder_title(&name);
        let primary = self.providers.primary.kind();

        let candidates = self.providers.search(primary, &title, year).await?;
        let owned: HashSet<u64> = self
            .store
            .list_shows()?
            .iter()
            .filter_map(|s| s.provider_ids.get(primary))
            .collect();

        let Some((candidate, score)) = self
            .scorer
            .best_candidate(&title, year, &candidates, |c| owned.contains(&c.id))
        else {
            return Ok(DiscoveryOutcome::NoCandidate {
                reason: format!("no {} result for '{}' scored high enough", primary, title),
            });
        };
        tracing::info!("Matched folder {:?} to '{}' ({:.2})", folder, candidate.name, score);

        let provider_episodes = self.providers.episodes(primary, candidate.id).await?;

        let mut show = CatalogShow::new(&candidate.name, folder, primary);
        show.provider_ids.set(primary, candidate.id);
        show.year = candidate.year;
        show.naming = self.config.naming.show_templates();
        self.store.upsert_show(show.clone())?;

        let episodes: Vec<CatalogEpisode> = provider_episodes
            .iter()
            .map(|e| CatalogEpisode::new(show.id, e.season, e.episode, &e.title, e.air_date))
            .collect();
        let episode_count = self.store.insert_episodes(episodes)?;

        let files: Vec<PathBuf> = scanner::scan_directory(folder, &self.config.watcher.extensions)?
            .videos
            .into_iter()
            .map(|v| v.path)
            .collect();
        let items = self.import(&show, &files).await;

        let (fallback, items) = match self.fallback.resolve_unmatched_extras(&show, &files).await {
            FallbackOutcome::NotNeeded => ("not needed".to_string(), items),
            FallbackOutcome::Kept { reason } => (format!("kept {}: {}", primary, reason), items),
            FallbackOutcome::Replaced { source, items } => (format!("switched to {}", source), items),
        };

        Ok(DiscoveryOutcome::Added {
            show_id: show.id,
            name: show.name,
            score,
            episodes: episode_count,
            imported: items
                .iter()
                .filter(|i| matches!(i.outcome, ItemOutcome::Added | ItemOutcome::Proposed))
                .count(),
            fallback,
        })
    }

    /// Bulk import of a show folder, scoped to that show.
    async fn import(&self, show: &CatalogShow, files: &[PathBuf]) -> Vec<ScanItem> {
        let scope: HashSet<Uuid> = [show.id].into_iter().collect();
        let mut items = Vec::with_capacity(files.len());
        for file in files {
            items.push(self.pipeline.process(file, Origin::Library, Some(&scope)).await);
        }
        items
    }
}
