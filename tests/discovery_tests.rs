//! Integration tests for folder discovery and provider fallback.
//!
//! Providers are in-memory fakes; no network access.
//!
//! Tests cover:
//! - Candidate selection skipping shows already in the catalog
//! - Fallback replacing the episode list when it explains every file
//! - Fallback keeping the list when the alternate is worse or unavailable

use async_trait::async_trait;
use media_ingest::cli::context::Context;
use media_ingest::core::discovery::{Discovery, DiscoveryOutcome};
use media_ingest::models::catalog::{CatalogShow, ProviderKind};
use media_ingest::models::config::Config;
use media_ingest::services::provider::{
    ExternalIds, MetadataProvider, ProviderEpisode, Providers, SearchCandidate,
};
use media_ingest::store::{CatalogStore, JsonCatalogStore};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

#[derive(Default)]
struct FakeProvider {
    kind: Option<ProviderKind>,
    results: Vec<SearchCandidate>,
    episodes: HashMap<u64, Vec<ProviderEpisode>>,
    external: ExternalIds,
    broken: bool,
}

impl FakeProvider {
    fn new(kind: ProviderKind) -> Self {
        Self {
            kind: Some(kind),
            ..Default::default()
        }
    }

    fn with_result(mut self, id: u64, name: &str, year: Option<u16>) -> Self {
        self.results.push(SearchCandidate {
            provider: self.kind(),
            id,
            name: name.to_string(),
            year,
        });
        self
    }

    fn with_episodes(mut self, id: u64, keys: &[(u16, u16)]) -> Self {
        let list = keys
            .iter()
            .map(|&(season, episode)| ProviderEpisode {
                season,
                episode,
                title: format!("Episode {}", episode),
                air_date: None,
            })
            .collect();
        self.episodes.insert(id, list);
        self
    }

    fn with_external(mut self, external: ExternalIds) -> Self {
        self.external = external;
        self
    }

    fn broken(mut self) -> Self {
        self.broken = true;
        self
    }

    fn check(&self) -> media_ingest::Result<()> {
        if self.broken {
            return Err(media_ingest::Error::ProviderUnavailable("connection refused".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl MetadataProvider for FakeProvider {
    fn kind(&self) -> ProviderKind {
        self.kind.unwrap_or(ProviderKind::Tmdb)
    }

    async fn search_by_title(&self, _title: &str, _year: Option<u16>) -> media_ingest::Result<Vec<SearchCandidate>> {
        self.check()?;
        Ok(self.results.clone())
    }

    async fn get_episodes(&self, show_id: u64) -> media_ingest::Result<Vec<ProviderEpisode>> {
        self.check()?;
        self.episodes
            .get(&show_id)
            .cloned()
            .ok_or_else(|| media_ingest::Error::NotFound(format!("show {}", show_id)))
    }

    async fn get_external_ids(&self, _show_id: u64) -> media_ingest::Result<ExternalIds> {
        self.check()?;
        Ok(self.external.clone())
    }

    async fn lookup_by_external(&self, _ids: &ExternalIds) -> media_ingest::Result<Option<u64>> {
        self.check()?;
        Ok(None)
    }
}

struct Setup {
    dir: TempDir,
    ctx: Context,
    discovery: Discovery,
}

fn setup(tmdb: FakeProvider, tvmaze: FakeProvider) -> Setup {
    let dir = TempDir::new().unwrap();
    let mut config = Config::default();
    config.library.tv_root = dir.path().join("tv");
    config.library.movie_root = dir.path().join("movies");
    config.library.quarantine_root = dir.path().join("issues");
    fs::create_dir_all(&config.library.tv_root).unwrap();

    let store: Arc<dyn CatalogStore> = Arc::new(JsonCatalogStore::in_memory());
    let ctx = Context::new(config.clone(), store);
    let providers = Providers::new(Arc::new(tmdb), Some(Arc::new(tvmaze)), Duration::from_secs(5));
    let discovery = Discovery::new(ctx.store.clone(), providers, ctx.pipeline.clone(), config);

    Setup { dir, ctx, discovery }
}

fn touch(folder: &Path, names: &[&str]) {
    fs::create_dir_all(folder).unwrap();
    for name in names {
        fs::write(folder.join(name), name.as_bytes()).unwrap();
    }
}

fn kingdom_files(setup: &Setup) {
    touch(
        &setup.dir.path().join("tv/Kingdom"),
        &["Kingdom.S01E01.mkv", "Kingdom.S01E02.mkv", "Kingdom.S02E01.mkv"],
    );
}

#[tokio::test]
async fn test_discovery_skips_candidates_already_tracked() {
    let tmdb = FakeProvider::new(ProviderKind::Tmdb)
        .with_result(2, "Borgen - Power & Glory", Some(2022))
        .with_result(1, "Borgen", Some(2010))
        .with_episodes(1, &[(1, 1), (1, 2), (1, 3)]);
    let s = setup(tmdb, FakeProvider::new(ProviderKind::Tvmaze));

    let mut existing = CatalogShow::new(
        "Borgen - Power & Glory",
        &s.dir.path().join("library/Borgen - Power & Glory"),
        ProviderKind::Tmdb,
    );
    existing.provider_ids.tmdb = Some(2);
    s.ctx.store.upsert_show(existing).unwrap();

    touch(&s.dir.path().join("tv/Borgen"), &["Borgen.S01E01.mkv", "Borgen.S01E02.mkv"]);

    let entries = s.discovery.discover(&s.dir.path().join("tv")).await.unwrap();
    assert_eq!(entries.len(), 1);

    match &entries[0].outcome {
        DiscoveryOutcome::Added {
            show_id,
            name,
            episodes,
            imported,
            ..
        } => {
            assert_eq!(name, "Borgen");
            assert_eq!(*episodes, 3);
            assert_eq!(*imported, 2);

            let show = s.ctx.store.get_show(*show_id).unwrap();
            assert_eq!(show.provider_ids.tmdb, Some(1));
            let linked = s
                .ctx
                .store
                .episodes_of(show.id)
                .unwrap()
                .iter()
                .filter(|e| e.file.is_some())
                .count();
            assert_eq!(linked, 2);
        }
        other => panic!("unexpected outcome: {:?}", other),
    }

    // The folder is owned now
    assert!(s.discovery.discover(&s.dir.path().join("tv")).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_discovery_without_free_candidate() {
    let tmdb = FakeProvider::new(ProviderKind::Tmdb).with_result(2, "Borgen", Some(2010));
    let s = setup(tmdb, FakeProvider::new(ProviderKind::Tvmaze));

    let mut existing = CatalogShow::new("Borgen", &s.dir.path().join("library/Borgen"), ProviderKind::Tmdb);
    existing.provider_ids.tmdb = Some(2);
    s.ctx.store.upsert_show(existing).unwrap();
    touch(&s.dir.path().join("tv/Borgen (2010)"), &["Borgen.S01E01.mkv"]);

    let entries = s.discovery.discover(&s.dir.path().join("tv")).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert!(matches!(entries[0].outcome, DiscoveryOutcome::NoCandidate { .. }));
    assert_eq!(s.ctx.store.list_shows().unwrap().len(), 1);
}

#[tokio::test]
async fn test_fallback_switches_to_list_covering_all_files() {
    let tmdb = FakeProvider::new(ProviderKind::Tmdb)
        .with_result(10, "Kingdom", None)
        .with_episodes(10, &[(1, 1), (1, 2)])
        .with_external(ExternalIds {
            tvmaze: Some(77),
            ..Default::default()
        });
    let tvmaze = FakeProvider::new(ProviderKind::Tvmaze).with_episodes(77, &[(1, 1), (1, 2), (2, 1)]);
    let s = setup(tmdb, tvmaze);
    kingdom_files(&s);

    let entries = s.discovery.discover(&s.dir.path().join("tv")).await.unwrap();
    let DiscoveryOutcome::Added {
        show_id,
        imported,
        fallback,
        ..
    } = &entries[0].outcome
    else {
        panic!("unexpected outcome: {:?}", entries[0].outcome);
    };
    assert_eq!(fallback, "switched to tvmaze");
    assert_eq!(*imported, 3);

    let show = s.ctx.store.get_show(*show_id).unwrap();
    assert_eq!(show.metadata_source, ProviderKind::Tvmaze);
    assert_eq!(show.provider_ids.tvmaze, Some(77));

    let episodes = s.ctx.store.episodes_of(show.id).unwrap();
    assert_eq!(episodes.len(), 3);
    assert!(episodes.iter().all(|e| e.file.as_ref().map(|f| f.exists()).unwrap_or(false)));
}

#[tokio::test]
async fn test_fallback_keeps_list_when_alternate_is_worse() {
    let tmdb = FakeProvider::new(ProviderKind::Tmdb)
        .with_result(10, "Kingdom", None)
        .with_episodes(10, &[(1, 1), (1, 2)])
        .with_external(ExternalIds {
            tvmaze: Some(77),
            ..Default::default()
        });
    let tvmaze = FakeProvider::new(ProviderKind::Tvmaze).with_episodes(77, &[(1, 1)]);
    let s = setup(tmdb, tvmaze);
    kingdom_files(&s);

    let entries = s.discovery.discover(&s.dir.path().join("tv")).await.unwrap();
    let DiscoveryOutcome::Added { show_id, fallback, .. } = &entries[0].outcome else {
        panic!("unexpected outcome: {:?}", entries[0].outcome);
    };
    assert!(fallback.starts_with("kept tmdb"), "{}", fallback);

    let show = s.ctx.store.get_show(*show_id).unwrap();
    assert_eq!(show.metadata_source, ProviderKind::Tmdb);
    assert_eq!(s.ctx.store.episodes_of(show.id).unwrap().len(), 2);
    assert!(s.dir.path().join("tv/Kingdom/Kingdom.S02E01.mkv").exists());
}

#[tokio::test]
async fn test_fallback_keeps_list_when_alternate_is_down() {
    let tmdb = FakeProvider::new(ProviderKind::Tmdb)
        .with_result(10, "Kingdom", None)
        .with_episodes(10, &[(1, 1), (1, 2)])
        .with_external(ExternalIds {
            tvmaze: Some(77),
            ..Default::default()
        });
    let s = setup(tmdb, FakeProvider::new(ProviderKind::Tvmaze).broken());
    kingdom_files(&s);

    let entries = s.discovery.discover(&s.dir.path().join("tv")).await.unwrap();
    let DiscoveryOutcome::Added { show_id, fallback, .. } = &entries[0].outcome else {
        panic!("unexpected outcome: {:?}", entries[0].outcome);
    };
    assert!(fallback.starts_with("kept tmdb"), "{}", fallback);

    let show = s.ctx.store.get_show(*show_id).unwrap();
    assert_eq!(show.metadata_source, ProviderKind::Tmdb);
    assert_eq!(s.ctx.store.episodes_of(show.id).unwrap().len(), 2);
}
