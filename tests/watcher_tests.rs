//! Integration tests for the download folder watcher.
//!
//! Tests cover:
//! - A file dropped into a watched folder reaches the pipeline
//! - Shutdown waits for in-flight files

use media_ingest::cli::context::Context;
use media_ingest::core::watcher::FolderWatcher;
use media_ingest::models::catalog::{CatalogEpisode, CatalogShow, ProviderKind};
use media_ingest::models::config::{Config, WatcherConfig};
use media_ingest::store::{CatalogStore, JsonCatalogStore};
use std::fs;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::oneshot;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_dropped_file_is_imported_before_shutdown() {
    let dir = TempDir::new().unwrap();
    let downloads = dir.path().join("downloads");
    fs::create_dir_all(&downloads).unwrap();

    let mut config = Config::default();
    config.library.tv_root = dir.path().join("tv");
    config.library.download_dirs = vec![downloads.clone()];
    config.library.quarantine_root = dir.path().join("issues");
    config.watcher = WatcherConfig {
        settle_secs: 0,
        poll_secs: 1,
        workers: 2,
        channel_capacity: 8,
        extensions: Vec::new(),
    };

    let store: Arc<dyn CatalogStore> = Arc::new(JsonCatalogStore::in_memory());
    let ctx = Context::new(config.clone(), store);
    let show = CatalogShow::new("Borgen", &dir.path().join("tv/Borgen"), ProviderKind::Tmdb);
    let episode = CatalogEpisode::new(show.id, 1, 4, "Episode 4", None);
    ctx.store.upsert_show(show).unwrap();
    ctx.store.insert_episodes(vec![episode.clone()]).unwrap();

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let watcher = FolderWatcher::new(config.watcher.clone(), vec![downloads.clone()], ctx.pipeline.clone());
    let running = tokio::spawn(watcher.run(async move {
        let _ = stop_rx.await;
    }));

    // Let the watch register before the file lands
    tokio::time::sleep(Duration::from_millis(300)).await;
    let source = downloads.join("Borgen.S01E04.1080p.WEB.mkv");
    fs::write(&source, b"episode four").unwrap();

    // The move happens inside a worker; stop as soon as it starts
    let mut moved = false;
    for _ in 0..200 {
        if !source.exists() {
            moved = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert!(moved, "watcher never picked up {:?}", source);
    stop_tx.send(()).unwrap();

    tokio::time::timeout(Duration::from_secs(10), running)
        .await
        .expect("watcher did not stop")
        .unwrap()
        .unwrap();

    // Shutdown waited for the worker to finish the import
    let linked = ctx.store.get_episode(episode.id).unwrap().file.unwrap();
    assert!(linked.ends_with("Season 01/Borgen - S01E04 - Episode 4.mkv"));
    assert_eq!(fs::read(linked).unwrap(), b"episode four");
}
