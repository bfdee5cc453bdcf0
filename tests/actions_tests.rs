//! Integration tests for pending actions.
//!
//! Tests cover:
//! - approve-all with independent per-item outcomes
//! - Rename apply round-trip through the catalog
//! - Actions orphaned by an episode list swap never move files
//! - Idempotent proposals

use media_ingest::cli::context::Context;
use media_ingest::core::pipeline::Origin;
use media_ingest::models::action::{ActionKind, ActionStatus, ActionTarget};
use media_ingest::models::activity::ActivityKind;
use media_ingest::models::catalog::{CatalogEpisode, CatalogShow, ProviderKind};
use media_ingest::models::config::Config;
use media_ingest::models::job::ItemOutcome;
use media_ingest::store::{CatalogStore, JsonCatalogStore};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

fn setup(episodes: u16) -> (TempDir, Context, CatalogShow, Vec<CatalogEpisode>) {
    let dir = TempDir::new().unwrap();
    let mut config = Config::default();
    config.library.tv_root = dir.path().join("tv");
    config.library.quarantine_root = dir.path().join("issues");
    let store: Arc<dyn CatalogStore> = Arc::new(JsonCatalogStore::in_memory());
    let ctx = Context::new(config, store);

    let mut show = CatalogShow::new("Borgen", &dir.path().join("tv/Borgen"), ProviderKind::Tmdb);
    show.rename_enabled = false;
    let list: Vec<CatalogEpisode> = (1..=episodes)
        .map(|e| CatalogEpisode::new(show.id, 1, e, &format!("Episode {}", e), None))
        .collect();
    ctx.store.upsert_show(show.clone()).unwrap();
    ctx.store.insert_episodes(list.clone()).unwrap();
    (dir, ctx, show, list)
}

fn write(path: &PathBuf, content: &[u8]) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

#[tokio::test]
async fn test_approve_all_reports_each_item() {
    let (dir, ctx, _show, episodes) = setup(5);

    let mut sources = Vec::new();
    for n in 1..=5 {
        let source = dir.path().join(format!("downloads/Borgen.S01E{:02}.mkv", n));
        write(&source, format!("episode {}", n).as_bytes());
        let item = ctx.pipeline.process(&source, Origin::Download, None).await;
        assert_eq!(item.outcome, ItemOutcome::Proposed);
        sources.push(source);
    }
    let pending = ctx.actions.list(Some(ActionStatus::Pending)).unwrap();
    assert_eq!(pending.len(), 5);

    // Item 2 loses its file before the batch runs
    fs::remove_file(&sources[1]).unwrap();

    let report = ctx.actions.approve_all().await.unwrap();
    assert_eq!(report.success, 4);
    assert_eq!(report.failed, 1);
    assert!(!report.is_success());

    for (idx, action) in pending.iter().enumerate() {
        let stored = ctx.actions.get(action.id).unwrap();
        if idx == 1 {
            assert_eq!(stored.status, ActionStatus::Failed);
            assert!(stored.failure_reason.is_some());
            assert!(ctx.store.get_episode(episodes[1].id).unwrap().file.is_none());
        } else {
            assert_eq!(stored.status, ActionStatus::Applied);
            assert!(ctx.store.get_episode(episodes[idx].id).unwrap().file.is_some());
        }
    }
    assert_eq!(report.items[1].status, ActionStatus::Failed);
}

#[tokio::test]
async fn test_rename_round_trip() {
    let (dir, ctx, show, episodes) = setup(2);
    let target = ActionTarget::Episode {
        show_id: show.id,
        episode_ids: vec![episodes[1].id],
    };

    let source = dir.path().join("downloads/Borgen.S01E02.mkv");
    write(&source, b"two");
    let import = ctx.actions.propose(ActionKind::Import, source, target).unwrap();
    let old = ctx.actions.approve(import.id).await.unwrap().destination.unwrap();

    // The show's naming changes after the file was placed
    let mut renamed = ctx.store.get_show(show.id).unwrap();
    renamed.naming.episode_file = "{show} {season}x{episode:02}".to_string();
    ctx.store.upsert_show(renamed).unwrap();

    let item = ctx.pipeline.process(&old, Origin::Library, None).await;
    assert_eq!(item.outcome, ItemOutcome::Proposed, "{}", item.reason);

    let action = ctx.actions.list(Some(ActionStatus::Pending)).unwrap().remove(0);
    assert_eq!(action.kind, ActionKind::Rename);

    let outcome = ctx.actions.approve(action.id).await.unwrap();
    assert_eq!(outcome.status, ActionStatus::Applied);

    let expected = dir.path().join("tv/Borgen/Season 01/Borgen 1x02.mkv");
    let episode = ctx.store.get_episode(episodes[1].id).unwrap();
    assert_eq!(episode.file, Some(expected.clone()));
    assert_eq!(fs::read(&expected).unwrap(), b"two");
    assert!(!old.exists());
}

#[tokio::test]
async fn test_replaced_episode_list_fails_open_actions() {
    let (dir, ctx, show, episodes) = setup(2);
    let source = dir.path().join("downloads/Borgen.S01E02.mkv");
    write(&source, b"two");
    let action = ctx
        .actions
        .propose(
            ActionKind::Import,
            source.clone(),
            ActionTarget::Episode {
                show_id: show.id,
                episode_ids: vec![episodes[1].id],
            },
        )
        .unwrap();

    let fresh: Vec<CatalogEpisode> = (1..=2)
        .map(|e| CatalogEpisode::new(show.id, 1, e, &format!("Chapter {}", e), None))
        .collect();
    ctx.store
        .replace_show_episodes(show.id, fresh, ProviderKind::Tvmaze, 7)
        .unwrap();

    let stored = ctx.actions.get(action.id).unwrap();
    assert_eq!(stored.status, ActionStatus::Failed);
    assert!(matches!(
        ctx.actions.approve(action.id).await,
        Err(media_ingest::Error::InvalidTransition { .. })
    ));
    assert!(source.exists());
    assert!(!dir.path().join("tv/Borgen/Season 01").exists());
}

#[tokio::test]
async fn test_apply_with_vanished_episode_leaves_file() {
    let (dir, ctx, show, episodes) = setup(2);
    let source = dir.path().join("downloads/Borgen.S01E02.mkv");
    write(&source, b"two");
    let action = ctx
        .actions
        .propose(
            ActionKind::Import,
            source.clone(),
            ActionTarget::Episode {
                show_id: show.id,
                episode_ids: vec![episodes[1].id],
            },
        )
        .unwrap();

    // A pending action that outlived its episode
    ctx.store
        .replace_show_episodes(show.id, Vec::new(), ProviderKind::Tvmaze, 7)
        .unwrap();
    let mut stale = ctx.actions.get(action.id).unwrap();
    stale.status = ActionStatus::Pending;
    stale.failure_reason = None;
    ctx.store.update_action(stale).unwrap();

    let outcome = ctx.actions.approve(action.id).await.unwrap();
    assert_eq!(outcome.status, ActionStatus::Failed);
    assert!(source.exists());
    assert!(!action.destination.unwrap().exists());
    assert!(ctx
        .store
        .list_activity(10)
        .unwrap()
        .iter()
        .all(|a| a.kind != ActivityKind::Import));
}

#[tokio::test]
async fn test_propose_is_idempotent_per_source() {
    let (dir, ctx, show, episodes) = setup(1);
    let source = dir.path().join("downloads/Borgen.S01E01.mkv");
    write(&source, b"one");
    let target = ActionTarget::Episode {
        show_id: show.id,
        episode_ids: vec![episodes[0].id],
    };

    let first = ctx.actions.propose(ActionKind::Import, source.clone(), target.clone()).unwrap();
    let second = ctx.actions.propose(ActionKind::Import, source, target).unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(ctx.actions.list(None).unwrap().len(), 1);
}

#[tokio::test]
async fn test_rejected_action_cannot_be_approved() {
    let (dir, ctx, show, episodes) = setup(1);
    let source = dir.path().join("downloads/Borgen.S01E01.mkv");
    write(&source, b"one");
    let action = ctx
        .actions
        .propose(
            ActionKind::Import,
            source.clone(),
            ActionTarget::Episode {
                show_id: show.id,
                episode_ids: vec![episodes[0].id],
            },
        )
        .unwrap();

    ctx.actions.reject(action.id).await.unwrap();
    assert!(matches!(
        ctx.actions.approve(action.id).await,
        Err(media_ingest::Error::InvalidTransition { .. })
    ));
    assert!(source.exists());
}
