//! Download folder watcher.
//!
//! notify events -> bounded channel -> settle tracker -> bounded channel ->
//! fixed worker pool -> pipeline. A file is handed on only after its size
//! and mtime have stayed the same for `settle_secs`.

use crate::core::pipeline::{Origin, Pipeline};
use crate::models::config::WatcherConfig;
use crate::utils::fs::is_video_file;
use crate::Result;
use notify::{Config as NotifyConfig, Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};
use tokio::sync::{mpsc, Mutex};

/// Last observed state of a pending file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Snapshot {
    size: u64,
    modified: Option<SystemTime>,
}

impl Snapshot {
    fn of(path: &Path) -> Option<Self> {
        let metadata = std::fs::metadata(path).ok()?;
        metadata.is_file().then(|| Self {
            size: metadata.len(),
            modified: metadata.modified().ok(),
        })
    }
}

#[derive(Debug)]
struct Pending {
    snapshot: Option<Snapshot>,
    since: Instant,
}

/// Holds files until they stop changing.
pub struct SettleTracker {
    pending: HashMap<PathBuf, Pending>,
    settle: Duration,
}

impl SettleTracker {
    pub fn new(settle: Duration) -> Self {
        Self {
            pending: HashMap::new(),
            settle,
        }
    }

    /// Record an event for `path`; restarts its settle window.
    pub fn observe_at(&mut self, path: PathBuf, now: Instant) {
        let snapshot = Snapshot::of(&path);
        self.pending.insert(path, Pending { snapshot, since: now });
    }

    /// Files unchanged for the settle window, removed from tracking.
    ///
    /// A file whose size or mtime moved since the last look starts over;
    /// a file that disappeared is dropped.
    pub fn check_settled_at(&mut self, now: Instant) -> Vec<PathBuf> {
        let mut settled = Vec::new();
        let settle = self.settle;

        self.pending.retain(|path, pending| {
            let Some(current) = Snapshot::of(path) else {
                tracing::debug!("{:?} vanished before settling", path);
                return false;
            };
            if pending.snapshot != Some(current) {
                pending.snapshot = Some(current);
                pending.since = now;
                return true;
            }
            if now.duration_since(pending.since) >= settle {
                settled.push(path.clone());
                return false;
            }
            true
        });

        settled.sort();
        settled
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Watches download folders and feeds settled files to the pipeline.
pub struct FolderWatcher {
    config: WatcherConfig,
    dirs: Vec<PathBuf>,
    pipeline: Arc<Pipeline>,
}

impl FolderWatcher {
    pub fn new(config: WatcherConfig, dirs: Vec<PathBuf>, pipeline: Arc<Pipeline>) -> Self {
        Self {
            config,
            dirs,
            pipeline,
        }
    }

    /// Run until `shutdown` resolves; in-flight files finish first.
    pub async fn run(self, shutdown: impl Future<Output = ()>) -> Result<()> {
        let (event_tx, mut event_rx) = mpsc::channel::<PathBuf>(self.config.channel_capacity);
        let (settled_tx, settled_rx) = mpsc::channel::<PathBuf>(self.config.channel_capacity);

        let extensions = self.config.extensions.clone();
        let mut watcher = RecommendedWatcher::new(
            move |res: std::result::Result<Event, notify::Error>| match res {
                Ok(event) if event.kind.is_create() || event.kind.is_modify() => {
                    for path in event.paths {
                        if is_video_file(&path, &extensions) {
                            // Blocks this notify thread while the channel is full
                            if event_tx.blocking_send(path).is_err() {
                                return;
                            }
                        }
                    }
                }
                Ok(_) => {}
                Err(e) => tracing::warn!("Watch error: {}", e),
            },
            NotifyConfig::default(),
        )?;

        for dir in &self.dirs {
            if dir.is_dir() {
                watcher.watch(dir, RecursiveMode::Recursive)?;
                tracing::info!("Watching directory: {:?}", dir);
            } else {
                tracing::warn!("Watch path does not exist: {:?}", dir);
            }
        }

        // Workers share one receiver
        let settled_rx = Arc::new(Mutex::new(settled_rx));
        let mut workers = Vec::with_capacity(self.config.workers);
        for worker in 0..self.config.workers {
            let rx = settled_rx.clone();
            let pipeline = self.pipeline.clone();
            workers.push(tokio::spawn(async move {
                loop {
                    let next = rx.lock().await.recv().await;
                    let Some(path) = next else {
                        break;
                    };
                    let item = pipeline.process(&path, Origin::Download, None).await;
                    tracing::info!("[worker {}] {:?}: {} {}", worker, path, item.outcome, item.reason);
                }
            }));
        }

        let mut tracker = SettleTracker::new(Duration::from_secs(self.config.settle_secs));
        let mut tick = tokio::time::interval(Duration::from_secs(self.config.poll_secs.max(1)));
        tokio::pin!(shutdown);

        'events: loop {
            tokio::select! {
                Some(path) = event_rx.recv() => {
                    tracing::debug!("File event: {:?}", path);
                    tracker.observe_at(path, Instant::now());
                }
                _ = tick.tick() => {
                    for path in tracker.check_settled_at(Instant::now()) {
                        tracing::info!("File settled: {:?}", path);
                        if settled_tx.send(path).await.is_err() {
                            tracing::error!("Worker pool is gone");
                            break 'events;
                        }
                    }
                }
                _ = &mut shutdown => {
                    tracing::info!("Stopping watcher ({} files still settling)", tracker.len());
                    break 'events;
                }
            }
        }

        drop(watcher);
        drop(settled_tx);
        for worker in workers {
            if let Err(e) = worker.await {
                tracing::error!("Watcher worker panicked: {}", e);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_settles_after_window() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Show.S01E01.mkv");
        std::fs::write(&path, b"partial").unwrap();

        let mut tracker = SettleTracker::new(Duration::from_secs(30));
        let t0 = Instant::now();
        tracker.observe_at(path.clone(), t0);

        assert!(tracker.check_settled_at(t0 + Duration::from_secs(10)).is_empty());
        assert_eq!(tracker.check_settled_at(t0 + Duration::from_secs(30)), vec![path]);
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_growing_file_restarts_window() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Show.S01E02.mkv");
        std::fs::write(&path, b"a").unwrap();

        let mut tracker = SettleTracker::new(Duration::from_secs(30));
        let t0 = Instant::now();
        tracker.observe_at(path.clone(), t0);

        std::fs::write(&path, b"abcdef").unwrap();
        assert!(tracker.check_settled_at(t0 + Duration::from_secs(31)).is_empty());
        assert!(tracker.check_settled_at(t0 + Duration::from_secs(50)).is_empty());
        assert_eq!(tracker.check_settled_at(t0 + Duration::from_secs(61)), vec![path]);
    }

    #[test]
    fn test_vanished_file_is_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gone.mkv");
        std::fs::write(&path, b"a").unwrap();

        let mut tracker = SettleTracker::new(Duration::from_secs(1));
        let t0 = Instant::now();
        tracker.observe_at(path.clone(), t0);
        std::fs::remove_file(&path).unwrap();

        assert!(tracker.check_settled_at(t0 + Duration::from_secs(5)).is_empty());
        assert!(tracker.is_empty());
    }
}
