//! Scan jobs.
//!
//! `running -> {completed, failed}`, single-flight per scope class; a class
//! with no record is idle.
//! A second start of a running class is rejected on the spot; callers poll
//! the registry and retry later.

use crate::core::pipeline::{Origin, Pipeline};
use crate::core::scanner;
use crate::models::config::Config;
use crate::models::job::{JobState, ScanJob, ScanScope, ScanSummary, ScopeClass};
use crate::Result;
use chrono::Utc;
use fs2::FileExt;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

/// Latest job per scope class.
///
/// With a lock directory the single-flight rule also holds across
/// processes: a running job keeps `scan-<class>.lock` locked there.
#[derive(Default)]
pub struct JobRegistry {
    jobs: Mutex<HashMap<ScopeClass, ScanJob>>,
    lock_dir: Option<PathBuf>,
}

impl JobRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Registry whose jobs also hold a lock file in `dir`.
    pub fn with_lock_dir(dir: &Path) -> Arc<Self> {
        Arc::new(Self {
            jobs: Mutex::default(),
            lock_dir: Some(dir.to_path_buf()),
        })
    }

    /// Register a running job, or fail if its class is already running.
    ///
    /// On rejection the table is left exactly as it was.
    pub fn try_start(self: &Arc<Self>, scope: ScanScope) -> Result<JobHandle> {
        let class = scope.class();
        let mut jobs = self.jobs.lock();

        if let Some(job) = jobs.get(&class) {
            if job.state == JobState::Running {
                return Err(crate::Error::JobAlreadyRunning(class.to_string()));
            }
        }
        let lock = match self.lock_dir {
            Some(ref dir) => Some(Self::lock_class(dir, class)?),
            None => None,
        };

        let job = ScanJob {
            id: Uuid::new_v4(),
            scope,
            state: JobState::Running,
            progress: 0,
            message: "starting".to_string(),
            result: None,
            started_at: Utc::now(),
            finished_at: None,
        };
        let id = job.id;
        jobs.insert(class, job);
        tracing::info!("Started {} scan {}", class, id);

        Ok(JobHandle {
            registry: self.clone(),
            class,
            id,
            finished: false,
            lock,
        })
    }

    /// Take the class lock without waiting.
    fn lock_class(dir: &Path, class: ScopeClass) -> Result<File> {
        fs::create_dir_all(dir)?;
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(dir.join(format!("scan-{}.lock", class)))?;

        match FileExt::try_lock_exclusive(&file) {
            Ok(()) => Ok(file),
            Err(e) if e.kind() == fs2::lock_contended_error().kind() => Err(crate::Error::JobAlreadyRunning(
                format!("{} (in another process)", class),
            )),
            Err(e) => Err(e.into()),
        }
    }

    /// Current record for a class; `None` means idle.
    pub fn status(&self, class: ScopeClass) -> Option<ScanJob> {
        self.jobs.lock().get(&class).cloned()
    }

    pub fn get(&self, id: Uuid) -> Option<ScanJob> {
        self.jobs.lock().values().find(|j| j.id == id).cloned()
    }

    pub fn list(&self) -> Vec<ScanJob> {
        let mut jobs: Vec<ScanJob> = self.jobs.lock().values().cloned().collect();
        jobs.sort_by_key(|j| j.started_at);
        jobs
    }

    fn update(&self, class: ScopeClass, id: Uuid, f: impl FnOnce(&mut ScanJob)) {
        if let Some(job) = self.jobs.lock().get_mut(&class).filter(|j| j.id == id) {
            f(job);
        }
    }
}

/// Write access to one running job.
///
/// Dropping a handle that never finished marks the job failed.
pub struct JobHandle {
    registry: Arc<JobRegistry>,
    class: ScopeClass,
    id: Uuid,
    finished: bool,
    /// Held while the job runs; closing it releases the class lock.
    lock: Option<File>,
}

impl JobHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn progress(&self, percent: u8, message: impl Into<String>) {
        let message = message.into();
        self.registry.update(self.class, self.id, |job| {
            job.progress = percent.min(100);
            job.message = message;
        });
    }

    pub fn complete(mut self, summary: ScanSummary) {
        self.finish(JobState::Completed, "done".to_string(), Some(summary));
    }

    pub fn fail(mut self, reason: impl Into<String>) {
        self.finish(JobState::Failed, reason.into(), None);
    }

    fn finish(&mut self, state: JobState, message: String, summary: Option<ScanSummary>) {
        self.finished = true;
        self.registry.update(self.class, self.id, |job| {
            job.state = state;
            if state == JobState::Completed {
                job.progress = 100;
            }
            job.message = message;
            job.result = summary;
            job.finished_at = Some(Utc::now());
        });
        if let Some(file) = self.lock.take() {
            if let Err(e) = FileExt::unlock(&file) {
                tracing::warn!("Failed to release {} scan lock: {}", self.class, e);
            }
        }
        tracing::info!("{} scan {} finished: {:?}", self.class, self.id, state);
    }
}

impl Drop for JobHandle {
    fn drop(&mut self) {
        if !self.finished {
            self.finish(JobState::Failed, "scan aborted".to_string(), None);
        }
    }
}

/// A folder to walk and how its files are treated.
#[derive(Debug, Clone)]
struct ScanRoot {
    path: PathBuf,
    origin: Origin,
    /// A missing folder fails the job instead of being skipped.
    required: bool,
}

/// Runs scan jobs against the pipeline.
pub struct ScanOrchestrator {
    registry: Arc<JobRegistry>,
    pipeline: Arc<Pipeline>,
    config: Config,
}

impl ScanOrchestrator {
    pub fn new(registry: Arc<JobRegistry>, pipeline: Arc<Pipeline>, config: Config) -> Self {
        Self {
            registry,
            pipeline,
            config,
        }
    }

    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.registry
    }

    /// Start a scan in the background and return its job id.
    pub fn start(self: &Arc<Self>, scope: ScanScope) -> Result<Uuid> {
        let handle = self.registry.try_start(scope.clone())?;
        let id = handle.id();

        let this = self.clone();
        tokio::spawn(async move {
            match this.run(&scope, &handle).await {
                Ok(summary) => handle.complete(summary),
                Err(e) => {
                    tracing::error!("Scan {} failed: {}", handle.id(), e);
                    handle.fail(e.to_string());
                }
            }
        });
        Ok(id)
    }

    /// Walk the folders of `scope` and feed every video through the pipeline.
    async fn run(&self, scope: &ScanScope, handle: &JobHandle) -> Result<ScanSummary> {
        let (roots, restrict) = self.plan(scope)?;
        let mut summary = ScanSummary::default();

        if matches!(scope, ScanScope::Full) || restrict.is_some() {
            handle.progress(0, "reconciling file links");
            summary.reconciled = self.pipeline.reconcile(restrict.as_ref())?;
        }

        let mut files: Vec<(PathBuf, Origin)> = Vec::new();
        for root in &roots {
            if !root.path.is_dir() {
                if root.required {
                    return Err(crate::Error::PathNotFound(root.path.display().to_string()));
                }
                tracing::warn!("Skipping missing folder {:?}", root.path);
                continue;
            }
            let found = scanner::scan_directory(&root.path, &self.config.watcher.extensions)?;
            files.extend(found.videos.into_iter().map(|v| (v.path, root.origin)));
        }
        // A download folder nested in the library is walked twice otherwise
        let mut seen = HashSet::new();
        files.retain(|(path, _)| seen.insert(path.clone()));

        let total = files.len().max(1);
        for (index, (path, origin)) in files.iter().enumerate() {
            handle.progress(
                (index * 100 / total) as u8,
                format!("{}/{} {}", index + 1, files.len(), path.display()),
            );
            let item = self.pipeline.process(path, *origin, restrict.as_ref()).await;
            tracing::debug!("{:?}: {} {}", path, item.outcome, item.reason);
            summary.record(item);
        }

        tracing::info!(
            "Scan finished: {} added, {} proposed, {} skipped, {} quarantined, {} errored",
            summary.added,
            summary.proposed,
            summary.skipped,
            summary.quarantined,
            summary.errored
        );
        Ok(summary)
    }

    fn download_roots(&self) -> Vec<ScanRoot> {
        self.config
            .library
            .download_dirs
            .iter()
            .map(|path| ScanRoot {
                path: path.clone(),
                origin: Origin::Download,
                required: false,
            })
            .collect()
    }

    fn library_root(path: &Path) -> ScanRoot {
        ScanRoot {
            path: path.to_path_buf(),
            origin: Origin::Library,
            required: false,
        }
    }

    /// Folders to walk and the id restriction for `scope`.
    fn plan(&self, scope: &ScanScope) -> Result<(Vec<ScanRoot>, Option<HashSet<Uuid>>)> {
        let library = &self.config.library;
        let store = self.pipeline.store();

        Ok(match scope {
            ScanScope::Full => {
                let mut roots = vec![
                    Self::library_root(&library.tv_root),
                    Self::library_root(&library.movie_root),
                ];
                roots.extend(self.download_roots());
                (roots, None)
            }
            ScanScope::Quick => (self.download_roots(), None),
            ScanScope::OngoingOnly => {
                let shows: Vec<_> = store
                    .list_shows()?
                    .into_iter()
                    .filter(|s| s.tracked && s.ongoing)
                    .collect();
                let roots = shows.iter().map(|s| Self::library_root(&s.root_folder)).collect();
                (roots, Some(shows.iter().map(|s| s.id).collect()))
            }
            ScanScope::SingleShow { show_id } => {
                let show = store.get_show(*show_id)?;
                let mut roots = vec![Self::library_root(&show.root_folder)];
                roots.extend(self.download_roots());
                (roots, Some([show.id].into_iter().collect()))
            }
            ScanScope::SingleFolder { path } => {
                let origin = if library.download_dirs.iter().any(|d| path.starts_with(d)) {
                    Origin::Download
                } else {
                    Origin::Library
                };
                let root = ScanRoot {
                    path: path.clone(),
                    origin,
                    required: true,
                };
                (vec![root], None)
            }
            ScanScope::SelectedItems { ids } => {
                let wanted: HashSet<Uuid> = ids.iter().copied().collect();
                let mut roots: Vec<ScanRoot> = store
                    .list_shows()?
                    .iter()
                    .filter(|s| wanted.contains(&s.id))
                    .map(|s| Self::library_root(&s.root_folder))
                    .collect();
                if store.list_movies()?.iter().any(|m| wanted.contains(&m.id)) {
                    roots.push(Self::library_root(&library.movie_root));
                }
                roots.extend(self.download_roots());
                (roots, Some(wanted))
            }
        })
    }
}
