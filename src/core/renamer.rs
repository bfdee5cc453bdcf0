//! Renamer/mover.
//!
//! Executes an approved action: resolves the destination from the target's
//! naming templates, moves the file without ever deleting the source before
//! the copy is verified, and commits the new file link to the catalog.

use crate::core::quality;
use crate::generators::filename::NamingContext;
use crate::models::action::{ActionKind, ActionTarget, PendingAction};
use crate::models::activity::{ActivityEntry, ActivityKind};
use crate::models::catalog::FileStatus;
use crate::models::config::{Config, NamingConfig, RenamerConfig};
use crate::store::{CatalogStore, FileLink};
use crate::utils::fs::{safe_move, unique_path};
use crate::Result;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Filesystem half of an apply; runs on a blocking thread.
#[derive(Debug, Clone)]
struct MovePlan {
    source: PathBuf,
    destination: PathBuf,
    /// File the incoming one supersedes (replace actions only).
    replaced: Option<PathBuf>,
    verify_checksum: bool,
    keep_replaced: bool,
}

/// Backup name for a file being replaced: `name.ext.replaced`.
fn backup_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".replaced");
    unique_path(&path.with_file_name(name))
}

fn execute_move(plan: &MovePlan) -> Result<u64> {
    if !plan.source.is_file() {
        return Err(crate::Error::PathNotFound(plan.source.display().to_string()));
    }
    if plan.destination == plan.source {
        return Ok(fs::metadata(&plan.source)?.len());
    }

    let replaced = plan.replaced.as_ref().filter(|p| p.is_file() && **p != plan.source);
    if plan.destination.exists() && replaced != Some(&plan.destination) {
        return Err(crate::Error::FilesystemConflict(format!(
            "{} already exists",
            plan.destination.display()
        )));
    }

    // Move the superseded file aside first so it can be restored
    let backup = match replaced {
        Some(old) => {
            let backup = backup_path(old);
            fs::rename(old, &backup)?;
            tracing::debug!("Backed up {:?} -> {:?}", old, backup);
            Some((old.clone(), backup))
        }
        None => None,
    };

    if let Err(e) = safe_move(&plan.source, &plan.destination, plan.verify_checksum) {
        if let Some((old, backup)) = backup {
            if let Err(restore) = fs::rename(&backup, &old) {
                tracing::error!("Failed to restore {:?} from {:?}: {}", old, backup, restore);
            }
        }
        return Err(e);
    }

    if let Some((_, backup)) = backup {
        if plan.keep_replaced {
            tracing::info!("Kept replaced file at {:?}", backup);
        } else if let Err(e) = fs::remove_file(&backup) {
            tracing::warn!("Failed to remove replaced file {:?}: {}", backup, e);
        }
    }

    Ok(fs::metadata(&plan.destination)?.len())
}

/// Applies actions and updates catalog links.
pub struct Renamer {
    store: Arc<dyn CatalogStore>,
    naming: NamingConfig,
    movie_root: PathBuf,
    options: RenamerConfig,
}

impl Renamer {
    pub fn new(store: Arc<dyn CatalogStore>, config: &Config) -> Self {
        Self {
            store,
            naming: config.naming.clone(),
            movie_root: config.library.movie_root.clone(),
            options: config.renamer.clone(),
        }
    }

    /// Where the file of `target` belongs, keeping the source extension.
    pub fn destination(&self, target: &ActionTarget, source: &Path) -> Result<PathBuf> {
        let ext = source
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();

        match target {
            ActionTarget::Episode { show_id, episode_ids } => {
                let show = self.store.get_show(*show_id)?;
                let episodes = episode_ids
                    .iter()
                    .map(|id| self.store.get_episode(*id))
                    .collect::<Result<Vec<_>>>()?;
                let refs: Vec<_> = episodes.iter().collect();
                let ctx = NamingContext::for_episodes(&show, &refs);

                Ok(show
                    .root_folder
                    .join(ctx.render(&show.naming.season_folder)?)
                    .join(format!("{}{}", ctx.render(&show.naming.episode_file)?, ext)))
            }
            ActionTarget::Movie { movie_id } => {
                let movie = self.store.get_movie(*movie_id)?;
                let ctx = NamingContext::for_movie(&movie);
                Ok(self
                    .movie_root
                    .join(ctx.render(&self.naming.movie_folder)?)
                    .join(format!("{}{}", ctx.render(&self.naming.movie_file)?, ext)))
            }
        }
    }

    /// File currently linked to `target`, if any.
    fn current_file(&self, target: &ActionTarget) -> Result<Option<PathBuf>> {
        match target {
            ActionTarget::Episode { episode_ids, .. } => {
                for id in episode_ids {
                    if let Some(file) = self.store.get_episode(*id)?.file {
                        return Ok(Some(file));
                    }
                }
                Ok(None)
            }
            ActionTarget::Movie { movie_id } => Ok(self.store.get_movie(*movie_id)?.file),
        }
    }

    /// Move the file and commit the link; returns the new path.
    ///
    /// On error the source is left in place and nothing is committed. A
    /// failed commit after the move puts the file back where it was.
    pub async fn apply(&self, action: &PendingAction) -> Result<PathBuf> {
        // Resolved against the catalog as it is now; fails before any move
        // when a target entity is gone
        let destination = self.destination(&action.target, &action.source)?;
        if let Some(ref proposed) = action.destination {
            if *proposed != destination {
                tracing::debug!("Destination of {} moved from {:?} to {:?}", action.id, proposed, destination);
            }
        }
        let replaced = if action.kind == ActionKind::Replace {
            self.current_file(&action.target)?
        } else {
            None
        };

        let plan = MovePlan {
            source: action.source.clone(),
            destination: destination.clone(),
            replaced,
            verify_checksum: self.options.verify_checksum,
            keep_replaced: self.options.keep_replaced,
        };
        let size = tokio::task::spawn_blocking(move || execute_move(&plan))
            .await
            .map_err(|e| crate::Error::other(format!("move task failed: {}", e)))??;

        let stem = action
            .source
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        let link = FileLink {
            path: destination.clone(),
            size,
            quality: quality::parse_tokens(&stem),
            status: if destination == action.source {
                FileStatus::Found
            } else {
                FileStatus::Renamed
            },
        };
        let kind = match action.kind {
            ActionKind::Import => ActivityKind::Import,
            ActionKind::Rename => ActivityKind::Rename,
            ActionKind::Replace => ActivityKind::Replace,
        };
        let entry = ActivityEntry::new(
            kind,
            destination.clone(),
            Some(format!("from {}", action.source.display())),
        );

        if let Err(e) = self.store.commit_apply(action.clone(), &link, entry) {
            tracing::error!(
                "Moved {:?} to {:?} but the catalog update failed: {}",
                action.source,
                destination,
                e
            );
            if destination != action.source {
                let (from, to, verify) = (destination.clone(), action.source.clone(), self.options.verify_checksum);
                match tokio::task::spawn_blocking(move || safe_move(&from, &to, verify)).await {
                    Ok(Ok(())) => tracing::info!("Moved {:?} back to {:?}", destination, action.source),
                    Ok(Err(undo)) => tracing::error!("Failed to move {:?} back: {}", destination, undo),
                    Err(join) => tracing::error!("Move-back task for {:?} failed: {}", destination, join),
                }
            }
            return Err(e);
        }

        tracing::info!("{} {:?} -> {:?}", action.kind, action.source, destination);
        Ok(destination)
    }
}
