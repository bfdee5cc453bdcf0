//! Issues quarantine.
//!
//! Files the pipeline cannot classify or match are moved under
//! `<quarantine_root>/YYYY/MM/DD/`. Quarantine is terminal: nothing here
//! retries, a file only re-enters the pipeline through a manual re-scan.

use crate::models::activity::{ActivityEntry, ActivityKind};
use crate::models::config::Config;
use crate::models::quarantine::{QuarantineReason, QuarantinedFile};
use crate::store::CatalogStore;
use crate::utils::fs::{safe_move, unique_path};
use crate::Result;
use chrono::{NaiveDate, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Per-file outcome of `clear_all`.
#[derive(Debug, Default, Serialize)]
pub struct ClearReport {
    pub removed: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, String)>,
}

pub struct Quarantine {
    store: Arc<dyn CatalogStore>,
    root: PathBuf,
    verify_checksum: bool,
}

impl Quarantine {
    pub fn new(store: Arc<dyn CatalogStore>, config: &Config) -> Self {
        Self {
            store,
            root: config.library.quarantine_root.clone(),
            verify_checksum: config.renamer.verify_checksum,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Move `path` into the quarantine root and index it.
    pub async fn quarantine(
        &self,
        path: &Path,
        reason: QuarantineReason,
        detail: Option<String>,
    ) -> Result<QuarantinedFile> {
        let now = Utc::now();
        let filename = path
            .file_name()
            .ok_or_else(|| crate::Error::other(format!("not a file path: {}", path.display())))?;
        let folder = self.root.join(now.format("%Y/%m/%d").to_string());

        let source = path.to_path_buf();
        let verify = self.verify_checksum;
        let target = folder.join(filename);
        let destination = tokio::task::spawn_blocking(move || -> Result<PathBuf> {
            std::fs::create_dir_all(&folder)?;
            let destination = unique_path(&target);
            safe_move(&source, &destination, verify)?;
            Ok(destination)
        })
        .await
        .map_err(|e| crate::Error::other(format!("quarantine task failed: {}", e)))??;

        let file = QuarantinedFile {
            path: destination.clone(),
            original_path: path.to_path_buf(),
            arrived_at: now,
            reason,
            detail: detail.clone(),
            label: path
                .parent()
                .and_then(|p| p.file_name())
                .map(|n| n.to_string_lossy().to_string()),
        };
        self.store.add_quarantined(file.clone())?;
        self.store.append_activity(ActivityEntry::new(
            ActivityKind::Quarantine,
            destination,
            Some(format!("{}{}", reason, detail.map(|d| format!(": {}", d)).unwrap_or_default())),
        ))?;

        tracing::warn!("Quarantined {:?} ({})", path, reason);
        Ok(file)
    }

    /// Every quarantined file, newest first.
    pub fn list(&self) -> Result<Vec<QuarantinedFile>> {
        self.store.list_quarantined()
    }

    /// Files grouped by the day they were moved.
    pub fn list_grouped(&self) -> Result<BTreeMap<NaiveDate, Vec<QuarantinedFile>>> {
        let mut groups: BTreeMap<NaiveDate, Vec<QuarantinedFile>> = BTreeMap::new();
        for file in self.list()? {
            groups.entry(file.arrived_at.date_naive()).or_default().push(file);
        }
        Ok(groups)
    }

    /// Delete a quarantined file from disk and from the index.
    pub fn delete(&self, path: &Path) -> Result<()> {
        // Fail before touching disk if the path is not ours
        if !self.list()?.iter().any(|q| q.path == path) {
            return Err(crate::Error::NotFound(format!("quarantined file {}", path.display())));
        }

        match std::fs::remove_file(path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("{:?} already gone from disk", path);
            }
            Err(e) => return Err(e.into()),
        }
        self.store.remove_quarantined(path)?;
        tracing::info!("Deleted quarantined file {:?}", path);
        Ok(())
    }

    /// Delete every quarantined file; each failure is reported separately.
    pub fn clear_all(&self) -> Result<ClearReport> {
        let mut report = ClearReport::default();
        for file in self.list()? {
            match self.delete(&file.path) {
                Ok(()) => report.removed.push(file.path),
                Err(e) => report.failed.push((file.path, e.to_string())),
            }
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::JsonCatalogStore;

    fn setup() -> (tempfile::TempDir, Quarantine) {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.library.quarantine_root = dir.path().join("issues");
        let store: Arc<dyn CatalogStore> = Arc::new(JsonCatalogStore::in_memory());
        (dir, Quarantine::new(store, &config))
    }

    #[tokio::test]
    async fn test_quarantine_moves_into_dated_folder() {
        let (dir, quarantine) = setup();
        let source = dir.path().join("downloads/holiday.mkv");
        std::fs::create_dir_all(source.parent().unwrap()).unwrap();
        std::fs::write(&source, b"x").unwrap();

        let file = quarantine
            .quarantine(&source, QuarantineReason::Unparsed, None)
            .await
            .unwrap();

        assert!(!source.exists());
        assert!(file.path.exists());
        assert!(file.path.starts_with(quarantine.root()));
        assert_eq!(file.path.parent().unwrap().components().count(), quarantine.root().components().count() + 3);
        assert_eq!(file.label.as_deref(), Some("downloads"));
        assert_eq!(quarantine.list().unwrap().len(), 1);
        assert_eq!(quarantine.list_grouped().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_name_collision_gets_suffix() {
        let (dir, quarantine) = setup();
        let mut paths = Vec::new();
        for sub in ["a", "b"] {
            let source = dir.path().join(sub).join("same.mkv");
            std::fs::create_dir_all(source.parent().unwrap()).unwrap();
            std::fs::write(&source, b"x").unwrap();
            paths.push(
                quarantine
                    .quarantine(&source, QuarantineReason::NoCatalogMatch, None)
                    .await
                    .unwrap()
                    .path,
            );
        }
        assert_ne!(paths[0], paths[1]);
        assert!(paths[1].to_string_lossy().ends_with("same (1).mkv"));
    }

    #[tokio::test]
    async fn test_delete_and_clear() {
        let (dir, quarantine) = setup();
        for name in ["one.mkv", "two.mkv"] {
            let source = dir.path().join(name);
            std::fs::write(&source, b"x").unwrap();
            quarantine
                .quarantine(&source, QuarantineReason::Unparsed, None)
                .await
                .unwrap();
        }

        let first = quarantine.list().unwrap()[0].path.clone();
        quarantine.delete(&first).unwrap();
        assert!(!first.exists());
        assert!(quarantine.delete(&first).is_err());

        let report = quarantine.clear_all().unwrap();
        assert_eq!(report.removed.len(), 1);
        assert!(report.failed.is_empty());
        assert!(quarantine.list().unwrap().is_empty());
    }
}
