//! Directory scanner module.
//!
//! Walks library and download folders for candidate video files. Sample
//! clips and files under bonus-material folders are set aside.

use crate::models::media::VideoFile;
use crate::utils::fs::{ensure_directory, is_sample, is_video_file};
use crate::Result;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Folder names holding bonus material rather than episodes or features.
const EXTRAS_DIRS: &[&str] = &[
    "extras",
    "extra",
    "featurettes",
    "featurette",
    "behind the scenes",
    "behindthescenes",
    "deleted scenes",
    "deletedscenes",
    "making of",
    "makingof",
    "bonus",
    "special features",
];

/// Result of scanning a directory.
#[derive(Debug, Default)]
pub struct ScanResult {
    /// Candidate video files, sorted by path.
    pub videos: Vec<VideoFile>,
    /// Sample clips found.
    pub samples: Vec<PathBuf>,
    /// Videos under bonus-material folders.
    pub extras: Vec<PathBuf>,
    pub total_files_scanned: usize,
    pub total_dirs_scanned: usize,
}

/// Check if a file sits below a bonus-material folder such as `Extras`.
fn is_in_extras_directory(path: &Path) -> bool {
    path.components().any(|c| match c {
        std::path::Component::Normal(name) => {
            let name = name.to_string_lossy().to_lowercase();
            EXTRAS_DIRS.contains(&name.as_str())
                || name.ends_with(".extras")
                || name.ends_with("-extras")
                || name.contains(".featurette")
        }
        _ => false,
    })
}

/// Create a VideoFile from a path.
pub fn video_file(path: &Path) -> Result<VideoFile> {
    let metadata = std::fs::metadata(path)?;
    let modified = metadata
        .modified()
        .map(chrono::DateTime::<chrono::Utc>::from)
        .unwrap_or_else(|_| chrono::Utc::now());

    Ok(VideoFile {
        path: path.to_path_buf(),
        filename: path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default(),
        size: metadata.len(),
        modified,
        parent_dir: path
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from(".")),
    })
}

/// Scan a directory tree for video files.
///
/// `extensions` overrides the built-in video extension list when non-empty.
/// Partially written `.partial` files never qualify.
pub fn scan_directory(path: &Path, extensions: &[String]) -> Result<ScanResult> {
    ensure_directory(path)?;

    let mut result = ScanResult::default();

    for entry in WalkDir::new(path)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let entry_path = entry.path();

        if entry.file_type().is_dir() {
            result.total_dirs_scanned += 1;
            continue;
        }
        if !entry.file_type().is_file() {
            continue;
        }
        result.total_files_scanned += 1;

        if !is_video_file(entry_path, extensions) {
            continue;
        }
        // Only judge components below the scan root
        let relative = entry_path.strip_prefix(path).unwrap_or(entry_path);
        if is_in_extras_directory(relative) {
            tracing::debug!("Skipping bonus material: {}", entry_path.display());
            result.extras.push(entry_path.to_path_buf());
            continue;
        }
        if is_sample(relative) {
            tracing::debug!("Skipping sample: {}", entry_path.display());
            result.samples.push(entry_path.to_path_buf());
            continue;
        }

        match video_file(entry_path) {
            Ok(video) => result.videos.push(video),
            Err(e) => tracing::warn!("Failed to read video file {:?}: {}", entry_path, e),
        }
    }

    result.videos.sort_by(|a, b| a.path.cmp(&b.path));
    result.samples.sort();
    result.extras.sort();

    tracing::info!(
        "Scanned {} files in {} directories: {} videos, {} samples, {} extras",
        result.total_files_scanned,
        result.total_dirs_scanned,
        result.videos.len(),
        result.samples.len(),
        result.extras.len()
    );

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_in_extras_directory() {
        assert!(is_in_extras_directory(Path::new("Show/Extras/clip.mkv")));
        assert!(is_in_extras_directory(Path::new("Movie/Behind The Scenes/a.mkv")));
        assert!(is_in_extras_directory(Path::new("The.Movie.Extras/a.mkv")));
        assert!(!is_in_extras_directory(Path::new("Show/Season 01/a.mkv")));
    }
}
