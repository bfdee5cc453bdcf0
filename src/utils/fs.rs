//! File system utilities.

use crate::utils::hash;
use crate::Result;
use std::fs;
use std::path::{Path, PathBuf};

/// Supported video file extensions.
pub const VIDEO_EXTENSIONS: &[&str] = &[
    "mkv", "mp4", "avi", "mov", "wmv", "m4v", "ts", "m2ts", "flv", "webm", "mpg", "mpeg", "vob",
    "ogv", "divx", "3gp", "mts", "rmvb", "asf", "f4v",
];

/// Check if a path exists and is a directory.
pub fn ensure_directory(path: &Path) -> Result<()> {
    if !path.exists() {
        return Err(crate::Error::PathNotFound(path.display().to_string()));
    }
    if !path.is_dir() {
        return Err(crate::Error::NotADirectory(path.display().to_string()));
    }
    Ok(())
}

/// Get file extension in lowercase.
pub fn get_extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
}

/// Check if an extension (without dot) is a video format.
pub fn is_video_extension(ext: &str) -> bool {
    VIDEO_EXTENSIONS.contains(&ext.to_lowercase().as_str())
}

/// Check if a file is a video file based on extension.
///
/// An empty `extensions` list means the built-in list.
pub fn is_video_file(path: &Path, extensions: &[String]) -> bool {
    match get_extension(path) {
        Some(ext) if extensions.is_empty() => is_video_extension(&ext),
        Some(ext) => extensions.iter().any(|e| e.eq_ignore_ascii_case(&ext)),
        None => false,
    }
}

/// Check if a filename or folder marks a sample clip.
pub fn is_sample(path: &Path) -> bool {
    path.components().any(|c| match c {
        std::path::Component::Normal(name) => {
            let lower = name.to_string_lossy().to_lowercase();
            lower == "sample"
                || lower == "samples"
                || (lower.contains("sample") && !lower.contains("sampler"))
        }
        _ => false,
    })
}

/// First free path of the form `name (n).ext` next to `path`.
pub fn unique_path(path: &Path) -> PathBuf {
    if !path.exists() {
        return path.to_path_buf();
    }

    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let ext = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    let parent = path.parent().unwrap_or_else(|| Path::new("."));

    let mut n = 1;
    loop {
        let candidate = parent.join(format!("{} ({}){}", stem, n, ext));
        if !candidate.exists() {
            return candidate;
        }
        n += 1;
    }
}

/// Temporary sibling used while a cross-filesystem copy is in flight.
fn partial_path(to: &Path) -> PathBuf {
    let mut name = to
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".partial");
    to.with_file_name(name)
}

/// Move a file, never deleting the source before the copy is verified.
///
/// Same-filesystem moves are a single rename. Otherwise the file is copied to
/// a `.partial` sibling, its size (and optionally SHA-256) checked, renamed
/// into place, and only then is the source removed.
pub fn safe_move(from: &Path, to: &Path, verify_checksum: bool) -> Result<()> {
    if !from.is_file() {
        return Err(crate::Error::PathNotFound(from.display().to_string()));
    }
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent)?;
    }

    match fs::rename(from, to) {
        Ok(()) => {
            tracing::debug!("Moved (rename): {:?} -> {:?}", from, to);
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::CrossesDevices => {
            tracing::debug!("Cross-filesystem move detected, using copy+verify+delete");
            copy_verify_delete(from, to, verify_checksum)
        }
        Err(e) => Err(e.into()),
    }
}

/// Cross-filesystem half of [`safe_move`].
pub fn copy_verify_delete(from: &Path, to: &Path, verify_checksum: bool) -> Result<()> {
    let expected = fs::metadata(from)?.len();
    let checksum = if verify_checksum {
        Some(hash::sha256_file(from)?)
    } else {
        None
    };

    let partial = partial_path(to);
    let result = copy_and_verify(from, &partial, expected, checksum.as_deref())
        .and_then(|()| fs::rename(&partial, to).map_err(Into::into));

    if let Err(e) = result {
        // Source is untouched; drop the incomplete copy
        let _ = fs::remove_file(&partial);
        return Err(e);
    }

    fs::remove_file(from)?;
    tracing::debug!("Moved (copy+delete): {:?} -> {:?}", from, to);
    Ok(())
}

fn copy_and_verify(from: &Path, to: &Path, expected: u64, checksum: Option<&str>) -> Result<()> {
    fs::copy(from, to)?;

    let actual = fs::metadata(to)?.len();
    if actual != expected {
        return Err(crate::Error::SizeMismatch {
            path: to.display().to_string(),
            expected,
            actual,
        });
    }

    if let Some(original) = checksum {
        if hash::sha256_file(to)? != original {
            return Err(crate::Error::ChecksumMismatch(to.display().to_string()));
        }
    }
    Ok(())
}
