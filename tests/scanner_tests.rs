//! Integration tests for the scanner module.
//!
//! Tests cover:
//! - Directory scanning with video files
//! - Sample and bonus-material detection
//! - Extension overrides and in-progress copies
//! - Error handling for non-existent paths

use media_ingest::core::scanner::scan_directory;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

#[test]
fn test_scan_empty_directory() {
    let temp_dir = TempDir::new().unwrap();
    let result = scan_directory(temp_dir.path(), &[]).unwrap();

    assert_eq!(result.videos.len(), 0);
    assert_eq!(result.samples.len(), 0);
}

#[test]
fn test_scan_with_video_files() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("Show.S01E01.mkv"), "fake video content").unwrap();

    let result = scan_directory(temp_dir.path(), &[]).unwrap();

    assert_eq!(result.videos.len(), 1);
    assert_eq!(result.videos[0].filename, "Show.S01E01.mkv");
    assert_eq!(result.videos[0].size, 18);
}

#[test]
fn test_scan_sets_samples_aside() {
    let temp_dir = TempDir::new().unwrap();
    let sample_dir = temp_dir.path().join("Sample");
    fs::create_dir(&sample_dir).unwrap();
    fs::write(sample_dir.join("clip.mkv"), "fake sample").unwrap();
    fs::write(temp_dir.path().join("movie-sample.mkv"), "fake sample").unwrap();
    fs::write(temp_dir.path().join("movie.mkv"), "fake video").unwrap();

    let result = scan_directory(temp_dir.path(), &[]).unwrap();

    assert_eq!(result.videos.len(), 1);
    assert_eq!(result.samples.len(), 2);
}

#[test]
fn test_scan_sets_extras_aside() {
    let temp_dir = TempDir::new().unwrap();
    let extras = temp_dir.path().join("Show").join("Extras");
    fs::create_dir_all(&extras).unwrap();
    fs::write(extras.join("interview.mkv"), "fake").unwrap();
    fs::write(temp_dir.path().join("Show").join("Show.S01E01.mkv"), "fake").unwrap();

    let result = scan_directory(temp_dir.path(), &[]).unwrap();

    assert_eq!(result.videos.len(), 1);
    assert_eq!(result.extras.len(), 1);
}

#[test]
fn test_scan_nonexistent_path() {
    let result = scan_directory(Path::new("/nonexistent/path"), &[]);
    assert!(result.is_err());
}

#[test]
fn test_scan_file_is_not_a_directory() {
    let temp_dir = TempDir::new().unwrap();
    let file = temp_dir.path().join("movie.mkv");
    fs::write(&file, "fake").unwrap();

    assert!(matches!(
        scan_directory(&file, &[]),
        Err(media_ingest::Error::NotADirectory(_))
    ));
}

#[test]
fn test_scan_with_multiple_video_types() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("movie1.mkv"), "fake").unwrap();
    fs::write(temp_dir.path().join("movie2.mp4"), "fake").unwrap();
    fs::write(temp_dir.path().join("movie3.avi"), "fake").unwrap();
    fs::write(temp_dir.path().join("document.txt"), "not video").unwrap();
    fs::write(temp_dir.path().join("movie4.mkv.partial"), "copying").unwrap();

    let result = scan_directory(temp_dir.path(), &[]).unwrap();

    assert_eq!(result.videos.len(), 3);
    assert_eq!(result.total_files_scanned, 5);
}

#[test]
fn test_scan_extension_override() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("a.mkv"), "fake").unwrap();
    fs::write(temp_dir.path().join("b.mp4"), "fake").unwrap();

    let result = scan_directory(temp_dir.path(), &["MKV".to_string()]).unwrap();

    assert_eq!(result.videos.len(), 1);
    assert_eq!(result.videos[0].filename, "a.mkv");
}

#[test]
fn test_scan_nested_directories() {
    let temp_dir = TempDir::new().unwrap();
    let nested = temp_dir.path().join("Season 01").join("Episode 01");
    fs::create_dir_all(&nested).unwrap();
    fs::write(nested.join("video.mkv"), "fake").unwrap();

    let result = scan_directory(temp_dir.path(), &[]).unwrap();

    assert_eq!(result.videos.len(), 1);
}
