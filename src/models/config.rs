//! Configuration model.

use super::catalog::NamingTemplates;
use super::media::Source;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Minimum score a provider candidate needs during folder discovery.
pub const DEFAULT_MIN_DISCOVERY_SCORE: f64 = 0.5;

/// Weight of title similarity in a discovery score.
pub const DEFAULT_TITLE_WEIGHT: f64 = 0.8;

/// Source tiers from worst to best.
pub const DEFAULT_SOURCE_ORDER: &[Source] = &[
    Source::Unknown,
    Source::Cam,
    Source::Tv,
    Source::Dvd,
    Source::Web,
    Source::Bluray,
    Source::Remux,
];

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub library: LibraryConfig,
    pub naming: NamingConfig,
    pub matching: MatchingConfig,
    pub quality: QualityConfig,
    pub renamer: RenamerConfig,
    pub watcher: WatcherConfig,
    pub providers: ProvidersConfig,
}

/// Library locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    /// Folder holding one subfolder per show.
    pub tv_root: PathBuf,
    /// Folder holding one subfolder per movie.
    pub movie_root: PathBuf,
    /// Folders new downloads arrive in.
    pub download_dirs: Vec<PathBuf>,
    /// Where unparsed/unmatched downloads are moved.
    pub quarantine_root: PathBuf,
    /// Where the catalog file lives.
    pub data_dir: PathBuf,
}

/// Naming templates.
///
/// The show templates seed newly added shows; each show keeps its own copy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NamingConfig {
    pub season_folder: String,
    pub episode_file: String,
    pub movie_folder: String,
    pub movie_file: String,
}

/// Matching policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    pub min_discovery_score: f64,
    pub title_weight: f64,
}

/// Quality arbitration policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityConfig {
    /// Source tiers from worst to best; unlisted sources rank lowest.
    pub source_order: Vec<Source>,
    /// Prefer the larger file when tiers tie.
    pub prefer_larger: bool,
}

/// Renamer behaviour.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RenamerConfig {
    /// Checksum cross-filesystem copies in addition to the size check.
    pub verify_checksum: bool,
    /// Keep the replaced file next to its successor as `*.replaced`.
    pub keep_replaced: bool,
}

/// Filesystem watcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatcherConfig {
    /// Seconds a file's size and mtime must stay unchanged.
    pub settle_secs: u64,
    /// How often pending files are re-checked.
    pub poll_secs: u64,
    pub workers: usize,
    pub channel_capacity: usize,
    /// Empty means the built-in video extension list.
    pub extensions: Vec<String>,
}

/// Metadata providers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub tmdb_api_key: Option<String>,
    pub language: String,
    pub timeout_secs: u64,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        let data_dir = dirs_data_path();
        Self {
            tv_root: PathBuf::from("TV"),
            movie_root: PathBuf::from("Movies"),
            download_dirs: Vec::new(),
            quarantine_root: data_dir.join("issues"),
            data_dir,
        }
    }
}

impl Default for NamingConfig {
    fn default() -> Self {
        let show = NamingTemplates::default();
        Self {
            season_folder: show.season_folder,
            episode_file: show.episode_file,
            movie_folder: "{title} ({year})".to_string(),
            movie_file: "{title} ({year})".to_string(),
        }
    }
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            min_discovery_score: DEFAULT_MIN_DISCOVERY_SCORE,
            title_weight: DEFAULT_TITLE_WEIGHT,
        }
    }
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            source_order: DEFAULT_SOURCE_ORDER.to_vec(),
            prefer_larger: true,
        }
    }
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            settle_secs: 30,
            poll_secs: 5,
            workers: 2,
            channel_capacity: 100,
            extensions: Vec::new(),
        }
    }
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            tmdb_api_key: None,
            language: "en-US".to_string(),
            timeout_secs: 15,
        }
    }
}

impl NamingConfig {
    /// Templates for a newly added show.
    pub fn show_templates(&self) -> NamingTemplates {
        NamingTemplates {
            season_folder: self.season_folder.clone(),
            episode_file: self.episode_file.clone(),
        }
    }
}

impl Config {
    /// TMDB key from the environment, then from the file.
    pub fn tmdb_api_key(&self) -> Option<String> {
        std::env::var("TMDB_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| self.providers.tmdb_api_key.clone())
    }

    /// Reject settings that would break matching or the watcher.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.matching.min_discovery_score) {
            return Err(crate::Error::Config(format!(
                "matching.min_discovery_score must be within 0..=1, got {}",
                self.matching.min_discovery_score
            )));
        }
        if !(0.0..=1.0).contains(&self.matching.title_weight) {
            return Err(crate::Error::Config(format!(
                "matching.title_weight must be within 0..=1, got {}",
                self.matching.title_weight
            )));
        }
        if self.watcher.workers == 0 || self.watcher.channel_capacity == 0 {
            return Err(crate::Error::Config(
                "watcher.workers and watcher.channel_capacity must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Get the configuration directory path.
fn dirs_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("media_ingest")
}

/// Get the data directory path.
fn dirs_data_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("media_ingest")
}

/// Default location of the config file.
pub fn default_config_path() -> PathBuf {
    dirs_config_path().join("config.toml")
}

/// Load configuration from file; a missing file yields the defaults.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let config_path = path
        .map(Path::to_path_buf)
        .unwrap_or_else(default_config_path);

    if !config_path.exists() {
        if path.is_some() {
            return Err(crate::Error::PathNotFound(config_path.display().to_string()));
        }
        tracing::debug!("No config at {:?}, using defaults", config_path);
        return Ok(Config::default());
    }

    let content = std::fs::read_to_string(&config_path)?;
    let config: Config = toml::from_str(&content)?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.matching.min_discovery_score, 0.5);
        assert_eq!(config.quality.source_order.last(), Some(&Source::Remux));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_overrides() {
        let config: Config = toml::from_str(
            r#"
            [matching]
            min_discovery_score = 0.65

            [quality]
            source_order = ["unknown", "cam", "web", "remux"]
            "#,
        )
        .unwrap();

        assert_eq!(config.matching.min_discovery_score, 0.65);
        assert_eq!(config.matching.title_weight, DEFAULT_TITLE_WEIGHT);
        assert_eq!(config.quality.source_order.len(), 4);
        assert_eq!(config.watcher.settle_secs, 30);
    }

    #[test]
    fn test_validate_rejects_bad_threshold() {
        let mut config = Config::default();
        config.matching.min_discovery_score = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_missing_explicit_path() {
        let result = load_config(Some(Path::new("/nonexistent/config.toml")));
        assert!(result.is_err());
    }
}
