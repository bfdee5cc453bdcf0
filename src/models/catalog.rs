//! Catalog data model: tracked shows, episodes and movies.

use super::media::QualityTokens;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Metadata provider a catalog entry takes its data from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Tmdb,
    Tvmaze,
}

impl ProviderKind {
    /// The other provider.
    pub fn alternate(self) -> Self {
        match self {
            ProviderKind::Tmdb => ProviderKind::Tvmaze,
            ProviderKind::Tvmaze => ProviderKind::Tmdb,
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderKind::Tmdb => write!(f, "tmdb"),
            ProviderKind::Tvmaze => write!(f, "tvmaze"),
        }
    }
}

/// Provider identifiers for a show.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderIds {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tmdb: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tvmaze: Option<u64>,
}

impl ProviderIds {
    pub fn get(&self, kind: ProviderKind) -> Option<u64> {
        match kind {
            ProviderKind::Tmdb => self.tmdb,
            ProviderKind::Tvmaze => self.tvmaze,
        }
    }

    pub fn set(&mut self, kind: ProviderKind, id: u64) {
        match kind {
            ProviderKind::Tmdb => self.tmdb = Some(id),
            ProviderKind::Tvmaze => self.tvmaze = Some(id),
        }
    }
}

/// Naming templates for a show's files.
///
/// Templates use `{var}` or zero-padded `{var:02}` placeholders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamingTemplates {
    /// Season folder, e.g. `Season {season:02}`.
    pub season_folder: String,
    /// Episode file name without extension, e.g. `{show} - S{season:02}E{episode:02} - {title}`.
    pub episode_file: String,
}

impl Default for NamingTemplates {
    fn default() -> Self {
        Self {
            season_folder: "Season {season:02}".to_string(),
            episode_file: "{show} - S{season:02}E{episode:02} - {title}".to_string(),
        }
    }
}

/// A tracked TV show.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogShow {
    pub id: Uuid,
    pub provider_ids: ProviderIds,
    /// Display name.
    pub name: String,
    /// First-air year.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<u16>,
    /// User-added alternate names, used only for matching.
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub naming: NamingTemplates,
    /// Folder holding the show's season folders.
    pub root_folder: PathBuf,
    /// Matched files are renamed without review when set.
    pub rename_enabled: bool,
    /// Provider the episode list currently comes from.
    pub metadata_source: ProviderKind,
    /// Still airing.
    #[serde(default)]
    pub ongoing: bool,
    /// Cleared on removal; files stay on disk.
    pub tracked: bool,
    pub added_at: DateTime<Utc>,
}

impl CatalogShow {
    /// Create a tracked show with default naming.
    pub fn new(name: &str, root_folder: &Path, source: ProviderKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            provider_ids: ProviderIds::default(),
            name: name.to_string(),
            year: None,
            aliases: Vec::new(),
            naming: NamingTemplates::default(),
            root_folder: root_folder.to_path_buf(),
            rename_enabled: true,
            metadata_source: source,
            ongoing: false,
            tracked: true,
            added_at: Utc::now(),
        }
    }

    /// Canonical name followed by every alias.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name.as_str()).chain(self.aliases.iter().map(|a| a.as_str()))
    }

    /// Provider id for the current metadata source.
    pub fn source_id(&self) -> Option<u64> {
        self.provider_ids.get(self.metadata_source)
    }
}

/// Link state of an episode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    Found,
    Missing,
    Renamed,
    NotAired,
    Ignored,
    Special,
}

impl std::fmt::Display for FileStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FileStatus::Found => "found",
            FileStatus::Missing => "missing",
            FileStatus::Renamed => "renamed",
            FileStatus::NotAired => "not_aired",
            FileStatus::Ignored => "ignored",
            FileStatus::Special => "special",
        };
        write!(f, "{}", s)
    }
}

/// An episode owned by exactly one show.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogEpisode {
    pub id: Uuid,
    pub show_id: Uuid,
    pub season: u16,
    pub episode: u16,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub air_date: Option<NaiveDate>,
    /// Linked file, at most one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality: Option<QualityTokens>,
    pub status: FileStatus,
}

impl CatalogEpisode {
    /// Create an unlinked episode; status derives from the air date.
    pub fn new(show_id: Uuid, season: u16, episode: u16, title: &str, air_date: Option<NaiveDate>) -> Self {
        let status = if season == 0 {
            FileStatus::Special
        } else if air_date.map(|d| d > Utc::now().date_naive()).unwrap_or(false) {
            FileStatus::NotAired
        } else {
            FileStatus::Missing
        };

        Self {
            id: Uuid::new_v4(),
            show_id,
            season,
            episode,
            title: title.to_string(),
            air_date,
            file: None,
            file_size: None,
            quality: None,
            status,
        }
    }

    /// Whether the episode should show up in missing-episode reports.
    pub fn counts_as_missing(&self, today: NaiveDate) -> bool {
        match self.status {
            FileStatus::Ignored | FileStatus::Special => false,
            _ => self.file.is_none() && self.air_date.map(|d| d <= today).unwrap_or(true),
        }
    }

    /// Drop the file link and fall back to the unlinked status.
    pub fn unlink(&mut self) {
        self.file = None;
        self.file_size = None;
        self.quality = None;
        if !matches!(self.status, FileStatus::Ignored | FileStatus::Special) {
            self.status = FileStatus::Missing;
        }
    }
}

/// A tracked movie.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogMovie {
    pub id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tmdb_id: Option<u64>,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<u16>,
    #[serde(default)]
    pub aliases: Vec<String>,
    /// Quality of the current file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality: Option<QualityTokens>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,
    pub rename_enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edition: Option<String>,
    pub tracked: bool,
    pub added_at: DateTime<Utc>,
}

impl CatalogMovie {
    pub fn new(title: &str, year: Option<u16>) -> Self {
        Self {
            id: Uuid::new_v4(),
            tmdb_id: None,
            title: title.to_string(),
            year,
            aliases: Vec::new(),
            quality: None,
            file: None,
            file_size: None,
            rename_enabled: true,
            edition: None,
            tracked: true,
            added_at: Utc::now(),
        }
    }

    /// Canonical title followed by every alias.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.title.as_str()).chain(self.aliases.iter().map(|a| a.as_str()))
    }
}

/// Point-in-time copy of the catalog used for matching.
#[derive(Debug, Clone, Default)]
pub struct CatalogSnapshot {
    pub shows: Vec<CatalogShow>,
    pub episodes: Vec<CatalogEpisode>,
    pub movies: Vec<CatalogMovie>,
}

impl CatalogSnapshot {
    /// Episodes belonging to a show.
    pub fn episodes_of(&self, show_id: Uuid) -> impl Iterator<Item = &CatalogEpisode> {
        self.episodes.iter().filter(move |e| e.show_id == show_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_episode_status() {
        let show = Uuid::new_v4();
        let past = NaiveDate::from_ymd_opt(2001, 1, 1);
        let future = NaiveDate::from_ymd_opt(2999, 1, 1);

        assert_eq!(CatalogEpisode::new(show, 1, 1, "Pilot", past).status, FileStatus::Missing);
        assert_eq!(CatalogEpisode::new(show, 1, 2, "Later", future).status, FileStatus::NotAired);
        assert_eq!(CatalogEpisode::new(show, 0, 1, "Special", past).status, FileStatus::Special);
    }

    #[test]
    fn test_ignored_episode_not_missing() {
        let today = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let mut episode =
            CatalogEpisode::new(Uuid::new_v4(), 1, 1, "Pilot", NaiveDate::from_ymd_opt(2020, 1, 1));
        assert!(episode.counts_as_missing(today));

        episode.status = FileStatus::Ignored;
        assert!(!episode.counts_as_missing(today));

        episode.unlink();
        assert_eq!(episode.status, FileStatus::Ignored);
    }

    #[test]
    fn test_provider_ids() {
        let mut ids = ProviderIds::default();
        ids.set(ProviderKind::Tvmaze, 42);
        assert_eq!(ids.get(ProviderKind::Tvmaze), Some(42));
        assert_eq!(ids.get(ProviderKind::Tmdb), None);
        assert_eq!(ProviderKind::Tmdb.alternate(), ProviderKind::Tvmaze);
    }
}
