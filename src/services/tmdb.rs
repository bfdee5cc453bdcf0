//! TMDB API client (primary metadata provider).

use crate::models::catalog::ProviderKind;
use crate::services::provider::{ExternalIds, MetadataProvider, ProviderEpisode, SearchCandidate};
use crate::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;

const TMDB_BASE_URL: &str = "https://api.themoviedb.org/3";

/// TMDB client configuration.
#[derive(Debug, Clone)]
pub struct TmdbConfig {
    /// API key or Bearer token (JWT)
    pub api_key: String,
    pub language: String,
    /// Whether to use Bearer token authentication (API v4 style)
    pub use_bearer: bool,
}

impl TmdbConfig {
    /// Create config from a key; bearer tokens are detected by their JWT prefix.
    pub fn new(api_key: String, language: &str) -> Self {
        // Bearer tokens start with "eyJ" (base64 encoded JWT header)
        let use_bearer = api_key.starts_with("eyJ");
        Self {
            api_key,
            language: language.to_string(),
            use_bearer,
        }
    }

    /// Create config from the application configuration.
    pub fn from_config(config: &crate::models::config::Config) -> Result<Self> {
        let api_key = config
            .tmdb_api_key()
            .ok_or(crate::Error::TmdbApiKeyMissing)?;
        Ok(Self::new(api_key, &config.providers.language))
    }
}

/// TMDB API client.
pub struct TmdbClient {
    config: TmdbConfig,
    client: reqwest::Client,
}

/// TV show search result.
#[derive(Debug, Deserialize)]
struct TvSearchResult {
    results: Vec<TvSearchItem>,
}

/// TV show search item.
#[derive(Debug, Deserialize)]
struct TvSearchItem {
    id: u64,
    name: String,
    first_air_date: Option<String>,
}

/// The parts of TV show details the episode walk needs.
#[derive(Debug, Deserialize)]
struct TvDetails {
    #[serde(default)]
    seasons: Vec<SeasonSummary>,
}

#[derive(Debug, Deserialize)]
struct SeasonSummary {
    season_number: u16,
}

/// External IDs for a TV show.
#[derive(Debug, Deserialize)]
struct TmdbExternalIds {
    imdb_id: Option<String>,
    tvdb_id: Option<u64>,
}

/// Season details.
#[derive(Debug, Deserialize)]
struct SeasonDetails {
    episodes: Vec<EpisodeInfo>,
}

/// Episode info within a season.
#[derive(Debug, Deserialize)]
struct EpisodeInfo {
    name: String,
    episode_number: u16,
    season_number: u16,
    air_date: Option<String>,
}

/// `find` endpoint result.
#[derive(Debug, Deserialize)]
struct FindResult {
    #[serde(default)]
    tv_results: Vec<FindItem>,
}

#[derive(Debug, Deserialize)]
struct FindItem {
    id: u64,
}

/// Parse a `YYYY-MM-DD` date, tolerating empty strings.
pub(crate) fn parse_date(value: Option<&str>) -> Option<NaiveDate> {
    value
        .filter(|v| !v.is_empty())
        .and_then(|v| NaiveDate::parse_from_str(v, "%Y-%m-%d").ok())
}

/// Year of a `YYYY-MM-DD` date.
pub(crate) fn parse_year(value: Option<&str>) -> Option<u16> {
    value
        .and_then(|v| v.get(..4))
        .and_then(|y| y.parse().ok())
}

impl TmdbClient {
    /// Create a new TMDB client.
    pub fn new(config: TmdbConfig) -> Self {
        let client = reqwest::Client::new();
        Self { config, client }
    }

    /// Build a request with proper authentication.
    fn build_request(&self, url: &str) -> reqwest::RequestBuilder {
        let request = self.client.get(url);
        if self.config.use_bearer {
            request.header("Authorization", format!("Bearer {}", self.config.api_key))
        } else {
            request
        }
    }

    /// Build URL with optional api_key parameter (only for v3 style).
    fn build_url(&self, path: &str, extra_params: &str) -> String {
        if self.config.use_bearer {
            format!(
                "{}/{}?language={}{}",
                TMDB_BASE_URL, path, self.config.language, extra_params
            )
        } else {
            format!(
                "{}/{}?api_key={}&language={}{}",
                TMDB_BASE_URL, path, self.config.api_key, self.config.language, extra_params
            )
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T> {
        let resp = self.build_request(url).send().await?.error_for_status()?;
        Ok(resp.json().await?)
    }

    /// Search for TV shows.
    async fn search_tv(&self, query: &str, year: Option<u16>) -> Result<Vec<TvSearchItem>> {
        let year_param = year
            .map(|y| format!("&first_air_date_year={}", y))
            .unwrap_or_default();
        let url = self.build_url(
            "search/tv",
            &format!("&query={}{}", urlencoding::encode(query), year_param),
        );

        let resp: TvSearchResult = self.get_json(&url).await?;
        Ok(resp.results)
    }

    /// Get season details.
    async fn get_season_details(&self, tv_id: u64, season_number: u16) -> Result<SeasonDetails> {
        let url = self.build_url(&format!("tv/{}/season/{}", tv_id, season_number), "");
        self.get_json(&url).await
    }
}

#[async_trait]
impl MetadataProvider for TmdbClient {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Tmdb
    }

    async fn search_by_title(&self, title: &str, year: Option<u16>) -> Result<Vec<SearchCandidate>> {
        let items = self.search_tv(title, year).await?;
        Ok(items
            .into_iter()
            .map(|item| SearchCandidate {
                provider: ProviderKind::Tmdb,
                id: item.id,
                year: parse_year(item.first_air_date.as_deref()),
                name: item.name,
            })
            .collect())
    }

    async fn get_episodes(&self, show_id: u64) -> Result<Vec<ProviderEpisode>> {
        let details: TvDetails = self.get_json(&self.build_url(&format!("tv/{}", show_id), "")).await?;

        let mut episodes = Vec::new();
        for season in details.seasons {
            let season = self.get_season_details(show_id, season.season_number).await?;
            episodes.extend(season.episodes.into_iter().map(|e| ProviderEpisode {
                season: e.season_number,
                episode: e.episode_number,
                air_date: parse_date(e.air_date.as_deref()),
                title: e.name,
            }));
        }

        tracing::debug!("TMDB show {} has {} episodes", show_id, episodes.len());
        Ok(episodes)
    }

    async fn get_external_ids(&self, show_id: u64) -> Result<ExternalIds> {
        let url = self.build_url(&format!("tv/{}/external_ids", show_id), "");
        let ids: TmdbExternalIds = self.get_json(&url).await?;
        Ok(ExternalIds {
            tmdb: Some(show_id),
            tvmaze: None,
            imdb: ids.imdb_id.filter(|s| !s.is_empty()),
            tvdb: ids.tvdb_id,
        })
    }

    async fn lookup_by_external(&self, ids: &ExternalIds) -> Result<Option<u64>> {
        if let Some(id) = ids.tmdb {
            return Ok(Some(id));
        }

        let lookups = [
            ids.imdb.clone().map(|v| (v, "imdb_id")),
            ids.tvdb.map(|v| (v.to_string(), "tvdb_id")),
        ];
        for (value, source) in lookups.into_iter().flatten() {
            let url = self.build_url(
                &format!("find/{}", urlencoding::encode(&value)),
                &format!("&external_source={}", source),
            );
            let found: FindResult = self.get_json(&url).await?;
            if let Some(item) = found.tv_results.first() {
                return Ok(Some(item.id));
            }
        }
        Ok(None)
    }
}
