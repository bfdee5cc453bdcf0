//! TVmaze API client (secondary metadata provider, keyless).

use crate::models::catalog::ProviderKind;
use crate::services::provider::{ExternalIds, MetadataProvider, ProviderEpisode, SearchCandidate};
use crate::services::tmdb::{parse_date, parse_year};
use crate::Result;
use async_trait::async_trait;
use serde::Deserialize;

const TVMAZE_BASE_URL: &str = "https://api.tvmaze.com";

/// TVmaze API client.
pub struct TvmazeClient {
    base_url: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    show: Show,
}

#[derive(Debug, Deserialize)]
struct Show {
    id: u64,
    name: String,
    premiered: Option<String>,
    #[serde(default)]
    externals: Externals,
}

#[derive(Debug, Default, Deserialize)]
struct Externals {
    thetvdb: Option<u64>,
    imdb: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Episode {
    name: Option<String>,
    season: u16,
    /// Null for specials.
    number: Option<u16>,
    airdate: Option<String>,
}

impl TvmazeClient {
    pub fn new() -> Self {
        Self::with_base_url(TVMAZE_BASE_URL)
    }

    pub fn with_base_url(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}/{}", self.base_url, path);
        let resp = self.client.get(&url).send().await?.error_for_status()?;
        Ok(resp.json().await?)
    }

    /// `lookup/shows` answers 404 when nothing matches.
    async fn lookup(&self, query: &str) -> Result<Option<u64>> {
        let url = format!("{}/lookup/shows?{}", self.base_url, query);
        let resp = self.client.get(&url).send().await?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let show: Show = resp.error_for_status()?.json().await?;
        Ok(Some(show.id))
    }
}

impl Default for TvmazeClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Specials have no episode number; number them in air order within season 0.
fn convert_episodes(episodes: Vec<Episode>) -> Vec<ProviderEpisode> {
    let mut next_special = 1;
    episodes
        .into_iter()
        .map(|e| {
            let (season, episode) = match e.number {
                Some(n) => (e.season, n),
                None => {
                    let n = next_special;
                    next_special += 1;
                    (0, n)
                }
            };
            ProviderEpisode {
                season,
                episode,
                title: e.name.unwrap_or_default(),
                air_date: parse_date(e.airdate.as_deref()),
            }
        })
        .collect()
}

#[async_trait]
impl MetadataProvider for TvmazeClient {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Tvmaze
    }

    async fn search_by_title(&self, title: &str, year: Option<u16>) -> Result<Vec<SearchCandidate>> {
        let hits: Vec<SearchHit> = self
            .get_json(&format!("search/shows?q={}", urlencoding::encode(title)))
            .await?;

        Ok(hits
            .into_iter()
            .map(|hit| SearchCandidate {
                provider: ProviderKind::Tvmaze,
                id: hit.show.id,
                year: parse_year(hit.show.premiered.as_deref()),
                name: hit.show.name,
            })
            // TVmaze has no year filter; apply it loosely here
            .filter(|c| match (year, c.year) {
                (Some(wanted), Some(got)) => wanted.abs_diff(got) <= 1,
                _ => true,
            })
            .collect())
    }

    async fn get_episodes(&self, show_id: u64) -> Result<Vec<ProviderEpisode>> {
        let episodes: Vec<Episode> = self
            .get_json(&format!("shows/{}/episodes?specials=1", show_id))
            .await?;
        tracing::debug!("TVmaze show {} has {} episodes", show_id, episodes.len());
        Ok(convert_episodes(episodes))
    }

    async fn get_external_ids(&self, show_id: u64) -> Result<ExternalIds> {
        let show: Show = self.get_json(&format!("shows/{}", show_id)).await?;
        Ok(ExternalIds {
            tmdb: None,
            tvmaze: Some(show.id),
            imdb: show.externals.imdb,
            tvdb: show.externals.thetvdb,
        })
    }

    async fn lookup_by_external(&self, ids: &ExternalIds) -> Result<Option<u64>> {
        if let Some(id) = ids.tvmaze {
            return Ok(Some(id));
        }
        if let Some(ref imdb) = ids.imdb {
            if let Some(id) = self.lookup(&format!("imdb={}", urlencoding::encode(imdb))).await? {
                return Ok(Some(id));
            }
        }
        if let Some(tvdb) = ids.tvdb {
            return self.lookup(&format!("thetvdb={}", tvdb)).await;
        }
        Ok(None)
    }
}
