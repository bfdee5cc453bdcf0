//! Metadata provider capability.
//!
//! The pipeline only needs three things from a provider: title search, an
//! episode list, and cross-reference ids. Every call goes through
//! [`call_with_timeout`] so a slow or broken provider surfaces as
//! [`Error::ProviderUnavailable`](crate::Error::ProviderUnavailable).

use crate::models::catalog::ProviderKind;
use crate::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// One show returned by a title search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchCandidate {
    pub provider: ProviderKind,
    pub id: u64,
    pub name: String,
    pub year: Option<u16>,
}

/// One episode of a provider's episode list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderEpisode {
    pub season: u16,
    pub episode: u16,
    pub title: String,
    pub air_date: Option<NaiveDate>,
}

/// Cross-reference ids known for a show.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalIds {
    pub tmdb: Option<u64>,
    pub tvmaze: Option<u64>,
    pub imdb: Option<String>,
    pub tvdb: Option<u64>,
}

impl ExternalIds {
    pub fn is_empty(&self) -> bool {
        self.tmdb.is_none() && self.tvmaze.is_none() && self.imdb.is_none() && self.tvdb.is_none()
    }
}

/// A remote TV metadata source.
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Search shows by title, optionally narrowed by first-air year.
    async fn search_by_title(&self, title: &str, year: Option<u16>) -> Result<Vec<SearchCandidate>>;

    /// Full episode list of a show, specials included.
    async fn get_episodes(&self, show_id: u64) -> Result<Vec<ProviderEpisode>>;

    /// Ids other databases use for the show.
    async fn get_external_ids(&self, show_id: u64) -> Result<ExternalIds>;

    /// Resolve this provider's own id from cross-reference ids.
    async fn lookup_by_external(&self, ids: &ExternalIds) -> Result<Option<u64>>;
}

/// Run a provider call with a deadline; every failure becomes `ProviderUnavailable`.
pub async fn call_with_timeout<T, F>(provider: ProviderKind, timeout: Duration, call: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(crate::Error::ProviderUnavailable(msg))) => Err(crate::Error::ProviderUnavailable(msg)),
        Ok(Err(e)) => Err(crate::Error::ProviderUnavailable(format!("{}: {}", provider, e))),
        Err(_) => Err(crate::Error::ProviderUnavailable(format!(
            "{}: no response within {:?}",
            provider, timeout
        ))),
    }
}

/// The configured providers.
#[derive(Clone)]
pub struct Providers {
    pub primary: Arc<dyn MetadataProvider>,
    pub secondary: Option<Arc<dyn MetadataProvider>>,
    pub timeout: Duration,
}

impl Providers {
    pub fn new(
        primary: Arc<dyn MetadataProvider>,
        secondary: Option<Arc<dyn MetadataProvider>>,
        timeout: Duration,
    ) -> Self {
        Self {
            primary,
            secondary,
            timeout,
        }
    }

    /// Provider of the given kind, if configured.
    pub fn get(&self, kind: ProviderKind) -> Option<&Arc<dyn MetadataProvider>> {
        if self.primary.kind() == kind {
            return Some(&self.primary);
        }
        self.secondary.as_ref().filter(|p| p.kind() == kind)
    }

    pub async fn search(&self, kind: ProviderKind, title: &str, year: Option<u16>) -> Result<Vec<SearchCandidate>> {
        let provider = self.require(kind)?;
        call_with_timeout(kind, self.timeout, provider.search_by_title(title, year)).await
    }

    pub async fn episodes(&self, kind: ProviderKind, show_id: u64) -> Result<Vec<ProviderEpisode>> {
        let provider = self.require(kind)?;
        call_with_timeout(kind, self.timeout, provider.get_episodes(show_id)).await
    }

    pub async fn external_ids(&self, kind: ProviderKind, show_id: u64) -> Result<ExternalIds> {
        let provider = self.require(kind)?;
        call_with_timeout(kind, self.timeout, provider.get_external_ids(show_id)).await
    }

    pub async fn lookup(&self, kind: ProviderKind, ids: &ExternalIds) -> Result<Option<u64>> {
        let provider = self.require(kind)?;
        call_with_timeout(kind, self.timeout, provider.lookup_by_external(ids)).await
    }

    fn require(&self, kind: ProviderKind) -> Result<&Arc<dyn MetadataProvider>> {
        self.get(kind)
            .ok_or_else(|| crate::Error::ProviderUnavailable(format!("{} is not configured", kind)))
    }
}
