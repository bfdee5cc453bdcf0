//! Wiring shared by the commands.

use crate::core::actions::ActionManager;
use crate::core::catalog::CatalogService;
use crate::core::pipeline::Pipeline;
use crate::core::quality::QualityPolicy;
use crate::core::quarantine::Quarantine;
use crate::core::renamer::Renamer;
use crate::models::config::{load_config, Config};
use crate::services::provider::{MetadataProvider, Providers};
use crate::services::tmdb::{TmdbClient, TmdbConfig};
use crate::services::tvmaze::TvmazeClient;
use crate::store::{CatalogStore, JsonCatalogStore};
use crate::Result;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// File name of the catalog inside `library.data_dir`.
pub const CATALOG_FILE: &str = "catalog.json";

pub struct Context {
    pub config: Config,
    pub store: Arc<dyn CatalogStore>,
    pub actions: Arc<ActionManager>,
    pub quarantine: Arc<Quarantine>,
    pub pipeline: Arc<Pipeline>,
    pub catalog: CatalogService,
}

impl Context {
    /// Load the config and open the catalog it points at.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let config = load_config(config_path)?;
        let store = JsonCatalogStore::open(&config.library.data_dir.join(CATALOG_FILE))?;
        Ok(Self::new(config, Arc::new(store)))
    }

    pub fn new(config: Config, store: Arc<dyn CatalogStore>) -> Self {
        let renamer = Renamer::new(store.clone(), &config);
        let actions = Arc::new(ActionManager::new(store.clone(), renamer));
        let quarantine = Arc::new(Quarantine::new(store.clone(), &config));
        let pipeline = Arc::new(Pipeline::new(
            store.clone(),
            actions.clone(),
            quarantine.clone(),
            QualityPolicy::from_config(&config.quality),
        ));

        Self {
            catalog: CatalogService::new(store.clone()),
            config,
            store,
            actions,
            quarantine,
            pipeline,
        }
    }

    /// TMDB first with TVmaze as the alternate; TVmaze alone without a key.
    pub fn providers(&self) -> Providers {
        let timeout = Duration::from_secs(self.config.providers.timeout_secs);
        let tvmaze: Arc<dyn MetadataProvider> = Arc::new(TvmazeClient::new());

        match TmdbConfig::from_config(&self.config) {
            Ok(tmdb) => Providers::new(Arc::new(TmdbClient::new(tmdb)), Some(tvmaze), timeout),
            Err(e) => {
                tracing::warn!("{}; using TVmaze only", e);
                Providers::new(tvmaze, None, timeout)
            }
        }
    }
}
