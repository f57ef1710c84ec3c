pub mod aggregator;
pub mod catalog;
pub mod config;
pub mod dao;
pub mod db;
pub mod error;
pub mod fanout;
pub mod mapping;
pub mod playback;
pub mod registry;
pub mod rules;
pub mod storage;
pub mod tmdb;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

// --- Library API for embedding ---

/// Convenience re-exports for embedders.
pub mod prelude {
    pub use crate::aggregator::{Aggregated, Completeness};
    pub use crate::config::Config;
    pub use crate::error::{CatalogError, CatalogResult, FetchFailure};
    pub use crate::playback::PlaybackTarget;
    pub use crate::storage::{Library, LibraryEntry, Profile, Progress, WatchProgress};
    pub use crate::tmdb::{Listing, MetadataSource, Relation, TimeWindow, TrendingScope};
    pub use crate::types::{Catalog, ContentDetails, ContentItem, Episode, MediaKind, Section, Shelf, SortKey};
    pub use crate::registry::GroupingSummary;
    pub use crate::Marquee;
}

use std::sync::Arc;
use std::time::Duration;

use tracing::info;
use url::Url;

use crate::aggregator::Aggregator;
use crate::config::Config;
use crate::db::Database;
use crate::error::CatalogResult;
use crate::fanout::FanOut;
use crate::playback::{playback_url, PlaybackTarget};
use crate::registry::{GroupingSummary, Registry};
use crate::tmdb::{MetadataSource, TmdbClient};

/// Async library entry point. Owns the grouping registry and the metadata source.
pub struct Marquee {
    config: Config,
    registry: Registry,
    aggregator: Aggregator,
}

impl Marquee {
    /// Build against the HTTP metadata API. Loads the built-in registry plus
    /// `registry_dir` when configured. Does no network I/O.
    pub fn new(config: Config) -> CatalogResult<Self> {
        let registry = load_registry(&config)?;
        let client = TmdbClient::from_config(&config)?;
        Ok(Self::with_source(Arc::new(client), config, registry))
    }

    pub fn with_source(source: Arc<dyn MetadataSource>, config: Config, registry: Registry) -> Self {
        let fan = FanOut::new(config.max_concurrency, Duration::from_secs(config.batch_timeout_secs));
        let aggregator = Aggregator::new(source, fan, config.images.clone());
        Self { config, registry, aggregator }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn aggregator(&self) -> &Aggregator {
        &self.aggregator
    }

    pub fn groupings(&self) -> Vec<GroupingSummary> {
        self.registry.summaries()
    }

    pub fn playback_url(&self, target: PlaybackTarget) -> CatalogResult<Url> {
        playback_url(self.config.playback_base_url.as_deref(), target)
    }

    /// Open the local library store named by `database_url` (or the default
    /// SQLite file), optionally running embedded migrations.
    pub async fn open_library(&self, run_migrations: bool) -> anyhow::Result<Database> {
        let db = Database::connect(self.config.database_url.as_deref()).await?;
        if run_migrations {
            db.run_migrations().await?;
        }
        Ok(db)
    }
}

/// Built-in groupings, overlaid with the files in `registry_dir` when set.
pub fn load_registry(config: &Config) -> CatalogResult<Registry> {
    let mut registry = Registry::builtin()?;
    if let Some(dir) = &config.registry_dir {
        let loaded = registry.load_dir(dir)?;
        info!(dir = %dir.display(), loaded, "registry overrides loaded");
    }
    Ok(registry)
}
