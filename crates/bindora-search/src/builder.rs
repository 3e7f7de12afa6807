//! Wires a [`SearchService`] from configuration, with optional overrides
//! for any collaborator.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use bindora_cache::EmbeddingCache;
use bindora_common::{BindoraError, GuardedClient, Result};
use bindora_config::Config;
use bindora_embed::{build_encoders, MoleculeEncoder, TargetEncoder};
use bindora_ranker::BindingScorer;
use bindora_sources::{build_sources, CatalogSource, SequenceSource};

use crate::resolver::QueryResolver;
use crate::service::SearchService;

#[derive(Default)]
pub struct SearchServiceBuilder {
    config: Config,
    target_encoder: Option<Arc<dyn TargetEncoder>>,
    molecule_encoder: Option<Arc<dyn MoleculeEncoder>>,
    sequences: Option<Arc<dyn SequenceSource>>,
    catalog: Option<Arc<dyn CatalogSource>>,
    cache: Option<EmbeddingCache>,
    timeout: Option<Duration>,
}

impl SearchServiceBuilder {
    pub fn new(config: Config) -> Self {
        Self { config, ..Default::default() }
    }

    pub fn target_encoder(mut self, encoder: Arc<dyn TargetEncoder>) -> Self {
        self.target_encoder = Some(encoder);
        self
    }

    pub fn molecule_encoder(mut self, encoder: Arc<dyn MoleculeEncoder>) -> Self {
        self.molecule_encoder = Some(encoder);
        self
    }

    pub fn sequences(mut self, source: Arc<dyn SequenceSource>) -> Self {
        self.sequences = Some(source);
        self
    }

    pub fn catalog(mut self, catalog: Arc<dyn CatalogSource>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn cache(mut self, cache: EmbeddingCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Validate the configuration and build anything not supplied.
    pub fn build(self) -> Result<SearchService> {
        let config = self.config;
        config.validate()?;

        let client = GuardedClient::new(Duration::from_secs(config.sources.request_timeout_seconds))?;

        let (target_encoder, molecule_encoder) = match (self.target_encoder, self.molecule_encoder) {
            (Some(t), Some(m)) => (t, m),
            (t, m) => {
                let built = build_encoders(&config.encoder, &client, &config.retry)?;
                (t.unwrap_or(built.target), m.unwrap_or(built.molecule))
            }
        };

        if target_encoder.dimension() != molecule_encoder.dimension() {
            return Err(BindoraError::Config(format!(
                "Encoder dimensions differ: target {} ({}), molecule {} ({})",
                target_encoder.model_name(),
                target_encoder.dimension(),
                molecule_encoder.model_name(),
                molecule_encoder.dimension()
            )));
        }

        let (sequences, catalog) = match (self.sequences, self.catalog) {
            (Some(s), Some(c)) => (s, c),
            (s, c) => {
                let built = build_sources(&config.sources, &client, &config.retry)?;
                (s.unwrap_or(built.sequences), c.unwrap_or(built.catalog))
            }
        };

        let cache = match self.cache {
            Some(cache) => cache,
            None => EmbeddingCache::from_config(&config.cache)?,
        };

        let resolver = QueryResolver::new(
            sequences,
            cache.clone(),
            config.search.max_sequence_length,
            config.search.max_disease_targets,
        );
        let scorer = BindingScorer::new(target_encoder, molecule_encoder, cache, config.scoring.clone())
            .with_concurrency(config.search.fingerprint_concurrency);

        info!(
            catalog = catalog.name(),
            cache_enabled = config.cache.enabled,
            cache_backend = ?config.cache.backend,
            timeout_seconds = config.search.timeout_seconds,
            "Search service ready"
        );

        let service = SearchService::new(resolver, scorer, catalog, config.search);
        Ok(match self.timeout {
            Some(timeout) => service.with_timeout(timeout),
            None => service,
        })
    }
}

impl SearchService {
    /// Build a service entirely from configuration.
    pub fn from_config(config: Config) -> Result<Self> {
        SearchServiceBuilder::new(config).build()
    }

    pub fn builder(config: Config) -> SearchServiceBuilder {
        SearchServiceBuilder::new(config)
    }
}
