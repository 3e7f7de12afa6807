//! Query → target sequences.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use bindora_cache::EmbeddingCache;
use bindora_common::{BindoraError, Query, QueryKind, Result, TargetInfo, TargetSequence};
use bindora_sources::SequenceSource;

pub struct QueryResolver {
    sequences: Arc<dyn SequenceSource>,
    cache: EmbeddingCache,
    max_sequence_length: usize,
    max_disease_targets: usize,
}

impl QueryResolver {
    pub fn new(
        sequences: Arc<dyn SequenceSource>,
        cache: EmbeddingCache,
        max_sequence_length: usize,
        max_disease_targets: usize,
    ) -> Self {
        Self {
            sequences,
            cache,
            max_sequence_length,
            max_disease_targets: max_disease_targets.max(1),
        }
    }

    /// Resolve a query to one or more normalised target sequences.
    ///
    /// Raw sequences are validated strictly and never cached. Gene and
    /// disease lookups go through the sequence source and are cached by
    /// normalised query text.
    #[instrument(skip(self), fields(kind = %query.kind))]
    pub async fn resolve(&self, query: &Query) -> Result<Vec<TargetSequence>> {
        match query.kind {
            QueryKind::Sequence => {
                let sequence = TargetSequence::parse(&query.text, self.max_sequence_length)?;
                debug!(length = sequence.len(), "Using raw sequence query");
                Ok(vec![sequence])
            }
            QueryKind::Gene | QueryKind::Disease => {
                if let Some(cached) = self.cached(query).await {
                    debug!(n_targets = cached.len(), "Resolved query from cache");
                    return Ok(cached);
                }

                let targets = match query.kind {
                    QueryKind::Gene => self.resolve_gene(&query.text).await?,
                    _ => self.resolve_disease(&query.text).await?,
                };

                let raw: Vec<String> = targets.iter().map(|t| t.as_str().to_string()).collect();
                self.cache.put_resolved(query.kind.as_str(), &query.text, &raw).await;
                info!(n_targets = targets.len(), "Resolved query");
                Ok(targets)
            }
        }
    }

    /// Annotation for an accession or gene symbol, cached by uppercased id.
    #[instrument(skip(self))]
    pub async fn target_info(&self, id: &str) -> Result<TargetInfo> {
        let id = id.trim();
        if id.is_empty() {
            return Err(BindoraError::Validation("Empty target id provided".to_string()));
        }
        if let Some(cached) = self.cache.get_target_info(id).await {
            debug!("Target annotation from cache");
            return Ok(cached);
        }
        let info = self
            .sequences
            .fetch_target_info(id)
            .await?
            .ok_or_else(|| BindoraError::NotFound(format!("No annotation found for target '{}'", id)))?;
        self.cache.put_target_info(id, &info).await;
        Ok(info)
    }

    async fn cached(&self, query: &Query) -> Option<Vec<TargetSequence>> {
        let raw = self.cache.get_resolved(query.kind.as_str(), &query.text).await?;
        let targets: Vec<TargetSequence> = raw
            .iter()
            .filter_map(|s| TargetSequence::from_upstream(s, self.max_sequence_length))
            .collect();
        (!targets.is_empty()).then_some(targets)
    }

    async fn resolve_gene(&self, symbol: &str) -> Result<Vec<TargetSequence>> {
        let raw = self
            .sequences
            .fetch_by_gene(symbol)
            .await?
            .ok_or_else(|| BindoraError::NotFound(format!("No sequence found for gene '{}'", symbol)))?;

        let sequence = TargetSequence::from_upstream(&raw, self.max_sequence_length).ok_or_else(|| {
            BindoraError::NotFound(format!("Sequence for gene '{}' has no standard residues", symbol))
        })?;
        Ok(vec![sequence])
    }

    async fn resolve_disease(&self, name: &str) -> Result<Vec<TargetSequence>> {
        let raw = self.sequences.fetch_by_disease(name, self.max_disease_targets).await?;
        let fetched = raw.len();

        let mut seen = HashSet::new();
        let targets: Vec<TargetSequence> = raw
            .iter()
            .filter_map(|s| TargetSequence::from_upstream(s, self.max_sequence_length))
            .filter(|t| seen.insert(t.as_str().to_string()))
            .take(self.max_disease_targets)
            .collect();

        if targets.len() < fetched {
            warn!(fetched, kept = targets.len(), "Dropped empty or duplicate disease targets");
        }
        if targets.is_empty() {
            return Err(BindoraError::NotFound(format!("No targets found for disease '{}'", name)));
        }
        Ok(targets)
    }
}
