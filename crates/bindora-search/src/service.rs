//! Search orchestration.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use futures_util::stream::{self, StreamExt};
use tracing::{debug, info, instrument, warn};

use bindora_common::{
    BindoraError, EnrichedPrediction, MolecularProperties, MoleculeCandidate, Prediction, Query,
    Result, SimilarMolecule, TargetInfo, TargetSequence,
};
use bindora_config::SearchConfig;
use bindora_ranker::{aggregate, tanimoto_batch, BindingScorer, Explanation};
use bindora_sources::CatalogSource;

use crate::enrich::{self, MoleculeDetails};
use crate::resolver::QueryResolver;

/// A drug-like catalog molecule with its completed properties.
struct Screened {
    candidate: MoleculeCandidate,
    properties: MolecularProperties,
}

/// Entry point for searches. Construct once and share; every method takes `&self`.
pub struct SearchService {
    resolver: QueryResolver,
    scorer: BindingScorer,
    catalog: Arc<dyn CatalogSource>,
    config: SearchConfig,
    timeout: Duration,
}

impl SearchService {
    pub fn new(
        resolver: QueryResolver,
        scorer: BindingScorer,
        catalog: Arc<dyn CatalogSource>,
        config: SearchConfig,
    ) -> Self {
        let timeout = Duration::from_secs(config.timeout_seconds);
        Self { resolver, scorer, catalog, config, timeout }
    }

    /// Override the overall search deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn scorer(&self) -> &BindingScorer {
        &self.scorer
    }

    // ── Search ──────────────────────────────────────────────────────────────

    /// Search with an untyped kind label (`disease`, `gene` or `sequence`).
    pub async fn search(&self, text: &str, kind: &str, max_results: usize) -> Result<Vec<EnrichedPrediction>> {
        let query = Query::parse(text, kind)?;
        self.search_query(&query, max_results).await
    }

    /// Ranked, enriched molecules for a query, best first.
    #[instrument(skip(self), fields(kind = %query.kind))]
    pub async fn search_query(&self, query: &Query, max_results: usize) -> Result<Vec<EnrichedPrediction>> {
        if max_results == 0 {
            return Err(BindoraError::Validation("max_results must be at least 1".to_string()));
        }
        let limit = max_results.min(self.config.max_results_limit);

        match tokio::time::timeout(self.timeout, self.run(query, limit)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(timeout_ms = self.timeout.as_millis() as u64, "Search timed out");
                Err(BindoraError::Upstream("search timed out".to_string()))
            }
        }
    }

    async fn run(&self, query: &Query, limit: usize) -> Result<Vec<EnrichedPrediction>> {
        let targets = self.resolver.resolve(query).await?;
        if targets.is_empty() {
            return Err(BindoraError::NotFound(format!("No targets resolved for '{}'", query.text)));
        }

        let screened = self.load_screened_catalog().await?;
        if screened.is_empty() {
            info!("No drug-like molecules in catalog");
            return Ok(Vec::new());
        }
        let candidates: Vec<MoleculeCandidate> = screened.iter().map(|s| s.candidate.clone()).collect();

        let predictions = self.score_targets(&targets, &candidates).await?;
        let raw_count = predictions.len();
        let merged = aggregate(predictions, self.config.min_score, limit);

        let by_id: HashMap<&str, &Screened> = screened.iter().map(|s| (s.candidate.id.as_str(), s)).collect();
        let results: Vec<EnrichedPrediction> = merged
            .into_iter()
            .filter_map(|prediction| {
                let entry = by_id.get(prediction.molecule_id.as_str())?;
                Some(enrich::enrich(prediction, &entry.candidate, entry.properties.clone(), true))
            })
            .collect();

        info!(
            n_targets = targets.len(),
            n_molecules = candidates.len(),
            n_predictions = raw_count,
            n_results = results.len(),
            "Search complete"
        );
        Ok(results)
    }

    /// Score every target concurrently. Failed targets are dropped; the
    /// search fails only when none succeeds.
    async fn score_targets(
        &self,
        targets: &[TargetSequence],
        candidates: &[MoleculeCandidate],
    ) -> Result<Vec<Prediction>> {
        let outcomes = join_all(targets.iter().map(|t| self.score_target(t, candidates))).await;

        let mut predictions = Vec::new();
        let mut first_error = None;
        let mut succeeded = 0;
        for (target, outcome) in targets.iter().zip(outcomes) {
            match outcome {
                Ok(mut scored) => {
                    succeeded += 1;
                    predictions.append(&mut scored);
                }
                Err(e) => {
                    warn!(target_digest = %&target.digest()[..12], error = %e, "Dropping target that failed to score");
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) if succeeded == 0 => Err(e),
            _ => Ok(predictions),
        }
    }

    async fn score_target(
        &self,
        target: &TargetSequence,
        candidates: &[MoleculeCandidate],
    ) -> Result<Vec<Prediction>> {
        let embedding = self.scorer.target_embedding(target.as_str()).await?;
        let structures: Vec<&str> = candidates.iter().map(|c| c.structure.as_str()).collect();
        let scores = self.scorer.score_batch_with_embedding(&embedding, &structures).await?;

        let digest = target.digest();
        let predictions: Vec<Prediction> = candidates
            .iter()
            .zip(scores)
            .filter_map(|(candidate, score)| {
                score.map(|s| Prediction::new(digest.clone(), candidate.id.clone(), s.similarity, s.score))
            })
            .collect();
        debug!(target_digest = %&digest[..12], scored = predictions.len(), "Scored target");
        Ok(predictions)
    }

    // ── Catalog ─────────────────────────────────────────────────────────────

    /// Catalog deduplicated by id (first wins).
    async fn load_catalog(&self) -> Result<Vec<MoleculeCandidate>> {
        let raw = self.catalog.fetch_catalog(self.config.catalog_limit).await?;
        let total = raw.len();
        let mut seen = HashSet::new();
        let molecules: Vec<MoleculeCandidate> = raw
            .into_iter()
            .filter(|m| seen.insert(m.id.clone()))
            .collect();
        if molecules.len() < total {
            warn!(duplicates = total - molecules.len(), "Dropped duplicate catalog ids");
        }
        debug!(source = self.catalog.name(), count = molecules.len(), "Loaded catalog");
        Ok(molecules)
    }

    /// Drug-like molecules only. A molecule whose properties cannot be
    /// determined is skipped.
    async fn load_screened_catalog(&self) -> Result<Vec<Screened>> {
        let molecules = self.load_catalog().await?;
        let total = molecules.len();
        let encoder = self.scorer.molecule_encoder().clone();

        let screened: Vec<Screened> = stream::iter(molecules)
            .map(|candidate| {
                let encoder = encoder.clone();
                async move {
                    let properties = match enrich::complete_properties(encoder.as_ref(), &candidate).await {
                        Ok(p) => p,
                        Err(e) => {
                            warn!(molecule_id = %candidate.id, error = %e, "Skipping molecule without properties");
                            return None;
                        }
                    };
                    if !encoder.check_drug_likeness(&properties).is_drug_like {
                        debug!(molecule_id = %candidate.id, "Filtered non-drug-like molecule");
                        return None;
                    }
                    Some(Screened { candidate, properties })
                }
            })
            .buffered(self.config.fingerprint_concurrency.max(1))
            .filter_map(|s| async move { s })
            .collect()
            .await;

        debug!(total, drug_like = screened.len(), "Screened catalog");
        Ok(screened)
    }

    // ── Details & explanation ───────────────────────────────────────────────

    /// A molecule by id: the catalog page first, then a direct lookup.
    async fn find_molecule(&self, id: &str) -> Result<MoleculeCandidate> {
        let id = id.trim();
        if id.is_empty() {
            return Err(BindoraError::Validation("Empty molecule id provided".to_string()));
        }
        if let Some(candidate) = self.load_catalog().await?.into_iter().find(|m| m.id == id) {
            return Ok(candidate);
        }
        debug!(molecule_id = id, "Not in catalog page, looking up directly");
        self.catalog
            .fetch_molecule(id)
            .await?
            .ok_or_else(|| BindoraError::NotFound(format!("Molecule '{}' not found", id)))
    }

    #[instrument(skip(self))]
    pub async fn molecule_details(&self, id: &str) -> Result<MoleculeDetails> {
        let candidate = self.find_molecule(id).await?;
        let encoder = self.scorer.molecule_encoder();
        Ok(enrich::details(encoder.as_ref(), &candidate).await)
    }

    /// Annotation for a target accession or gene symbol.
    pub async fn target_info(&self, id: &str) -> Result<TargetInfo> {
        self.resolver.target_info(id).await
    }

    /// Score breakdown for one raw sequence and one structure.
    pub async fn explain(&self, sequence: &str, structure: &str) -> Result<Explanation> {
        let target = TargetSequence::parse(sequence, self.config.max_sequence_length)?;
        self.scorer.explain(target.as_str(), structure).await
    }

    // ── Similarity ──────────────────────────────────────────────────────────

    /// Catalog molecules closest to `structure` by fingerprint Tanimoto,
    /// best first.
    #[instrument(skip(self))]
    pub async fn similar_molecules(&self, structure: &str, max_results: usize) -> Result<Vec<SimilarMolecule>> {
        let structure = structure.trim();
        if structure.is_empty() {
            return Err(BindoraError::Validation("Empty molecule structure provided".to_string()));
        }
        self.similar_to(structure, None, max_results).await
    }

    /// Catalog molecules closest to the molecule `id`, excluding itself.
    #[instrument(skip(self))]
    pub async fn similar_to_molecule(&self, id: &str, max_results: usize) -> Result<Vec<SimilarMolecule>> {
        let candidate = self.find_molecule(id).await?;
        self.similar_to(&candidate.structure, Some(&candidate.id), max_results).await
    }

    async fn similar_to(
        &self,
        structure: &str,
        exclude_id: Option<&str>,
        max_results: usize,
    ) -> Result<Vec<SimilarMolecule>> {
        if max_results == 0 {
            return Err(BindoraError::Validation("max_results must be at least 1".to_string()));
        }
        let limit = max_results.min(self.config.max_results_limit);

        let work = self.rank_similar(structure, exclude_id, limit);
        match tokio::time::timeout(self.timeout, work).await {
            Ok(result) => result,
            Err(_) => {
                warn!(timeout_ms = self.timeout.as_millis() as u64, "Similarity search timed out");
                Err(BindoraError::Upstream("similarity search timed out".to_string()))
            }
        }
    }

    async fn rank_similar(
        &self,
        structure: &str,
        exclude_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<SimilarMolecule>> {
        let query = self.scorer.molecule_fingerprint(structure).await?;

        let candidates: Vec<MoleculeCandidate> = self
            .load_catalog()
            .await?
            .into_iter()
            .filter(|m| Some(m.id.as_str()) != exclude_id)
            .collect();

        let fingerprinted: Vec<(MoleculeCandidate, Vec<f32>)> = stream::iter(candidates)
            .map(|candidate| async move {
                match self.scorer.molecule_fingerprint(&candidate.structure).await {
                    Ok(fingerprint) => Some((candidate, fingerprint)),
                    Err(e) => {
                        warn!(molecule_id = %candidate.id, error = %e, "Skipping molecule without fingerprint");
                        None
                    }
                }
            })
            .buffered(self.config.fingerprint_concurrency.max(1))
            .filter_map(|s| async move { s })
            .collect()
            .await;

        let rows: Vec<Vec<f32>> = fingerprinted.iter().map(|(_, fp)| fp.clone()).collect();
        let similarities = tanimoto_batch(&query, &rows)?;

        let mut similar: Vec<SimilarMolecule> = fingerprinted
            .into_iter()
            .zip(similarities)
            .map(|((candidate, _), similarity)| SimilarMolecule {
                id: candidate.id,
                name: candidate.name,
                structure: candidate.structure,
                similarity,
            })
            .collect();
        similar.sort_by(|a, b| b.similarity.total_cmp(&a.similarity).then_with(|| a.id.cmp(&b.id)));
        similar.truncate(limit);

        debug!(n_results = similar.len(), "Similarity search complete");
        Ok(similar)
    }

    // ── Cache hooks ─────────────────────────────────────────────────────────

    pub async fn clear_caches(&self) -> Result<()> {
        self.scorer.clear_cache().await?;
        info!("Cleared caches");
        Ok(())
    }

    pub async fn cache_size(&self) -> Result<usize> {
        self.scorer.cache_size().await
    }
}
