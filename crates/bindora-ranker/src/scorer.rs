//! Binding score computation for target/molecule pairs.

use std::sync::Arc;

use futures_util::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use bindora_cache::EmbeddingCache;
use bindora_common::{BindoraError, MolecularProperties, MoleculeCandidate, Result};
use bindora_config::ScoringConfig;
use bindora_embed::{MoleculeEncoder, TargetEncoder};

use crate::similarity::{cosine, cosine_batch};

pub const SCORING_METHOD: &str = "cosine-logistic";

const DEFAULT_CONCURRENCY: usize = 8;

/// Logistic squashing of a similarity into (0, 1). `logistic_scale(0, k) == 0.5`.
pub fn logistic_scale(similarity: f64, scale_factor: f64) -> f64 {
    1.0 / (1.0 + (-similarity * scale_factor).exp())
}

/// Map a raw cosine similarity to a 0–100 score.
/// The threshold is compared against the raw similarity, and a miss halves
/// the already-scaled score.
pub fn score_from_similarity(similarity: f64, config: &ScoringConfig) -> f64 {
    let mut score = logistic_scale(similarity, config.scale_factor) * 100.0;
    if similarity < config.similarity_threshold {
        score *= 0.5;
    }
    score.clamp(0.0, 100.0)
}

/// Human-readable band for a score.
pub fn interpret(score: f64) -> &'static str {
    match score {
        s if s >= 80.0 => "Very high predicted binding affinity",
        s if s >= 60.0 => "High predicted binding affinity",
        s if s >= 40.0 => "Moderate predicted binding affinity",
        s if s >= 20.0 => "Low predicted binding affinity",
        _ => "Very low predicted binding affinity",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PairScore {
    pub similarity: f64,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedMolecule {
    pub candidate: MoleculeCandidate,
    pub score: f64,
    /// `None` when the molecule could not be encoded (score is then 0).
    pub similarity: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Explanation {
    pub score: f64,
    pub similarity: f64,
    pub method: String,
    pub interpretation: String,
    pub target_dimension: usize,
    pub fingerprint_bits: usize,
    pub active_fingerprint_bits: usize,
    pub properties: MolecularProperties,
    pub is_drug_like: bool,
}

/// Scores targets against molecules, caching both encodings.
#[derive(Clone)]
pub struct BindingScorer {
    target_encoder: Arc<dyn TargetEncoder>,
    molecule_encoder: Arc<dyn MoleculeEncoder>,
    cache: EmbeddingCache,
    config: ScoringConfig,
    concurrency: usize,
}

impl BindingScorer {
    pub fn new(
        target_encoder: Arc<dyn TargetEncoder>,
        molecule_encoder: Arc<dyn MoleculeEncoder>,
        cache: EmbeddingCache,
        config: ScoringConfig,
    ) -> Self {
        Self {
            target_encoder,
            molecule_encoder,
            cache,
            config,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    /// Number of molecules fingerprinted concurrently in a batch.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    pub fn molecule_encoder(&self) -> &Arc<dyn MoleculeEncoder> {
        &self.molecule_encoder
    }

    // ── Encodings (cache-or-compute) ────────────────────────────────────────

    pub async fn target_embedding(&self, sequence: &str) -> Result<Vec<f32>> {
        let model = self.target_encoder.model_name();
        if let Some(hit) = self.cache.get_target(model, sequence).await {
            return Ok(hit);
        }
        let embedding = self.target_encoder.encode_target(sequence).await?;
        self.cache.put_target(model, sequence, &embedding).await;
        Ok(embedding)
    }

    pub async fn molecule_fingerprint(&self, structure: &str) -> Result<Vec<f32>> {
        let model = self.molecule_encoder.model_name();
        if let Some(hit) = self.cache.get_molecule(model, structure).await {
            return Ok(hit);
        }
        let fingerprint = self.molecule_encoder.encode_molecule(structure).await?;
        self.cache.put_molecule(model, structure, &fingerprint).await;
        Ok(fingerprint)
    }

    // ── Single pair ─────────────────────────────────────────────────────────

    pub async fn score_pair(&self, target_seq: &str, structure: &str) -> Result<PairScore> {
        let target_seq = target_seq.trim();
        let structure = structure.trim();
        if target_seq.is_empty() {
            return Err(BindoraError::Validation("Empty target sequence provided".into()));
        }
        if structure.is_empty() {
            return Err(BindoraError::Validation("Empty molecule structure provided".into()));
        }

        let embedding = self.target_embedding(target_seq).await?;
        let fingerprint = self.molecule_fingerprint(structure).await?;
        let similarity = cosine(&embedding, &fingerprint)?;
        Ok(PairScore {
            similarity,
            score: score_from_similarity(similarity, &self.config),
        })
    }

    /// Score in [0, 100]. Encoding failures propagate.
    pub async fn score(&self, target_seq: &str, structure: &str) -> Result<f64> {
        Ok(self.score_pair(target_seq, structure).await?.score)
    }

    // ── Batch ───────────────────────────────────────────────────────────────

    /// One score per structure, in input order. Structures that cannot be
    /// encoded score 0.0.
    pub async fn score_batch<S>(&self, target_seq: &str, structures: &[S]) -> Result<Vec<f64>>
    where
        S: AsRef<str> + Sync,
    {
        Ok(self
            .score_batch_detailed(target_seq, structures)
            .await?
            .into_iter()
            .map(|s| s.map(|p| p.score).unwrap_or(0.0))
            .collect())
    }

    /// Like [`score_batch`](Self::score_batch), with `None` marking skipped entries.
    #[instrument(skip(self, target_seq, structures), fields(n = structures.len()))]
    pub async fn score_batch_detailed<S>(
        &self,
        target_seq: &str,
        structures: &[S],
    ) -> Result<Vec<Option<PairScore>>>
    where
        S: AsRef<str> + Sync,
    {
        if structures.is_empty() {
            return Ok(Vec::new());
        }
        let target_seq = target_seq.trim();
        if target_seq.is_empty() {
            return Err(BindoraError::Validation("Empty target sequence provided".into()));
        }
        let embedding = self.target_embedding(target_seq).await?;
        self.score_batch_with_embedding(&embedding, structures).await
    }

    /// Batch scoring against an already-computed target embedding.
    pub async fn score_batch_with_embedding<S>(
        &self,
        embedding: &[f32],
        structures: &[S],
    ) -> Result<Vec<Option<PairScore>>>
    where
        S: AsRef<str> + Sync,
    {
        if structures.is_empty() {
            return Ok(Vec::new());
        }

        let fingerprints: Vec<Option<Vec<f32>>> = stream::iter(structures.iter().enumerate())
            .map(|(i, structure)| async move {
                let structure = structure.as_ref().trim();
                if structure.is_empty() {
                    warn!(index = i, "Skipping molecule with empty structure");
                    return None;
                }
                match self.molecule_fingerprint(structure).await {
                    Ok(fp) => Some(fp),
                    Err(e) => {
                        warn!(index = i, structure, error = %e, "Skipping molecule that failed to encode");
                        None
                    }
                }
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        let (valid_idx, valid_fps): (Vec<usize>, Vec<Vec<f32>>) = fingerprints
            .into_iter()
            .enumerate()
            .filter_map(|(i, fp)| fp.map(|fp| (i, fp)))
            .unzip();

        let sims = cosine_batch(embedding, &valid_fps)?;

        let mut results = vec![None; structures.len()];
        for (i, similarity) in valid_idx.into_iter().zip(sims) {
            results[i] = Some(PairScore {
                similarity,
                score: score_from_similarity(similarity, &self.config),
            });
        }
        let skipped = results.iter().filter(|r| r.is_none()).count();
        debug!(scored = structures.len() - skipped, skipped, "Scored batch");
        Ok(results)
    }

    // ── Ranking ─────────────────────────────────────────────────────────────

    /// Candidates sorted by score descending; ties keep catalog order.
    pub async fn rank(
        &self,
        target_seq: &str,
        candidates: &[MoleculeCandidate],
    ) -> Result<Vec<RankedMolecule>> {
        if candidates.is_empty() {
            return Ok(Vec::new());
        }
        let structures: Vec<&str> = candidates.iter().map(|c| c.structure.as_str()).collect();
        let scores = self.score_batch_detailed(target_seq, &structures).await?;
        Ok(Self::sort_ranked(candidates, scores))
    }

    pub async fn rank_with_embedding(
        &self,
        embedding: &[f32],
        candidates: &[MoleculeCandidate],
    ) -> Result<Vec<RankedMolecule>> {
        let structures: Vec<&str> = candidates.iter().map(|c| c.structure.as_str()).collect();
        let scores = self.score_batch_with_embedding(embedding, &structures).await?;
        Ok(Self::sort_ranked(candidates, scores))
    }

    fn sort_ranked(
        candidates: &[MoleculeCandidate],
        scores: Vec<Option<PairScore>>,
    ) -> Vec<RankedMolecule> {
        let mut ranked: Vec<RankedMolecule> = candidates
            .iter()
            .zip(scores)
            .map(|(candidate, s)| RankedMolecule {
                candidate: candidate.clone(),
                score: s.map(|p| p.score).unwrap_or(0.0),
                similarity: s.map(|p| p.similarity),
            })
            .collect();
        // sort_by is stable
        ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
        ranked
    }

    // ── Explanation ─────────────────────────────────────────────────────────

    #[instrument(skip(self, target_seq))]
    pub async fn explain(&self, target_seq: &str, structure: &str) -> Result<Explanation> {
        let pair = self.score_pair(target_seq, structure).await?;
        let embedding = self.target_embedding(target_seq.trim()).await?;
        let fingerprint = self.molecule_fingerprint(structure.trim()).await?;

        let properties = match self.molecule_encoder.descriptors(structure.trim()).await {
            Ok(props) => props,
            Err(e) => {
                warn!(error = %e, "Descriptor computation failed, using defaults");
                MolecularProperties::default().with_defaults()
            }
        };
        let is_drug_like = self.molecule_encoder.check_drug_likeness(&properties).is_drug_like;

        Ok(Explanation {
            score: pair.score,
            similarity: pair.similarity,
            method: SCORING_METHOD.to_string(),
            interpretation: interpret(pair.score).to_string(),
            target_dimension: embedding.len(),
            fingerprint_bits: fingerprint.len(),
            active_fingerprint_bits: fingerprint.iter().filter(|b| **b > 0.0).count(),
            properties,
            is_drug_like,
        })
    }

    // ── Cache hooks ─────────────────────────────────────────────────────────

    pub async fn clear_cache(&self) -> Result<()> {
        self.cache.clear().await
    }

    pub async fn cache_size(&self) -> Result<usize> {
        self.cache.len().await
    }
}
