//! In-memory sources for tests and offline runs.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use bindora_common::{BindoraError, MoleculeCandidate, Result, TargetInfo};

use crate::{CatalogSource, SequenceSource};

// ── Sequences ───────────────────────────────────────────────────────────────

/// Mock sequence source with hardcoded genes and diseases. Keys match
/// case-insensitively.
#[derive(Default)]
pub struct MockSequenceSource {
    genes: HashMap<String, String>,
    diseases: HashMap<String, Vec<String>>,
    targets: HashMap<String, TargetInfo>,
    failing: bool,
    calls: AtomicUsize,
}

impl MockSequenceSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a gene symbol → sequence mapping.
    pub fn with_gene(mut self, symbol: &str, sequence: &str) -> Self {
        self.genes.insert(symbol.to_lowercase(), sequence.to_string());
        self
    }

    /// Add a disease → sequences mapping.
    pub fn with_disease(mut self, name: &str, sequences: &[&str]) -> Self {
        self.diseases.insert(
            name.to_lowercase(),
            sequences.iter().map(|s| s.to_string()).collect(),
        );
        self
    }

    /// Annotation served for both its accession and its gene symbol.
    pub fn with_target_info(mut self, info: TargetInfo) -> Self {
        if let Some(gene) = &info.gene {
            self.targets.insert(gene.to_lowercase(), info.clone());
        }
        self.targets.insert(info.accession.to_lowercase(), info);
        self
    }

    /// Every lookup fails with an upstream error.
    pub fn failing(mut self) -> Self {
        self.failing = true;
        self
    }

    /// Number of lookups served so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn record(&self) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing {
            return Err(BindoraError::Upstream("mock sequence source unavailable".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl SequenceSource for MockSequenceSource {
    async fn fetch_by_gene(&self, symbol: &str) -> Result<Option<String>> {
        self.record()?;
        Ok(self.genes.get(&symbol.trim().to_lowercase()).cloned())
    }

    async fn fetch_by_disease(&self, name: &str, limit: usize) -> Result<Vec<String>> {
        self.record()?;
        Ok(self
            .diseases
            .get(&name.trim().to_lowercase())
            .map(|seqs| seqs.iter().take(limit).cloned().collect())
            .unwrap_or_default())
    }

    async fn fetch_target_info(&self, id: &str) -> Result<Option<TargetInfo>> {
        self.record()?;
        Ok(self.targets.get(&id.trim().to_lowercase()).cloned())
    }
}

// ── Catalog ─────────────────────────────────────────────────────────────────

/// Fixed catalog, returned in insertion order. Molecules added with
/// [`StaticCatalog::with_unlisted`] are found by id but never listed.
#[derive(Default)]
pub struct StaticCatalog {
    molecules: Vec<MoleculeCandidate>,
    unlisted: Vec<MoleculeCandidate>,
    failing: bool,
}

impl StaticCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, candidate: MoleculeCandidate) -> Self {
        self.molecules.push(candidate);
        self
    }

    pub fn with_unlisted(mut self, candidate: MoleculeCandidate) -> Self {
        self.unlisted.push(candidate);
        self
    }

    pub fn failing(mut self) -> Self {
        self.failing = true;
        self
    }

    fn check(&self) -> Result<()> {
        if self.failing {
            return Err(BindoraError::Upstream("mock catalog unavailable".into()));
        }
        Ok(())
    }
}

impl From<Vec<MoleculeCandidate>> for StaticCatalog {
    fn from(molecules: Vec<MoleculeCandidate>) -> Self {
        Self { molecules, ..Default::default() }
    }
}

#[async_trait]
impl CatalogSource for StaticCatalog {
    async fn fetch_catalog(&self, limit: usize) -> Result<Vec<MoleculeCandidate>> {
        self.check()?;
        Ok(self.molecules.iter().take(limit).cloned().collect())
    }

    async fn fetch_molecule(&self, id: &str) -> Result<Option<MoleculeCandidate>> {
        self.check()?;
        let id = id.trim();
        Ok(self.molecules.iter().chain(&self.unlisted).find(|m| m.id == id).cloned())
    }

    fn name(&self) -> &str {
        "static"
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
