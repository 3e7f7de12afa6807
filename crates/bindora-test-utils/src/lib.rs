//! Shared fixtures for Bindora tests: sequences, structures, catalogs, and
//! encoders that count or fail on demand.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use bindora_common::{BindoraError, MolecularProperties, MoleculeCandidate, Result, TargetInfo};
use bindora_embed::{MoleculeEncoder, StubMoleculeEncoder, StubTargetEncoder, TargetEncoder};
use bindora_sources::{MockSequenceSource, StaticCatalog};

pub const TEST_SEQUENCE: &str = "MKTIIALSYIFCLVFA";
pub const KRAS_FRAGMENT: &str = "MTEYKLVVVGAGGVGKSALTIQLIQNHFV";
pub const EGFR_FRAGMENT: &str = "MRPSGTAGAALLALLAALCPASRALEEKKV";

pub const ASPIRIN: &str = "CC(=O)Oc1ccccc1C(=O)O";
pub const IBUPROFEN: &str = "CC(C)Cc1ccc(cc1)C(C)C(=O)O";
pub const CAFFEINE: &str = "Cn1cnc2c1c(=O)n(C)c(=O)n2C";
pub const MALFORMED_SMILES: &str = "C1CC(";
pub const TEST_DIMENSION: usize = 256;

/// Four-molecule catalog: three drug-like, one malformed.
pub fn sample_catalog() -> StaticCatalog {
    StaticCatalog::new()
        .with(MoleculeCandidate::new("aspirin", ASPIRIN).with_name("Aspirin").with_phase(4))
        .with(MoleculeCandidate::new("ibuprofen", IBUPROFEN).with_name("Ibuprofen").with_phase(4))
        .with(MoleculeCandidate::new("broken", MALFORMED_SMILES))
        .with(MoleculeCandidate::new("caffeine", CAFFEINE).with_name("Caffeine").with_phase(4))
}

/// Sequence source knowing KRAS, EGFR and one disease mapped to both.
/// Only KRAS carries an annotation.
pub fn sample_sequences() -> MockSequenceSource {
    MockSequenceSource::new()
        .with_gene("KRAS", KRAS_FRAGMENT)
        .with_gene("EGFR", EGFR_FRAGMENT)
        .with_disease("lung cancer", &[KRAS_FRAGMENT, EGFR_FRAGMENT])
        .with_target_info(kras_info())
}

pub fn kras_info() -> TargetInfo {
    TargetInfo {
        accession: "P01116".to_string(),
        name: Some("GTPase KRas".to_string()),
        gene: Some("KRAS".to_string()),
        organism: Some("Homo sapiens".to_string()),
        sequence_length: Some(189),
        function: Some("Ras proteins bind GDP/GTP and possess intrinsic GTPase activity.".to_string()),
        subcellular_locations: vec!["Cell membrane".to_string()],
        go_terms: vec!["GO:0005525 F:GTP binding".to_string()],
        diseases: vec!["Noonan syndrome 3".to_string()],
    }
}

/// Properties that always fail the Rule of Five.
pub fn non_druglike_properties() -> MolecularProperties {
    MolecularProperties {
        molecular_weight: Some(910.0),
        logp: Some(6.5),
        hbd: Some(9),
        hba: Some(16),
        tpsa: Some(240.0),
        rotatable_bonds: Some(20),
        aromatic_rings: Some(0),
    }
}

// ── Counting encoders ───────────────────────────────────────────────────────

/// Stub target encoder that counts calls, with optional delay and failures.
pub struct CountingTargetEncoder {
    inner: StubTargetEncoder,
    calls: AtomicUsize,
    delay: Option<Duration>,
    failing: HashSet<String>,
}

impl CountingTargetEncoder {
    pub fn new(dimension: usize) -> Self {
        Self {
            inner: StubTargetEncoder::new("counting-target", dimension),
            calls: AtomicUsize::new(0),
            delay: None,
            failing: HashSet::new(),
        }
    }

    /// Sleep before every encoding.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Encoding this exact sequence returns an upstream error.
    pub fn failing_on(mut self, sequence: &str) -> Self {
        self.failing.insert(sequence.to_string());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TargetEncoder for CountingTargetEncoder {
    fn model_name(&self) -> &str {
        self.inner.model_name()
    }

    fn dimension(&self) -> usize {
        self.inner.dimension()
    }

    async fn encode_target(&self, sequence: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.contains(sequence) {
            return Err(BindoraError::Upstream("target encoder unavailable".into()));
        }
        self.inner.encode_target(sequence).await
    }
}

/// Stub molecule encoder that counts fingerprint calls.
pub struct CountingMoleculeEncoder {
    inner: StubMoleculeEncoder,
    calls: AtomicUsize,
}

impl CountingMoleculeEncoder {
    pub fn new(dimension: usize) -> Self {
        Self {
            inner: StubMoleculeEncoder::new("counting-molecule", dimension, 2),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MoleculeEncoder for CountingMoleculeEncoder {
    fn model_name(&self) -> &str {
        self.inner.model_name()
    }

    fn dimension(&self) -> usize {
        self.inner.dimension()
    }

    async fn encode_molecule(&self, structure: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.encode_molecule(structure).await
    }

    async fn descriptors(&self, structure: &str) -> Result<MolecularProperties> {
        self.inner.descriptors(structure).await
    }
}
