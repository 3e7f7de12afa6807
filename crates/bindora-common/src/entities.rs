//! Core domain records shared by the resolver, scorer, aggregator and orchestrator.
//! All records are plain owned data; nothing here talks to the network.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{BindoraError, Result};

/// The 20 standard amino-acid residues accepted in a target sequence.
pub const STANDARD_RESIDUES: &str = "ACDEFGHIKLMNPQRSTVWY";

/// Characters silently dropped from user-supplied sequences
/// (line breaks, numbering, gap and stop markers, list punctuation).
fn is_sequence_separator(c: char) -> bool {
    c.is_whitespace() || c.is_ascii_digit() || matches!(c, '-' | '_' | '.' | ',' | '*')
}

fn is_standard_residue(c: char) -> bool {
    STANDARD_RESIDUES.contains(c)
}

// ---------------------------------------------------------------------------
// Query
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryKind {
    Disease,
    Gene,
    Sequence,
}

impl QueryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryKind::Disease => "disease",
            QueryKind::Gene => "gene",
            QueryKind::Sequence => "sequence",
        }
    }
}

impl fmt::Display for QueryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueryKind {
    type Err = BindoraError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "disease" => Ok(QueryKind::Disease),
            "gene" => Ok(QueryKind::Gene),
            "sequence" => Ok(QueryKind::Sequence),
            other => Err(BindoraError::Validation(format!(
                "Unsupported query kind '{}' (expected disease, gene or sequence)",
                other
            ))),
        }
    }
}

/// A single search request. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    pub text: String,
    pub kind: QueryKind,
}

impl Query {
    /// Build a query, rejecting empty or whitespace-only text.
    pub fn new(text: &str, kind: QueryKind) -> Result<Self> {
        let text = text.trim();
        if text.is_empty() {
            return Err(BindoraError::Validation("Empty query provided".to_string()));
        }
        Ok(Self { text: text.to_string(), kind })
    }

    /// Build a query from an untyped kind label.
    pub fn parse(text: &str, kind: &str) -> Result<Self> {
        Self::new(text, kind.parse()?)
    }
}

// ---------------------------------------------------------------------------
// Target sequence
// ---------------------------------------------------------------------------

/// Normalised amino-acid sequence: uppercase, standard residues only,
/// non-empty and no longer than the configured maximum.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetSequence(String);

impl TargetSequence {
    /// Strict parse of user input. FASTA header lines are skipped and
    /// separators stripped; any other non-standard character is rejected.
    /// Sequences longer than `max_len` are truncated.
    pub fn parse(raw: &str, max_len: usize) -> Result<Self> {
        let mut normalised = String::with_capacity(raw.len());
        for line in raw.lines().filter(|l| !l.trim_start().starts_with('>')) {
            for c in line.chars().filter(|c| !is_sequence_separator(*c)) {
                let upper = c.to_ascii_uppercase();
                if !is_standard_residue(upper) {
                    return Err(BindoraError::Validation(format!(
                        "Invalid amino acid '{}' at position {}",
                        c,
                        normalised.len() + 1
                    )));
                }
                normalised.push(upper);
            }
        }

        if normalised.is_empty() {
            return Err(BindoraError::Validation("Empty protein sequence provided".to_string()));
        }

        Ok(Self::truncated(normalised, max_len))
    }

    /// Lenient normalisation for sequences returned by upstream databases,
    /// which may carry ambiguity codes (X, B, Z) or selenocysteine (U).
    /// Non-standard residues are removed; `None` when nothing remains.
    pub fn from_upstream(raw: &str, max_len: usize) -> Option<Self> {
        let normalised: String = raw
            .lines()
            .filter(|l| !l.trim_start().starts_with('>'))
            .flat_map(|l| l.chars())
            .map(|c| c.to_ascii_uppercase())
            .filter(|c| is_standard_residue(*c))
            .collect();

        if normalised.is_empty() {
            None
        } else {
            Some(Self::truncated(normalised, max_len))
        }
    }

    fn truncated(mut sequence: String, max_len: usize) -> Self {
        if max_len > 0 && sequence.len() > max_len {
            tracing::debug!(
                original_length = sequence.len(),
                max_len,
                "Truncating target sequence"
            );
            sequence.truncate(max_len);
        }
        Self(sequence)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Hex SHA-256 of the sequence; identifies the target in predictions.
    pub fn digest(&self) -> String {
        format!("{:x}", Sha256::digest(self.0.as_bytes()))
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for TargetSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Molecules
// ---------------------------------------------------------------------------

/// Physico-chemical descriptors. Fields are optional because catalog
/// sources report only a subset; enrichment fills the rest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MolecularProperties {
    pub molecular_weight: Option<f64>,
    pub logp: Option<f64>,
    pub hbd: Option<u32>,
    pub hba: Option<u32>,
    pub tpsa: Option<f64>,
    pub rotatable_bonds: Option<u32>,
    pub aromatic_rings: Option<u32>,
}

impl MolecularProperties {
    /// True when every descriptor is present.
    pub fn is_complete(&self) -> bool {
        self.molecular_weight.is_some()
            && self.logp.is_some()
            && self.hbd.is_some()
            && self.hba.is_some()
            && self.tpsa.is_some()
            && self.rotatable_bonds.is_some()
            && self.aromatic_rings.is_some()
    }

    /// Fill every missing descriptor from `other`, keeping values already present.
    pub fn fill_missing(&mut self, other: &MolecularProperties) {
        self.molecular_weight = self.molecular_weight.or(other.molecular_weight);
        self.logp = self.logp.or(other.logp);
        self.hbd = self.hbd.or(other.hbd);
        self.hba = self.hba.or(other.hba);
        self.tpsa = self.tpsa.or(other.tpsa);
        self.rotatable_bonds = self.rotatable_bonds.or(other.rotatable_bonds);
        self.aromatic_rings = self.aromatic_rings.or(other.aromatic_rings);
    }

    /// Replace any remaining gaps with zero defaults.
    pub fn with_defaults(mut self) -> Self {
        self.molecular_weight.get_or_insert(0.0);
        self.logp.get_or_insert(0.0);
        self.hbd.get_or_insert(0);
        self.hba.get_or_insert(0);
        self.tpsa.get_or_insert(0.0);
        self.rotatable_bonds.get_or_insert(0);
        self.aromatic_rings.get_or_insert(0);
        self
    }
}

/// A catalog molecule. Read-only input to the search core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoleculeCandidate {
    pub id: String,
    /// Line-notation structure (SMILES).
    pub structure: String,
    pub name: Option<String>,
    /// Clinical phase, 0 = preclinical … 4 = approved.
    pub clinical_phase: u8,
    pub properties: Option<MolecularProperties>,
}

impl MoleculeCandidate {
    pub fn new(id: impl Into<String>, structure: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            structure: structure.into(),
            name: None,
            clinical_phase: 0,
            properties: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the clinical phase, clamped to 0–4.
    pub fn with_phase(mut self, phase: u8) -> Self {
        self.clinical_phase = phase.min(4);
        self
    }

    pub fn with_properties(mut self, properties: MolecularProperties) -> Self {
        self.properties = Some(properties);
        self
    }
}

// ---------------------------------------------------------------------------
// Predictions
// ---------------------------------------------------------------------------

/// One scored target/molecule pair. Created per search, never persisted here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub target_digest: String,
    pub molecule_id: String,
    /// Raw cosine similarity in [-1, 1].
    pub similarity: f64,
    /// Binding score in [0, 100].
    pub score: f64,
    pub num_targets_tested: usize,
}

impl Prediction {
    pub fn new(
        target_digest: impl Into<String>,
        molecule_id: impl Into<String>,
        similarity: f64,
        score: f64,
    ) -> Self {
        Self {
            target_digest: target_digest.into(),
            molecule_id: molecule_id.into(),
            similarity,
            score,
            num_targets_tested: 1,
        }
    }
}

/// Final search record handed to the API layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedPrediction {
    pub id: String,
    pub score: f64,
    pub num_targets_tested: usize,
    pub structure: String,
    pub name: Option<String>,
    pub clinical_phase: u8,
    pub properties: MolecularProperties,
    pub is_drug_like: bool,
    /// Digest of the target that produced the best score.
    pub target_digest: String,
    pub similarity: f64,
}

// ---------------------------------------------------------------------------
// Lookups
// ---------------------------------------------------------------------------

/// Annotation for one protein target, as reported by the sequence source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TargetInfo {
    pub accession: String,
    pub name: Option<String>,
    pub gene: Option<String>,
    pub organism: Option<String>,
    pub sequence_length: Option<usize>,
    pub function: Option<String>,
    #[serde(default)]
    pub subcellular_locations: Vec<String>,
    #[serde(default)]
    pub go_terms: Vec<String>,
    #[serde(default)]
    pub diseases: Vec<String>,
}

/// A catalog molecule structurally close to a query structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarMolecule {
    pub id: String,
    pub name: Option<String>,
    pub structure: String,
    /// Tanimoto coefficient of the two fingerprints, in [0, 1].
    pub similarity: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_query_kind_parse() {
        assert_eq!("Gene".parse::<QueryKind>().unwrap(), QueryKind::Gene);
        assert_eq!(" disease ".parse::<QueryKind>().unwrap(), QueryKind::Disease);
        let err = "protein".parse::<QueryKind>().unwrap_err();
        assert!(matches!(err, BindoraError::Validation(_)));
    }

    #[test]
    fn test_empty_query_rejected() {
        for kind in [QueryKind::Disease, QueryKind::Gene, QueryKind::Sequence] {
            let err = Query::new("   ", kind).unwrap_err();
            assert!(matches!(err, BindoraError::Validation(_)));
        }
    }

    #[test]
    fn test_sequence_parse_normalises() {
        let seq = TargetSequence::parse("mkti iala\nSYIF-CLVFA", 1024).unwrap();
        assert_eq!(seq.as_str(), "MKTIIALASYIFCLVFA");
    }

    #[test]
    fn test_sequence_parse_skips_fasta_header() {
        let fasta = ">sp|P01116|RAS_HUMAN GTPase KRas\nMTEYKLVVVG\nAGGVGKSALT";
        let seq = TargetSequence::parse(fasta, 1024).unwrap();
        assert_eq!(seq.as_str(), "MTEYKLVVVGAGGVGKSALT");
    }

    #[test]
    fn test_sequence_invalid_residue_is_validation_error() {
        let err = TargetSequence::parse("MKTIXALSY", 1024).unwrap_err();
        match err {
            BindoraError::Validation(msg) => assert!(msg.contains("position 5"), "{msg}"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_sequence_truncated_not_rejected() {
        let seq = TargetSequence::parse("ACDEFGHIKL", 4).unwrap();
        assert_eq!(seq.as_str(), "ACDE");
    }

    #[test]
    fn test_upstream_sequence_drops_nonstandard() {
        let seq = TargetSequence::from_upstream("mkxuTIB", 1024).unwrap();
        assert_eq!(seq.as_str(), "MKTI");
        assert!(TargetSequence::from_upstream("XXXX", 1024).is_none());
    }

    #[test]
    fn test_digest_is_stable() {
        let a = TargetSequence::parse("MKTIIALSYIFCLVFA", 1024).unwrap();
        let b = TargetSequence::parse("mktiialsyifclvfa", 1024).unwrap();
        assert_eq!(a.digest(), b.digest());
        assert_eq!(a.digest().len(), 64);
    }

    #[test]
    fn test_fill_missing_keeps_existing() {
        let mut props = MolecularProperties {
            molecular_weight: Some(180.16),
            ..Default::default()
        };
        let computed = MolecularProperties {
            molecular_weight: Some(999.0),
            logp: Some(1.2),
            hbd: Some(1),
            hba: Some(4),
            tpsa: Some(63.6),
            rotatable_bonds: Some(3),
            aromatic_rings: Some(1),
        };
        props.fill_missing(&computed);
        assert_eq!(props.molecular_weight, Some(180.16));
        assert_eq!(props.logp, Some(1.2));
        assert!(props.is_complete());
    }

    #[test]
    fn test_phase_clamped() {
        let m = MoleculeCandidate::new("CHEMBL25", "CC(=O)Oc1ccccc1C(=O)O").with_phase(9);
        assert_eq!(m.clinical_phase, 4);
    }
}
