//! Deterministic in-process encoders.
//!
//! Target embeddings are pseudo-random vectors seeded from the SHA-256 of the
//! sequence. Molecule fingerprints hash circular atom environments, so
//! structurally similar molecules share bits.

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sha2::{Digest, Sha256};
use tracing::trace;

use bindora_common::{MolecularProperties, Result};

use crate::descriptors;
use crate::encoder::{MoleculeEncoder, TargetEncoder};
use crate::smiles::Molecule;

fn sha256(bytes: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hasher.finalize().into()
}

fn hash_u64(bytes: &[u8]) -> u64 {
    let digest = sha256(bytes);
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(head)
}

// ── Target ──────────────────────────────────────────────────────────────────

pub struct StubTargetEncoder {
    model: String,
    dimension: usize,
}

impl StubTargetEncoder {
    pub fn new(model: impl Into<String>, dimension: usize) -> Self {
        Self { model: model.into(), dimension }
    }

    pub fn embed(&self, sequence: &str) -> Vec<f32> {
        let mut rng = StdRng::from_seed(sha256(sequence.as_bytes()));
        (0..self.dimension).map(|_| rng.gen_range(-1.0f32..=1.0)).collect()
    }
}

#[async_trait]
impl TargetEncoder for StubTargetEncoder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn encode_target(&self, sequence: &str) -> Result<Vec<f32>> {
        Ok(self.embed(sequence))
    }
}

// ── Molecule ────────────────────────────────────────────────────────────────

pub struct StubMoleculeEncoder {
    model: String,
    dimension: usize,
    radius: u32,
}

impl StubMoleculeEncoder {
    pub fn new(model: impl Into<String>, dimension: usize, radius: u32) -> Self {
        Self { model: model.into(), dimension, radius }
    }

    /// Hashed circular fingerprint as 0/1 floats.
    pub fn fingerprint(&self, mol: &Molecule) -> Vec<f32> {
        let mut bits = vec![0.0f32; self.dimension];
        if self.dimension == 0 {
            return bits;
        }

        let heavy: Vec<usize> = (0..mol.atoms.len()).filter(|i| !mol.is_hydrogen(*i)).collect();

        // Radius 0: atom invariants.
        let mut ids = vec![0u64; mol.atoms.len()];
        for &i in &heavy {
            let atom = &mol.atoms[i];
            let invariant = format!(
                "{}|{}|{}|{}|{}|{}",
                atom.element,
                atom.aromatic as u8,
                mol.heavy_degree(i),
                mol.total_h(i),
                atom.charge,
                mol.atom_in_ring(i) as u8
            );
            ids[i] = hash_u64(invariant.as_bytes());
        }
        for &i in &heavy {
            bits[(ids[i] % self.dimension as u64) as usize] = 1.0;
        }

        for round in 1..=self.radius {
            let mut next = ids.clone();
            for &i in &heavy {
                let mut env: Vec<(u8, u64)> = mol
                    .neighbors(i)
                    .iter()
                    .filter(|(n, _)| !mol.is_hydrogen(*n))
                    .map(|(n, b)| (mol.bond_code(*b), ids[*n]))
                    .collect();
                env.sort_unstable();

                let mut buf = Vec::with_capacity(12 + env.len() * 9);
                buf.extend_from_slice(&round.to_le_bytes());
                buf.extend_from_slice(&ids[i].to_le_bytes());
                for (code, id) in env {
                    buf.push(code);
                    buf.extend_from_slice(&id.to_le_bytes());
                }
                next[i] = hash_u64(&buf);
                bits[(next[i] % self.dimension as u64) as usize] = 1.0;
            }
            ids = next;
        }

        trace!(
            atoms = heavy.len(),
            active_bits = bits.iter().filter(|b| **b > 0.0).count(),
            "Computed fingerprint"
        );
        bits
    }
}

#[async_trait]
impl MoleculeEncoder for StubMoleculeEncoder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn encode_molecule(&self, structure: &str) -> Result<Vec<f32>> {
        let mol = Molecule::parse(structure)?;
        Ok(self.fingerprint(&mol))
    }

    async fn descriptors(&self, structure: &str) -> Result<MolecularProperties> {
        let mol = Molecule::parse(structure)?;
        Ok(descriptors::estimate(&mol))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bindora_common::BindoraError;

    const ASPIRIN: &str = "CC(=O)Oc1ccccc1C(=O)O";

    fn overlap(a: &[f32], b: &[f32]) -> usize {
        a.iter().zip(b).filter(|(x, y)| **x > 0.0 && **y > 0.0).count()
    }

    #[tokio::test]
    async fn test_target_embedding_deterministic() {
        let enc = StubTargetEncoder::new("stub", 64);
        let a = enc.encode_target("MKTIIALSYIFCLVFA").await.unwrap();
        let b = enc.encode_target("MKTIIALSYIFCLVFA").await.unwrap();
        let c = enc.encode_target("MKTIIALSYIFCLVFG").await.unwrap();
        assert_eq!(a.len(), 64);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.iter().all(|v| (-1.0..=1.0).contains(v)));
    }

    #[tokio::test]
    async fn test_fingerprint_is_binary_and_sized() {
        let enc = StubMoleculeEncoder::new("stub", 2048, 2);
        let fp = enc.encode_molecule(ASPIRIN).await.unwrap();
        assert_eq!(fp.len(), 2048);
        assert!(fp.iter().all(|b| *b == 0.0 || *b == 1.0));
        assert!(fp.iter().any(|b| *b == 1.0));
    }

    #[tokio::test]
    async fn test_similar_structures_share_more_bits() {
        let enc = StubMoleculeEncoder::new("stub", 2048, 2);
        let aspirin = enc.encode_molecule(ASPIRIN).await.unwrap();
        let salicylic = enc.encode_molecule("Oc1ccccc1C(=O)O").await.unwrap();
        let metformin = enc.encode_molecule("CN(C)C(=N)NC(=N)N").await.unwrap();
        assert!(overlap(&aspirin, &salicylic) > overlap(&aspirin, &metformin));
    }

    #[tokio::test]
    async fn test_malformed_structure_is_encoding_error() {
        let enc = StubMoleculeEncoder::new("stub", 128, 2);
        let err = enc.encode_molecule("C1CC(").await.unwrap_err();
        assert!(matches!(err, BindoraError::Encoding(_)));
    }

    #[tokio::test]
    async fn test_descriptors_and_drug_likeness() {
        let enc = StubMoleculeEncoder::new("stub", 128, 2);
        let props = enc.descriptors(ASPIRIN).await.unwrap();
        assert!(props.is_complete());
        assert!(enc.check_drug_likeness(&props).is_drug_like);
    }
}
