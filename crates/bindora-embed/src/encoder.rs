//! Encoder traits. A search pairs one [`TargetEncoder`] with one
//! [`MoleculeEncoder`] of the same dimension.

use async_trait::async_trait;

use bindora_common::{MolecularProperties, Result};

use crate::druglike::{self, DrugLikeness};

#[async_trait]
pub trait TargetEncoder: Send + Sync {
    /// Identifier used to namespace cached embeddings.
    fn model_name(&self) -> &str;

    fn dimension(&self) -> usize;

    /// Embed a normalised protein sequence.
    async fn encode_target(&self, sequence: &str) -> Result<Vec<f32>>;
}

#[async_trait]
pub trait MoleculeEncoder: Send + Sync {
    fn model_name(&self) -> &str;

    fn dimension(&self) -> usize;

    /// Fingerprint a structure. Malformed input is an `Encoding` error.
    async fn encode_molecule(&self, structure: &str) -> Result<Vec<f32>>;

    async fn descriptors(&self, structure: &str) -> Result<MolecularProperties>;

    fn check_drug_likeness(&self, properties: &MolecularProperties) -> DrugLikeness {
        druglike::assess(properties)
    }
}
