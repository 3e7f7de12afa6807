//! Molecular properties and drug-likeness for catalog molecules.

use serde::{Deserialize, Serialize};
use tracing::warn;

use bindora_common::{EnrichedPrediction, MolecularProperties, MoleculeCandidate, Prediction, Result};
use bindora_embed::{DrugLikeness, MoleculeEncoder};

/// Catalog properties completed with computed descriptors.
///
/// Precomputed values win; descriptors only fill gaps. Fails when the
/// structure cannot be parsed and the catalog gave no properties at all.
pub async fn complete_properties(
    encoder: &dyn MoleculeEncoder,
    candidate: &MoleculeCandidate,
) -> Result<MolecularProperties> {
    let mut properties = candidate.properties.clone().unwrap_or_default();
    if properties.is_complete() {
        return Ok(properties);
    }
    match encoder.descriptors(&candidate.structure).await {
        Ok(computed) => {
            properties.fill_missing(&computed);
            Ok(properties)
        }
        Err(e) if candidate.properties.is_some() => {
            warn!(molecule_id = %candidate.id, error = %e, "Descriptor computation failed, keeping catalog properties");
            Ok(properties)
        }
        Err(e) => Err(e),
    }
}

/// Like [`complete_properties`] but never fails: gaps become defaults.
pub async fn properties_or_defaults(
    encoder: &dyn MoleculeEncoder,
    candidate: &MoleculeCandidate,
) -> MolecularProperties {
    match complete_properties(encoder, candidate).await {
        Ok(properties) => properties.with_defaults(),
        Err(e) => {
            warn!(molecule_id = %candidate.id, error = %e, "Descriptor computation failed, using defaults");
            candidate.properties.clone().unwrap_or_default().with_defaults()
        }
    }
}

pub fn enrich(
    prediction: Prediction,
    candidate: &MoleculeCandidate,
    properties: MolecularProperties,
    is_drug_like: bool,
) -> EnrichedPrediction {
    EnrichedPrediction {
        id: prediction.molecule_id,
        score: prediction.score,
        num_targets_tested: prediction.num_targets_tested,
        structure: candidate.structure.clone(),
        name: candidate.name.clone(),
        clinical_phase: candidate.clinical_phase,
        properties: properties.with_defaults(),
        is_drug_like,
        target_digest: prediction.target_digest,
        similarity: prediction.similarity,
    }
}

/// A catalog molecule with its properties and rule-of-five verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoleculeDetails {
    pub id: String,
    pub structure: String,
    pub name: Option<String>,
    pub clinical_phase: u8,
    pub properties: MolecularProperties,
    pub drug_likeness: DrugLikeness,
}

pub async fn details(encoder: &dyn MoleculeEncoder, candidate: &MoleculeCandidate) -> MoleculeDetails {
    let properties = properties_or_defaults(encoder, candidate).await;
    let drug_likeness = encoder.check_drug_likeness(&properties);
    MoleculeDetails {
        id: candidate.id.clone(),
        structure: candidate.structure.clone(),
        name: candidate.name.clone(),
        clinical_phase: candidate.clinical_phase,
        properties,
        drug_likeness,
    }
}
