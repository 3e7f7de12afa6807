//! ChEMBL approved-drug catalog.
//!
//! API: https://www.ebi.ac.uk/chembl/api/data/molecule.json?max_phase=4
//! Single molecules: `/molecule/{chembl_id}.json`.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, instrument};

use bindora_common::{
    retry_with_backoff, GuardedClient, MolecularProperties, MoleculeCandidate, Result, RetryPolicy,
};

use crate::CatalogSource;

#[derive(Debug, Deserialize)]
struct ChemblMoleculeResponse {
    #[serde(default)]
    molecules: Vec<ChemblMoleculeData>,
}

#[derive(Debug, Deserialize)]
struct ChemblMoleculeData {
    molecule_chembl_id: String,
    pref_name: Option<String>,
    #[serde(default)]
    max_phase: Value,
    molecule_structures: Option<ChemblMoleculeStructures>,
    molecule_properties: Option<ChemblMoleculeProperties>,
}

#[derive(Debug, Deserialize)]
struct ChemblMoleculeStructures {
    canonical_smiles: Option<String>,
}

/// ChEMBL reports numbers as strings or numbers depending on the field.
#[derive(Debug, Deserialize, Default)]
struct ChemblMoleculeProperties {
    #[serde(default)]
    full_mwt: Value,
    #[serde(default)]
    alogp: Value,
    #[serde(default)]
    hbd: Value,
    #[serde(default)]
    hba: Value,
    #[serde(default)]
    psa: Value,
    #[serde(default)]
    rtb: Value,
    #[serde(default)]
    aromatic_rings: Value,
}

fn lenient_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn lenient_u32(value: &Value) -> Option<u32> {
    lenient_f64(value).filter(|v| *v >= 0.0).map(|v| v.round() as u32)
}

impl ChemblMoleculeProperties {
    fn to_properties(&self) -> MolecularProperties {
        MolecularProperties {
            molecular_weight: lenient_f64(&self.full_mwt),
            logp: lenient_f64(&self.alogp),
            hbd: lenient_u32(&self.hbd),
            hba: lenient_u32(&self.hba),
            tpsa: lenient_f64(&self.psa),
            rotatable_bonds: lenient_u32(&self.rtb),
            aromatic_rings: lenient_u32(&self.aromatic_rings),
        }
    }
}

impl ChemblMoleculeData {
    /// `None` when the entry has no canonical structure.
    fn into_candidate(self) -> Option<MoleculeCandidate> {
        let smiles = self
            .molecule_structures
            .and_then(|s| s.canonical_smiles)
            .filter(|s| !s.trim().is_empty())?;
        let phase = lenient_f64(&self.max_phase).unwrap_or(0.0).clamp(0.0, 4.0) as u8;

        let mut candidate = MoleculeCandidate::new(self.molecule_chembl_id, smiles).with_phase(phase);
        if let Some(name) = self.pref_name {
            candidate = candidate.with_name(name);
        }
        if let Some(props) = self.molecule_properties {
            candidate = candidate.with_properties(props.to_properties());
        }
        Some(candidate)
    }
}

pub struct ChemblCatalog {
    client: GuardedClient,
    base_url: String,
    retry: RetryPolicy,
}

impl ChemblCatalog {
    pub fn new(client: GuardedClient, base_url: &str, retry: RetryPolicy) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            retry,
        }
    }

    pub fn catalog_url(&self, limit: usize) -> String {
        format!("{}/molecule.json?max_phase=4&limit={}", self.base_url, limit)
    }

    /// `None` unless `id` has the `CHEMBL<digits>` shape.
    pub fn molecule_url(&self, id: &str) -> Option<String> {
        let id = id.trim().to_ascii_uppercase();
        let digits = id.strip_prefix("CHEMBL")?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        Some(format!("{}/molecule/{}.json", self.base_url, id))
    }
}

#[async_trait]
impl CatalogSource for ChemblCatalog {
    #[instrument(skip(self))]
    async fn fetch_catalog(&self, limit: usize) -> Result<Vec<MoleculeCandidate>> {
        let url = self.catalog_url(limit);
        let url = url.as_str();
        let client = &self.client;
        let body: Option<ChemblMoleculeResponse> = retry_with_backoff(&self.retry, "chembl catalog", move || async move {
            client.get_json(url).await
        })
        .await?;

        let raw = body.map(|b| b.molecules).unwrap_or_default();
        let total = raw.len();
        let molecules: Vec<MoleculeCandidate> = raw
            .into_iter()
            .filter_map(ChemblMoleculeData::into_candidate)
            .collect();
        if molecules.len() < total {
            debug!(skipped = total - molecules.len(), "Skipped ChEMBL entries without a structure");
        }
        info!(count = molecules.len(), "Loaded ChEMBL catalog");
        Ok(molecules)
    }

    #[instrument(skip(self))]
    async fn fetch_molecule(&self, id: &str) -> Result<Option<MoleculeCandidate>> {
        let Some(url) = self.molecule_url(id) else {
            debug!("Not a ChEMBL id");
            return Ok(None);
        };
        let url = url.as_str();
        let client = &self.client;
        let body: Option<ChemblMoleculeData> = retry_with_backoff(&self.retry, "chembl molecule", move || async move {
            client.get_json(url).await
        })
        .await?;
        Ok(body.and_then(ChemblMoleculeData::into_candidate))
    }

    fn name(&self) -> &str {
        "chembl"
    }
}
