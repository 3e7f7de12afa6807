//! Built-in catalog of approved small-molecule drugs. Used when no remote
//! catalog is configured and as a fixed fixture for offline runs.

use async_trait::async_trait;

use bindora_common::{MoleculeCandidate, Result};

use crate::CatalogSource;

/// (id, name, SMILES)
const APPROVED_DRUGS: &[(&str, &str, &str)] = &[
    ("CHEMBL25", "Aspirin", "CC(=O)Oc1ccccc1C(=O)O"),
    ("CHEMBL192", "Ibuprofen", "CC(C)Cc1ccc(cc1)C(C)C(=O)O"),
    ("CHEMBL502", "Paracetamol", "CC(=O)Nc1ccc(O)cc1"),
    ("CHEMBL1201247", "Metformin", "CN(C)C(=N)NC(=N)N"),
    ("CHEMBL12", "Atenolol", "CC(C)NCC(O)COc1ccc(CC(N)=O)cc1"),
    ("CHEMBL113", "Caffeine", "Cn1cnc2c1c(=O)n(C)c(=O)n2C"),
    ("CHEMBL941", "Imatinib", "Cc1ccc(NC(=O)c2ccc(CN3CCN(C)CC3)cc2)cc1Nc1nccc(-c2cccnc2)n1"),
    ("CHEMBL939", "Gefitinib", "COc1cc2ncnc(Nc3ccc(F)c(Cl)c3)c2cc1OCCCN1CCOCC1"),
];

#[derive(Debug, Default, Clone)]
pub struct BuiltinCatalog;

impl BuiltinCatalog {
    pub fn new() -> Self {
        Self
    }

    pub fn molecules() -> Vec<MoleculeCandidate> {
        APPROVED_DRUGS
            .iter()
            .map(|(id, name, smiles)| MoleculeCandidate::new(*id, *smiles).with_name(*name).with_phase(4))
            .collect()
    }
}

#[async_trait]
impl CatalogSource for BuiltinCatalog {
    async fn fetch_catalog(&self, limit: usize) -> Result<Vec<MoleculeCandidate>> {
        Ok(Self::molecules().into_iter().take(limit).collect())
    }

    async fn fetch_molecule(&self, id: &str) -> Result<Option<MoleculeCandidate>> {
        let id = id.trim();
        Ok(Self::molecules().into_iter().find(|m| m.id.eq_ignore_ascii_case(id)))
    }

    fn name(&self) -> &str {
        "builtin"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[tokio::test]
    async fn test_lookup_by_id() {
        let catalog = BuiltinCatalog::new();
        let imatinib = catalog.fetch_molecule("chembl941").await.unwrap().unwrap();
        assert_eq!(imatinib.name.as_deref(), Some("Imatinib"));
        assert!(catalog.fetch_molecule("CHEMBL0").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_catalog_respects_limit() {
        let catalog = BuiltinCatalog::new();
        assert_eq!(catalog.fetch_catalog(100).await.unwrap().len(), APPROVED_DRUGS.len());
        assert_eq!(catalog.fetch_catalog(3).await.unwrap().len(), 3);
    }

    #[test]
    fn test_ids_unique_and_named() {
        let molecules = BuiltinCatalog::molecules();
        let ids: HashSet<&str> = molecules.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids.len(), molecules.len());
        assert!(molecules.iter().all(|m| m.name.is_some() && m.clinical_phase == 4));
    }
}
