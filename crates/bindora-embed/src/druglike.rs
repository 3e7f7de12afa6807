//! Drug-likeness assessment (Lipinski Rule of Five).

use serde::{Deserialize, Serialize};

use bindora_common::MolecularProperties;

/// Rule-of-five verdict for a molecule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrugLikeness {
    pub ro5_violations: u32,
    pub qed_estimate: f64,
    pub is_drug_like: bool,
}

/// Assess a molecule. Missing properties count as satisfied.
pub fn assess(properties: &MolecularProperties) -> DrugLikeness {
    let mut violations = 0;
    if properties.molecular_weight.is_some_and(|mw| mw >= 500.0) { violations += 1; }
    if properties.logp.is_some_and(|logp| logp >= 5.0) { violations += 1; }
    if properties.hbd.is_some_and(|hbd| hbd > 5) { violations += 1; }
    if properties.hba.is_some_and(|hba| hba > 10) { violations += 1; }

    let qed = 1.0 - (violations as f64 * 0.2).min(0.8);

    DrugLikeness {
        ro5_violations: violations,
        qed_estimate: qed,
        is_drug_like: violations == 0,
    }
}
