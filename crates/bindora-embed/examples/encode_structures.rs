//! Fingerprint a few structures with the stub encoder and print descriptors.
//!
//! ```bash
//! cargo run --package bindora-embed --example encode_structures
//! ```

use bindora_embed::{MoleculeEncoder, StubMoleculeEncoder};

#[tokio::main]
async fn main() -> bindora_common::Result<()> {
    let encoder = StubMoleculeEncoder::new("bindora-stub-v1", 2048, 2);

    let structures = [
        ("aspirin", "CC(=O)Oc1ccccc1C(=O)O"),
        ("ibuprofen", "CC(C)Cc1ccc(cc1)C(C)C(=O)O"),
        ("caffeine", "Cn1cnc2c1c(=O)n(C)c(=O)n2C"),
    ];

    let start = std::time::Instant::now();
    let mut fingerprints = Vec::with_capacity(structures.len());
    for (name, smiles) in &structures {
        let fp = encoder.encode_molecule(smiles).await?;
        let props = encoder.descriptors(smiles).await?;
        let verdict = encoder.check_drug_likeness(&props);
        println!(
            "{:<10} bits={:<4} MW={:?} logP={:?} HBD={:?} HBA={:?} drug-like={}",
            name,
            fp.iter().filter(|b| **b > 0.0).count(),
            props.molecular_weight,
            props.logp,
            props.hbd,
            props.hba,
            verdict.is_drug_like
        );
        fingerprints.push(fp);
    }
    println!("Encoded {} structures in {:.2}ms", structures.len(), start.elapsed().as_secs_f64() * 1000.0);

    // Shared on-bits between each pair
    println!("\nShared bits:");
    for i in 0..fingerprints.len() {
        for j in (i + 1)..fingerprints.len() {
            let shared = fingerprints[i]
                .iter()
                .zip(&fingerprints[j])
                .filter(|(a, b)| **a > 0.0 && **b > 0.0)
                .count();
            println!("  {} / {}: {}", structures[i].0, structures[j].0, shared);
        }
    }

    Ok(())
}
