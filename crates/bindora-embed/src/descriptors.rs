//! Physicochemical descriptors estimated from a parsed structure.
//!
//! These are fast additive estimates, not reference values: molecular weight
//! is exact for well-formed organic SMILES, logP and TPSA use per-atom
//! contribution tables.

use bindora_common::MolecularProperties;

use crate::smiles::{BondOrder, Molecule};

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

fn logp_contribution(element: &str, aromatic: bool) -> f64 {
    match (element, aromatic) {
        ("C", false) => 0.36,
        ("C", true) => 0.29,
        ("O", _) => -0.4,
        ("N", _) => -0.7,
        ("S", _) => 0.6,
        ("Cl", _) => 0.65,
        ("Br", _) => 0.86,
        ("F", _) => 0.14,
        ("I", _) => 1.1,
        ("P", _) => -0.2,
        _ => 0.0,
    }
}

fn has_double_bond(mol: &Molecule, atom: usize) -> bool {
    mol.neighbors(atom)
        .iter()
        .any(|(_, b)| mol.bonds[*b].order == BondOrder::Double)
}

fn tpsa_contribution(mol: &Molecule, atom: usize) -> f64 {
    let a = &mol.atoms[atom];
    let h = mol.total_h(atom);
    match a.element.as_str() {
        "O" if a.aromatic => 13.14,
        "O" if h > 0 => 20.23,
        "O" if has_double_bond(mol, atom) => 17.07,
        "O" => 9.23,
        "N" if a.aromatic && h > 0 => 15.79,
        "N" if a.aromatic => 12.89,
        "N" if h >= 2 => 26.02,
        "N" if h == 1 => 12.03,
        "N" if has_double_bond(mol, atom) => 12.36,
        "N" => 3.24,
        _ => 0.0,
    }
}

/// Acyclic single bonds between heavy atoms that both have another heavy neighbour.
fn rotatable_bonds(mol: &Molecule) -> u32 {
    (0..mol.bonds.len())
        .filter(|&b| {
            let bond = &mol.bonds[b];
            bond.order == BondOrder::Single
                && !mol.is_hydrogen(bond.a)
                && !mol.is_hydrogen(bond.b)
                && mol.heavy_degree(bond.a) > 1
                && mol.heavy_degree(bond.b) > 1
                && !mol.bond_in_ring(b)
        })
        .count() as u32
}

/// Ring closures between aromatic atoms; one per aromatic ring for
/// conventionally written SMILES.
fn aromatic_rings(mol: &Molecule) -> u32 {
    mol.bonds
        .iter()
        .filter(|b| b.ring_closure && mol.atoms[b.a].aromatic && mol.atoms[b.b].aromatic)
        .count() as u32
}

pub fn estimate(mol: &Molecule) -> MolecularProperties {
    let mut weight = 0.0;
    let mut logp = 0.0;
    let mut tpsa = 0.0;
    let mut hbd = 0;
    let mut hba = 0;

    for (i, atom) in mol.atoms.iter().enumerate() {
        weight += crate::smiles::atomic_mass(&atom.element);
        if mol.is_hydrogen(i) {
            continue;
        }
        weight += mol.implicit_h(i) as f64 * crate::smiles::atomic_mass("H");
        logp += logp_contribution(&atom.element, atom.aromatic);
        tpsa += tpsa_contribution(mol, i);

        if matches!(atom.element.as_str(), "N" | "O") {
            hba += 1;
            if mol.total_h(i) > 0 {
                hbd += 1;
            }
        }
    }

    MolecularProperties {
        molecular_weight: Some(round2(weight)),
        logp: Some(round2(logp)),
        hbd: Some(hbd),
        hba: Some(hba),
        tpsa: Some(round2(tpsa)),
        rotatable_bonds: Some(rotatable_bonds(mol)),
        aromatic_rings: Some(aromatic_rings(mol)),
    }
}
