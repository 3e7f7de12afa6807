//! Minimal SMILES reader.
//!
//! Supports the organic subset (`B C N O P S F Cl Br I`), aromatic atoms
//! (`b c n o p s`), bracket atoms with isotope, chirality, hydrogen count,
//! charge and class, the bond symbols `- = # $ : / \`, branches, ring
//! closures (single digits and `%nn`), and `.`-separated components.
//! Stereo marks are accepted and ignored.

use std::collections::HashMap;

use bindora_common::{BindoraError, Result};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BondOrder {
    Single,
    Double,
    Triple,
    Quadruple,
    Aromatic,
}

impl BondOrder {
    /// Contribution to an atom's bond-order sum.
    pub fn valence(self) -> f64 {
        match self {
            BondOrder::Single => 1.0,
            BondOrder::Double => 2.0,
            BondOrder::Triple => 3.0,
            BondOrder::Quadruple => 4.0,
            BondOrder::Aromatic => 1.5,
        }
    }

    fn code(self) -> u8 {
        match self {
            BondOrder::Single => 1,
            BondOrder::Double => 2,
            BondOrder::Triple => 3,
            BondOrder::Quadruple => 4,
            BondOrder::Aromatic => 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Atom {
    /// Capitalised element symbol, or `*` for a wildcard.
    pub element: String,
    pub aromatic: bool,
    /// Hydrogen count written inside brackets. `None` for organic-subset atoms.
    pub bracket_h: Option<u8>,
    pub charge: i8,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Bond {
    pub a: usize,
    pub b: usize,
    pub order: BondOrder,
    /// Closed by a ring-closure digit rather than by adjacency.
    pub ring_closure: bool,
}

/// Parsed molecular graph.
#[derive(Debug, Clone, Default)]
pub struct Molecule {
    pub atoms: Vec<Atom>,
    pub bonds: Vec<Bond>,
    adjacency: Vec<Vec<(usize, usize)>>,
}

struct ElementInfo {
    mass: f64,
    /// Admissible valences for implicit hydrogen, ascending.
    valences: &'static [u8],
}

fn element_info(symbol: &str) -> Option<ElementInfo> {
    let (mass, valences): (f64, &'static [u8]) = match symbol {
        "H" => (1.008, &[1]),
        "B" => (10.81, &[3]),
        "C" => (12.011, &[4]),
        "N" => (14.007, &[3, 5]),
        "O" => (15.999, &[2]),
        "F" => (18.998, &[1]),
        "P" => (30.974, &[3, 5]),
        "S" => (32.06, &[2, 4, 6]),
        "Cl" => (35.45, &[1]),
        "Br" => (79.904, &[1]),
        "I" => (126.904, &[1]),
        "Li" => (6.94, &[]),
        "Na" => (22.990, &[]),
        "Mg" => (24.305, &[]),
        "Al" => (26.982, &[]),
        "Si" => (28.085, &[]),
        "K" => (39.098, &[]),
        "Ca" => (40.078, &[]),
        "Mn" => (54.938, &[]),
        "Fe" => (55.845, &[]),
        "Co" => (58.933, &[]),
        "Cu" => (63.546, &[]),
        "Zn" => (65.38, &[]),
        "As" => (74.922, &[]),
        "Se" => (78.971, &[]),
        "Tc" => (98.0, &[]),
        "Ag" => (107.868, &[]),
        "Pt" => (195.084, &[]),
        "Au" => (196.967, &[]),
        "Hg" => (200.592, &[]),
        "Gd" => (157.25, &[]),
        "*" => (0.0, &[]),
        _ => return None,
    };
    Some(ElementInfo { mass, valences })
}

pub fn atomic_mass(symbol: &str) -> f64 {
    element_info(symbol).map(|e| e.mass).unwrap_or(0.0)
}

fn err(msg: impl Into<String>) -> BindoraError {
    BindoraError::Encoding(msg.into())
}

impl Molecule {
    pub fn parse(smiles: &str) -> Result<Self> {
        Parser::new(smiles).run()
    }

    /// Neighbour atoms with the index of the connecting bond.
    pub fn neighbors(&self, atom: usize) -> &[(usize, usize)] {
        &self.adjacency[atom]
    }

    pub fn is_hydrogen(&self, atom: usize) -> bool {
        self.atoms[atom].element == "H"
    }

    /// Number of non-hydrogen neighbours.
    pub fn heavy_degree(&self, atom: usize) -> usize {
        self.adjacency[atom]
            .iter()
            .filter(|(n, _)| !self.is_hydrogen(*n))
            .count()
    }

    fn bond_order_sum(&self, atom: usize) -> f64 {
        self.adjacency[atom]
            .iter()
            .map(|(_, b)| self.bonds[*b].order.valence())
            .sum()
    }

    /// Hydrogens not written as explicit atoms: the bracket count, or for
    /// organic-subset atoms the lowest admissible valence minus the bond-order sum.
    /// Aromatic carbon carries one ring pi bond, so it takes `3 - bonds`;
    /// other aromatic atoms only get hydrogens from brackets (`[nH]`).
    pub fn implicit_h(&self, atom: usize) -> u32 {
        let a = &self.atoms[atom];
        if let Some(h) = a.bracket_h {
            return h as u32;
        }
        if a.aromatic {
            return match a.element.as_str() {
                "C" => 3u32.saturating_sub(self.adjacency[atom].len() as u32),
                _ => 0,
            };
        }
        let Some(info) = element_info(&a.element) else {
            return 0;
        };
        let used = self.bond_order_sum(atom).ceil() as u32;
        info.valences
            .iter()
            .map(|v| *v as u32)
            .find(|v| *v >= used)
            .map(|v| v - used)
            .unwrap_or(0)
    }

    /// Hydrogens attached to `atom`, implicit plus explicit `[H]` neighbours.
    pub fn total_h(&self, atom: usize) -> u32 {
        let explicit = self.adjacency[atom]
            .iter()
            .filter(|(n, _)| self.is_hydrogen(*n))
            .count() as u32;
        self.implicit_h(atom) + explicit
    }

    /// Whether removing `bond` leaves its endpoints connected.
    pub fn bond_in_ring(&self, bond: usize) -> bool {
        let Bond { a, b, .. } = self.bonds[bond];
        let mut seen = vec![false; self.atoms.len()];
        let mut stack = vec![a];
        seen[a] = true;
        while let Some(cur) = stack.pop() {
            for &(next, via) in &self.adjacency[cur] {
                if via == bond || seen[next] {
                    continue;
                }
                if next == b {
                    return true;
                }
                seen[next] = true;
                stack.push(next);
            }
        }
        false
    }

    pub fn atom_in_ring(&self, atom: usize) -> bool {
        self.adjacency[atom].iter().any(|(_, b)| self.bond_in_ring(*b))
    }

    /// Stable numeric code of a bond order, used when hashing environments.
    pub fn bond_code(&self, bond: usize) -> u8 {
        self.bonds[bond].order.code()
    }

    fn add_atom(&mut self, atom: Atom) -> usize {
        self.atoms.push(atom);
        self.adjacency.push(Vec::new());
        self.atoms.len() - 1
    }

    fn add_bond(&mut self, a: usize, b: usize, order: BondOrder, ring_closure: bool) -> Result<()> {
        if a == b {
            return Err(err("Ring closure bonds an atom to itself"));
        }
        if self.adjacency[a].iter().any(|(n, _)| *n == b) {
            return Err(err(format!("Duplicate bond between atoms {} and {}", a, b)));
        }
        let idx = self.bonds.len();
        self.bonds.push(Bond { a, b, order, ring_closure });
        self.adjacency[a].push((b, idx));
        self.adjacency[b].push((a, idx));
        Ok(())
    }
}

// ── Parser ───────────────────────────────────────────────────────────────────

struct Parser<'a> {
    chars: Vec<char>,
    pos: usize,
    source: &'a str,
    mol: Molecule,
    prev: Option<usize>,
    pending_bond: Option<BondOrder>,
    branches: Vec<usize>,
    rings: HashMap<u32, (usize, Option<BondOrder>)>,
}

impl<'a> Parser<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            chars: source.trim().chars().collect(),
            pos: 0,
            source,
            mol: Molecule::default(),
            prev: None,
            pending_bond: None,
            branches: Vec::new(),
            rings: HashMap::new(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn run(mut self) -> Result<Molecule> {
        if self.chars.is_empty() {
            return Err(err("Empty structure provided"));
        }
        while let Some(c) = self.peek() {
            match c {
                '(' => {
                    let Some(prev) = self.prev else {
                        return Err(err(format!("Branch before any atom at position {}", self.pos)));
                    };
                    self.branches.push(prev);
                    self.pos += 1;
                }
                ')' => {
                    if self.pending_bond.is_some() {
                        return Err(err(format!("Dangling bond at position {}", self.pos)));
                    }
                    let Some(open) = self.branches.pop() else {
                        return Err(err(format!("Unbalanced ')' at position {}", self.pos)));
                    };
                    self.prev = Some(open);
                    self.pos += 1;
                }
                '-' | '=' | '#' | '$' | ':' | '/' | '\\' => {
                    if self.prev.is_none() {
                        return Err(err(format!("Bond before any atom at position {}", self.pos)));
                    }
                    if self.pending_bond.is_some() {
                        return Err(err(format!("Consecutive bonds at position {}", self.pos)));
                    }
                    self.pending_bond = Some(match c {
                        '=' => BondOrder::Double,
                        '#' => BondOrder::Triple,
                        '$' => BondOrder::Quadruple,
                        ':' => BondOrder::Aromatic,
                        _ => BondOrder::Single,
                    });
                    self.pos += 1;
                }
                '.' => {
                    if self.pending_bond.is_some() {
                        return Err(err(format!("Dangling bond at position {}", self.pos)));
                    }
                    self.prev = None;
                    self.pos += 1;
                }
                '0'..='9' => {
                    let n = c.to_digit(10).unwrap_or(0);
                    self.pos += 1;
                    self.ring_closure(n)?;
                }
                '%' => {
                    let digits: String = self.chars.iter().skip(self.pos + 1).take(2).collect();
                    if digits.len() != 2 || !digits.chars().all(|d| d.is_ascii_digit()) {
                        return Err(err(format!("Malformed '%' ring label at position {}", self.pos)));
                    }
                    self.pos += 3;
                    let n = digits.parse::<u32>().map_err(|_| err("Malformed ring label"))?;
                    self.ring_closure(n)?;
                }
                '[' => {
                    let atom = self.bracket_atom()?;
                    self.attach(atom)?;
                }
                _ => {
                    let atom = self.organic_atom()?;
                    self.attach(atom)?;
                }
            }
        }

        if !self.branches.is_empty() {
            return Err(err(format!("Unbalanced '(' in '{}'", self.source)));
        }
        if let Some(label) = self.rings.keys().min() {
            return Err(err(format!("Unclosed ring {} in '{}'", label, self.source)));
        }
        if self.pending_bond.is_some() {
            return Err(err(format!("Dangling bond at end of '{}'", self.source)));
        }
        if self.mol.atoms.is_empty() {
            return Err(err("Structure contains no atoms"));
        }
        Ok(self.mol)
    }

    fn default_order(&self, a: usize, b: usize) -> BondOrder {
        if self.mol.atoms[a].aromatic && self.mol.atoms[b].aromatic {
            BondOrder::Aromatic
        } else {
            BondOrder::Single
        }
    }

    fn attach(&mut self, atom: Atom) -> Result<()> {
        let idx = self.mol.add_atom(atom);
        if let Some(prev) = self.prev {
            let order = self
                .pending_bond
                .take()
                .unwrap_or_else(|| self.default_order(prev, idx));
            self.mol.add_bond(prev, idx, order, false)?;
        }
        self.prev = Some(idx);
        Ok(())
    }

    fn ring_closure(&mut self, label: u32) -> Result<()> {
        let Some(current) = self.prev else {
            return Err(err(format!("Ring closure before any atom at position {}", self.pos)));
        };
        let written = self.pending_bond.take();
        match self.rings.remove(&label) {
            Some((open, opened_with)) => {
                let order = written
                    .or(opened_with)
                    .unwrap_or_else(|| self.default_order(open, current));
                self.mol.add_bond(open, current, order, true)
            }
            None => {
                self.rings.insert(label, (current, written));
                Ok(())
            }
        }
    }

    fn organic_atom(&mut self) -> Result<Atom> {
        let c = self.peek().ok_or_else(|| err("Unexpected end of structure"))?;
        let next = self.chars.get(self.pos + 1).copied();
        let (element, aromatic, width) = match (c, next) {
            ('C', Some('l')) => ("Cl", false, 2),
            ('B', Some('r')) => ("Br", false, 2),
            ('B', _) => ("B", false, 1),
            ('C', _) => ("C", false, 1),
            ('N', _) => ("N", false, 1),
            ('O', _) => ("O", false, 1),
            ('P', _) => ("P", false, 1),
            ('S', _) => ("S", false, 1),
            ('F', _) => ("F", false, 1),
            ('I', _) => ("I", false, 1),
            ('b', _) => ("B", true, 1),
            ('c', _) => ("C", true, 1),
            ('n', _) => ("N", true, 1),
            ('o', _) => ("O", true, 1),
            ('p', _) => ("P", true, 1),
            ('s', _) => ("S", true, 1),
            ('*', _) => ("*", false, 1),
            _ => {
                return Err(err(format!(
                    "Unexpected character '{}' at position {}",
                    c, self.pos
                )))
            }
        };
        self.pos += width;
        Ok(Atom {
            element: element.to_string(),
            aromatic,
            bracket_h: None,
            charge: 0,
        })
    }

    fn bracket_atom(&mut self) -> Result<Atom> {
        let start = self.pos;
        let close = self.chars[start..]
            .iter()
            .position(|c| *c == ']')
            .map(|off| start + off)
            .ok_or_else(|| err(format!("Unclosed '[' at position {}", start)))?;
        let body: Vec<char> = self.chars[start + 1..close].to_vec();
        self.pos = close + 1;

        let mut i = 0;
        // Isotope
        while i < body.len() && body[i].is_ascii_digit() {
            i += 1;
        }

        let (element, aromatic) = match body.get(i) {
            Some('*') => {
                i += 1;
                ("*".to_string(), false)
            }
            Some(c) if c.is_ascii_uppercase() => {
                let two: String = body[i..body.len().min(i + 2)].iter().collect();
                if two.len() == 2 && element_info(&two).is_some() {
                    i += 2;
                    (two, false)
                } else {
                    i += 1;
                    (c.to_string(), false)
                }
            }
            Some(c) if c.is_ascii_lowercase() => {
                let two: String = body[i..body.len().min(i + 2)].iter().collect();
                if two == "se" || two == "as" {
                    i += 2;
                    (capitalise(&two), true)
                } else if matches!(c, 'b' | 'c' | 'n' | 'o' | 'p' | 's') {
                    i += 1;
                    (c.to_ascii_uppercase().to_string(), true)
                } else {
                    return Err(err(format!("Unknown aromatic element '{}' in bracket", c)));
                }
            }
            _ => return Err(err(format!("Bracket atom without element at position {}", start))),
        };
        if element_info(&element).is_none() {
            return Err(err(format!("Unknown element '{}'", element)));
        }

        // Chirality (@ and @@ only)
        while i < body.len() && body[i] == '@' {
            i += 1;
        }

        let mut hydrogens = 0u8;
        if i < body.len() && body[i] == 'H' {
            i += 1;
            hydrogens = 1;
            if let Some(d) = body.get(i).and_then(|c| c.to_digit(10)) {
                hydrogens = d as u8;
                i += 1;
            }
        }

        let mut charge: i8 = 0;
        if let Some(&sign) = body.get(i).filter(|c| **c == '+' || **c == '-') {
            let unit: i8 = if sign == '+' { 1 } else { -1 };
            i += 1;
            if let Some(d) = body.get(i).and_then(|c| c.to_digit(10)) {
                charge = unit * d as i8;
                i += 1;
            } else {
                charge = unit;
                while body.get(i) == Some(&sign) {
                    charge = charge
                        .checked_add(unit)
                        .ok_or_else(|| err("Charge out of range in bracket atom"))?;
                    i += 1;
                }
            }
        }

        // Atom class
        if body.get(i) == Some(&':') {
            i += 1;
            while i < body.len() && body[i].is_ascii_digit() {
                i += 1;
            }
        }

        if i != body.len() {
            let rest: String = body[i..].iter().collect();
            return Err(err(format!("Unexpected '{}' in bracket atom", rest)));
        }

        Ok(Atom {
            element,
            aromatic,
            bracket_h: Some(hydrogens),
            charge,
        })
    }
}

fn capitalise(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hydrogens(mol: &Molecule) -> u32 {
        (0..mol.atoms.len())
            .filter(|i| !mol.is_hydrogen(*i))
            .map(|i| mol.implicit_h(i))
            .sum()
    }

    #[test]
    fn test_aspirin_graph() {
        let mol = Molecule::parse("CC(=O)Oc1ccccc1C(=O)O").unwrap();
        assert_eq!(mol.atoms.len(), 13);
        assert_eq!(mol.bonds.len(), 13);
        assert_eq!(hydrogens(&mol), 8);
        assert_eq!(mol.bonds.iter().filter(|b| b.ring_closure).count(), 1);
    }

    #[test]
    fn test_implicit_hydrogens() {
        let methane = Molecule::parse("C").unwrap();
        assert_eq!(methane.implicit_h(0), 4);

        let benzene = Molecule::parse("c1ccccc1").unwrap();
        assert!((0..6).all(|i| benzene.implicit_h(i) == 1));

        let pyridine = Molecule::parse("c1ccncc1").unwrap();
        assert_eq!(pyridine.implicit_h(3), 0);

        let caffeine = Molecule::parse("Cn1cnc2c1c(=O)n(C)c(=O)n2C").unwrap();
        assert_eq!(hydrogens(&caffeine), 10);

        // Sulfone sulfur takes the next admissible valence.
        let dmso2 = Molecule::parse("CS(=O)(=O)C").unwrap();
        assert_eq!(dmso2.implicit_h(1), 0);
    }

    #[test]
    fn test_two_letter_halogens() {
        let mol = Molecule::parse("ClCBr").unwrap();
        let elements: Vec<&str> = mol.atoms.iter().map(|a| a.element.as_str()).collect();
        assert_eq!(elements, vec!["Cl", "C", "Br"]);
        assert_eq!(mol.implicit_h(1), 2);
    }

    #[test]
    fn test_bracket_atoms() {
        let mol = Molecule::parse("[NH4+].[Cl-]").unwrap();
        assert_eq!(mol.atoms[0].bracket_h, Some(4));
        assert_eq!(mol.atoms[0].charge, 1);
        assert_eq!(mol.atoms[1].charge, -1);
        assert!(mol.bonds.is_empty());

        let pyrrole = Molecule::parse("c1cc[nH]c1").unwrap();
        assert_eq!(pyrrole.atoms[3].element, "N");
        assert!(pyrrole.atoms[3].aromatic);
        assert_eq!(pyrrole.implicit_h(3), 1);

        let chiral = Molecule::parse("C[C@@H](N)C(=O)O").unwrap();
        assert_eq!(chiral.implicit_h(1), 1);

        let isotope = Molecule::parse("[13CH4]").unwrap();
        assert_eq!(isotope.implicit_h(0), 4);
    }

    #[test]
    fn test_percent_ring_labels_and_ring_detection() {
        let mol = Molecule::parse("C%10CCCCC%10").unwrap();
        assert_eq!(mol.bonds.len(), 6);
        assert!((0..mol.bonds.len()).all(|b| mol.bond_in_ring(b)));

        let chain = Molecule::parse("CCCC").unwrap();
        assert!(!chain.bond_in_ring(1));
    }

    #[test]
    fn test_stereo_bonds_are_single() {
        let mol = Molecule::parse("F/C=C/F").unwrap();
        assert_eq!(mol.bonds[0].order, BondOrder::Single);
        assert_eq!(mol.bonds[1].order, BondOrder::Double);
    }

    #[test]
    fn test_malformed_structures() {
        let runaway_charge = format!("[C{}]", "+".repeat(200));
        let runaway_anion = format!("[O{}]", "-".repeat(129));
        let bad_inputs = [
            "", "   ", "C(C", "CC)", "C1CC", "=C", "C==C", "CX", "[Xx]", "C[NH", "(C)", "1CC", "CC=", "C%1C",
            runaway_charge.as_str(),
            runaway_anion.as_str(),
        ];
        for bad in bad_inputs {
            let result = Molecule::parse(bad);
            assert!(
                matches!(result, Err(BindoraError::Encoding(_))),
                "expected encoding error for {bad:?}, got {result:?}"
            );
        }
    }
}
