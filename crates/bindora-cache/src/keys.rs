//! Cache key construction. Every key is `{namespace}:{scope}:{id}`.

use sha2::{Digest, Sha256};

pub fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    format!("{:x}", hasher.finalize())
}

pub fn target_key(model: &str, sequence: &str) -> String {
    format!("target:{}:{}", model, sha256_hex(sequence))
}

pub fn molecule_key(model: &str, structure: &str) -> String {
    format!("molecule:{}:{}", model, sha256_hex(structure))
}

/// Resolution results are keyed on the lowercased, whitespace-collapsed query.
pub fn resolve_key(kind: &str, query: &str) -> String {
    let normalised = query
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    format!("resolve:{}:{}", kind, normalised)
}

/// Target annotations are keyed on the uppercased id.
pub fn target_info_key(id: &str) -> String {
    format!("info:target:{}", id.trim().to_uppercase())
}
