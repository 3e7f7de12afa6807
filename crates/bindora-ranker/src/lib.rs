//! bindora-ranker: scores target/molecule pairs and merges per-target results.
//!
//! Score for a pair:
//!   s      = cos(embed(target), fingerprint(molecule))
//!   score  = 100 / (1 + exp(-s * scale_factor))
//!   score /= 2    if s < similarity_threshold
//! clamped to [0, 100].

pub mod aggregate;
pub mod scorer;
pub mod similarity;

pub use aggregate::aggregate;
pub use scorer::{
    interpret, logistic_scale, score_from_similarity, BindingScorer, Explanation, PairScore,
    RankedMolecule,
};
pub use similarity::{cosine, cosine_batch, tanimoto_batch};
