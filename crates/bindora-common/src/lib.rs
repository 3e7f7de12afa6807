//! bindora-common: Shared types, errors, and utilities used across all Bindora crates.

pub mod error;
pub mod entities;
pub mod http;
pub mod retry;

// Re-export commonly used types
pub use entities::{
    EnrichedPrediction, MolecularProperties, MoleculeCandidate, Prediction, Query, QueryKind,
    SimilarMolecule, TargetInfo, TargetSequence, STANDARD_RESIDUES,
};
pub use error::{BindoraError, Result};
pub use http::GuardedClient;
pub use retry::{retry_with_backoff, RetryPolicy};
