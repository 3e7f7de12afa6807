//! bindora-search: matches a disease, gene or sequence query against the
//! molecule catalog and returns one ranked, enriched list.
//!
//! Pipeline per search:
//! 1. Resolve the query to target sequences ([`QueryResolver`])
//! 2. Load the catalog and keep drug-like molecules
//! 3. Score every target against the catalog, concurrently per target
//! 4. Merge per-target predictions ([`bindora_ranker::aggregate`])
//! 5. Enrich survivors with properties and catalog metadata

pub mod builder;
pub mod enrich;
pub mod resolver;
pub mod service;

pub use builder::SearchServiceBuilder;
pub use enrich::MoleculeDetails;
pub use resolver::QueryResolver;
pub use service::SearchService;
