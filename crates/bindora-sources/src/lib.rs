//! bindora-sources: where targets and molecules come from.
//!
//! [`SequenceSource`] resolves gene symbols and disease names to protein
//! sequences and annotates targets; [`CatalogSource`] supplies the molecule
//! catalog and single molecules by id. Both are
//! traits so the search core can run against UniProt/ChEMBL, the built-in
//! catalog, or in-memory mocks.

pub mod builtin;
pub mod chembl;
pub mod mock;
pub mod uniprot;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use bindora_common::{GuardedClient, MoleculeCandidate, Result, RetryPolicy, TargetInfo};
use bindora_config::{CatalogKind, SourcesConfig};

pub use builtin::BuiltinCatalog;
pub use chembl::ChemblCatalog;
pub use mock::{MockSequenceSource, StaticCatalog};
pub use uniprot::{parse_fasta, UniProtSource};

/// Sequence-lookup collaborator. Returned sequences are raw upstream text;
/// callers normalise them.
#[async_trait]
pub trait SequenceSource: Send + Sync {
    /// Canonical sequence for a gene symbol, `None` when unknown.
    async fn fetch_by_gene(&self, symbol: &str) -> Result<Option<String>>;

    /// Sequences of proteins associated with a disease, at most `limit`.
    /// An unknown disease yields an empty list.
    async fn fetch_by_disease(&self, name: &str, limit: usize) -> Result<Vec<String>>;

    /// Annotation for an accession or gene symbol, `None` when unknown.
    async fn fetch_target_info(&self, id: &str) -> Result<Option<TargetInfo>>;
}

/// Molecule catalog collaborator.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn fetch_catalog(&self, limit: usize) -> Result<Vec<MoleculeCandidate>>;

    /// One molecule by id, whether or not it falls inside a catalog page.
    async fn fetch_molecule(&self, id: &str) -> Result<Option<MoleculeCandidate>>;

    /// Short label for logs.
    fn name(&self) -> &str;
}

/// Collaborators selected by `[sources]`.
#[derive(Clone)]
pub struct Sources {
    pub sequences: Arc<dyn SequenceSource>,
    pub catalog: Arc<dyn CatalogSource>,
}

/// Build the collaborators from configuration. Configured base URLs are
/// added to the client's allowlist.
pub fn build_sources(
    config: &SourcesConfig,
    client: &GuardedClient,
    retry: &RetryPolicy,
) -> Result<Sources> {
    let mut client = client.clone();
    client.allow_base_url(&config.uniprot_url)?;

    let sequences: Arc<dyn SequenceSource> = Arc::new(UniProtSource::new(
        client.clone(),
        &config.uniprot_url,
        &config.organism_id,
        retry.clone(),
    ));

    let catalog: Arc<dyn CatalogSource> = match config.catalog {
        CatalogKind::Builtin => Arc::new(BuiltinCatalog::new()),
        CatalogKind::Chembl => {
            client.allow_base_url(&config.chembl_url)?;
            Arc::new(ChemblCatalog::new(client, &config.chembl_url, retry.clone()))
        }
    };
    info!(catalog = catalog.name(), "Configured molecule sources");

    Ok(Sources { sequences, catalog })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_build_sources_selects_catalog() {
        let client = GuardedClient::new(Duration::from_secs(5)).unwrap();
        let builtin = build_sources(&SourcesConfig::default(), &client, &RetryPolicy::none()).unwrap();
        assert_eq!(builtin.catalog.name(), "builtin");

        let config = SourcesConfig { catalog: CatalogKind::Chembl, ..Default::default() };
        let chembl = build_sources(&config, &client, &RetryPolicy::none()).unwrap();
        assert_eq!(chembl.catalog.name(), "chembl");
    }

    #[test]
    fn test_invalid_base_url_rejected() {
        let client = GuardedClient::new(Duration::from_secs(5)).unwrap();
        let config = SourcesConfig { uniprot_url: "not a url".into(), ..Default::default() };
        assert!(build_sources(&config, &client, &RetryPolicy::none()).is_err());
    }
}
