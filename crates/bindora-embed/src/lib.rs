//! Bindora encoders.
//!
//! Turns protein sequences into dense embeddings and SMILES structures into
//! fixed-length fingerprints, and estimates molecular descriptors.
//!
//! # Modes
//! - `stub`: deterministic, in-process ([`StubTargetEncoder`], [`StubMoleculeEncoder`])
//! - `remote`: an HTTP encoding service ([`RemoteEncoder`])
//!
//! # Example
//! ```rust
//! use bindora_config::EncoderConfig;
//! use bindora_embed::build_encoders;
//!
//! #[tokio::main]
//! async fn main() -> bindora_common::Result<()> {
//!     let client = bindora_common::GuardedClient::new(std::time::Duration::from_secs(30))?;
//!     let encoders = build_encoders(&EncoderConfig::default(), &client, &Default::default())?;
//!
//!     let fingerprint = encoders.molecule.encode_molecule("CC(=O)Oc1ccccc1C(=O)O").await?;
//!     println!("Fingerprint bits: {}", fingerprint.len()); // 2048
//!     Ok(())
//! }
//! ```

pub mod descriptors;
pub mod druglike;
pub mod encoder;
pub mod remote;
pub mod smiles;
pub mod stub;

use std::sync::Arc;

use tracing::info;

use bindora_common::{BindoraError, GuardedClient, Result, RetryPolicy};
use bindora_config::{EncoderConfig, EncoderMode};

pub use druglike::DrugLikeness;
pub use encoder::{MoleculeEncoder, TargetEncoder};
pub use remote::RemoteEncoder;
pub use smiles::Molecule;
pub use stub::{StubMoleculeEncoder, StubTargetEncoder};

/// The encoder pair used by a search.
#[derive(Clone)]
pub struct Encoders {
    pub target: Arc<dyn TargetEncoder>,
    pub molecule: Arc<dyn MoleculeEncoder>,
}

/// Build the encoder pair selected by `[encoder]`.
pub fn build_encoders(
    config: &EncoderConfig,
    client: &GuardedClient,
    retry: &RetryPolicy,
) -> Result<Encoders> {
    match config.mode {
        EncoderMode::Stub => {
            info!(model = %config.model, dimension = config.dimension, "Using stub encoders");
            Ok(Encoders {
                target: Arc::new(StubTargetEncoder::new(&config.model, config.dimension)),
                molecule: Arc::new(StubMoleculeEncoder::new(
                    &config.model,
                    config.dimension,
                    config.fingerprint_radius,
                )),
            })
        }
        EncoderMode::Remote => {
            let base_url = config.base_url.as_deref().ok_or_else(|| {
                BindoraError::Config("encoder.base_url is required in remote mode".to_string())
            })?;
            info!(base_url, model = %config.model, "Using remote encoding service");
            let remote = Arc::new(RemoteEncoder::new(
                client.clone(),
                base_url,
                &config.model,
                config.dimension,
                retry.clone(),
            )?);
            Ok(Encoders {
                target: remote.clone(),
                molecule: remote,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn client() -> GuardedClient {
        GuardedClient::new(Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_stub_mode_builds_matching_dimensions() {
        let config = EncoderConfig { dimension: 256, ..Default::default() };
        let encoders = build_encoders(&config, &client(), &RetryPolicy::none()).unwrap();
        assert_eq!(encoders.target.dimension(), 256);
        assert_eq!(encoders.molecule.dimension(), 256);
        assert_eq!(encoders.target.model_name(), config.model);
    }

    #[test]
    fn test_stub_encoders_share_dimension_at_runtime() {
        let config = EncoderConfig { dimension: 128, ..Default::default() };
        let encoders = build_encoders(&config, &client(), &RetryPolicy::none()).unwrap();
        let embedding = tokio_test::block_on(encoders.target.encode_target("MKTIIALSYIFCLVFA")).unwrap();
        let fingerprint = tokio_test::block_on(encoders.molecule.encode_molecule("CCO")).unwrap();
        assert_eq!(embedding.len(), fingerprint.len());
    }

    #[test]
    fn test_remote_mode_requires_base_url() {
        let config = EncoderConfig { mode: EncoderMode::Remote, ..Default::default() };
        let result = build_encoders(&config, &client(), &RetryPolicy::none());
        assert!(matches!(result, Err(BindoraError::Config(_))));
    }

    #[test]
    fn test_remote_mode_shares_one_client() {
        let config = EncoderConfig {
            mode: EncoderMode::Remote,
            base_url: Some("http://localhost:8100".to_string()),
            ..Default::default()
        };
        let encoders = build_encoders(&config, &client(), &RetryPolicy::none()).unwrap();
        assert_eq!(encoders.molecule.model_name(), config.model);
    }
}
