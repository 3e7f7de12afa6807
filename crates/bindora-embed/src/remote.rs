//! Client for an external encoding service.
//!
//! Endpoints:
//! - `POST {base}/encode/target   {"sequence": …}` → `{"embedding": […]}`
//! - `POST {base}/encode/molecule {"smiles": …}`   → `{"fingerprint": […]}`
//! - `POST {base}/descriptors     {"smiles": …}`   → descriptor object

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use bindora_common::http::status_error;
use bindora_common::{
    retry_with_backoff, BindoraError, GuardedClient, MolecularProperties, Result, RetryPolicy,
};

use crate::encoder::{MoleculeEncoder, TargetEncoder};

#[derive(Serialize)]
struct SequenceRequest<'a> {
    sequence: &'a str,
}

#[derive(Serialize)]
struct SmilesRequest<'a> {
    smiles: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct FingerprintResponse {
    fingerprint: Vec<f32>,
}

/// One client serves both encoder roles.
#[derive(Clone)]
pub struct RemoteEncoder {
    client: GuardedClient,
    base_url: String,
    model: String,
    dimension: usize,
    retry: RetryPolicy,
}

impl RemoteEncoder {
    /// The base URL's host is added to the client's allowlist.
    pub fn new(
        mut client: GuardedClient,
        base_url: &str,
        model: impl Into<String>,
        dimension: usize,
        retry: RetryPolicy,
    ) -> Result<Self> {
        client.allow_base_url(base_url)?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.into(),
            dimension,
            retry,
        })
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn post<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + Sync + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.endpoint(path);
        let url = url.as_str();
        let client = &self.client;
        retry_with_backoff(&self.retry, path, move || async move {
            let resp = client.post_json(url, body).await?;
            let status = resp.status();
            if status == StatusCode::BAD_REQUEST || status == StatusCode::UNPROCESSABLE_ENTITY {
                let detail = resp.text().await.unwrap_or_default();
                return Err(BindoraError::Encoding(format!(
                    "Encoding service rejected input ({}): {}",
                    status, detail
                )));
            }
            if !status.is_success() {
                return Err(status_error(status, url));
            }
            Ok(resp.json::<T>().await?)
        })
        .await
    }

    fn check_dimension(&self, what: &str, got: usize) -> Result<()> {
        if got != self.dimension {
            return Err(BindoraError::Encoding(format!(
                "Encoding service returned a {} of dimension {}, expected {}",
                what, got, self.dimension
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl TargetEncoder for RemoteEncoder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    #[instrument(skip(self, sequence), fields(len = sequence.len()))]
    async fn encode_target(&self, sequence: &str) -> Result<Vec<f32>> {
        let resp: EmbeddingResponse = self
            .post("encode/target", &SequenceRequest { sequence })
            .await?;
        self.check_dimension("target embedding", resp.embedding.len())?;
        debug!("Encoded target remotely");
        Ok(resp.embedding)
    }
}

#[async_trait]
impl MoleculeEncoder for RemoteEncoder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    #[instrument(skip(self))]
    async fn encode_molecule(&self, structure: &str) -> Result<Vec<f32>> {
        let resp: FingerprintResponse = self
            .post("encode/molecule", &SmilesRequest { smiles: structure })
            .await?;
        self.check_dimension("fingerprint", resp.fingerprint.len())?;
        Ok(resp.fingerprint)
    }

    #[instrument(skip(self))]
    async fn descriptors(&self, structure: &str) -> Result<MolecularProperties> {
        self.post("descriptors", &SmilesRequest { smiles: structure }).await
    }
}
