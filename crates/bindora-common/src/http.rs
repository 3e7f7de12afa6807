use reqwest::{Client, ClientBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashSet;
use std::time::Duration;
use url::Url;

use crate::error::{BindoraError, Result};

/// An HTTP client that only issues requests to approved hosts.
/// Every collaborator adapter (UniProt, ChEMBL, remote encoder) goes through it.
#[derive(Debug, Clone)]
pub struct GuardedClient {
    client: Client,
    allowlist: HashSet<String>,
}

impl GuardedClient {
    /// Creates a client with the default allowlist and the given request timeout.
    pub fn new(timeout: Duration) -> Result<Self> {
        let mut allowlist = HashSet::new();
        let domains = [
            "rest.uniprot.org", // UniProt
            "www.ebi.ac.uk",    // ChEMBL
            "localhost",        // Local encoding service
            "127.0.0.1",        // Localhost alt
        ];

        for d in domains {
            allowlist.insert(d.to_string());
        }

        let client = ClientBuilder::new()
            .timeout(timeout)
            .user_agent(concat!("bindora/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| BindoraError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, allowlist })
    }

    /// Appends an exact hostname to the allowlist.
    pub fn allow_domain(&mut self, domain: &str) {
        self.allowlist.insert(domain.to_string());
    }

    /// Allows the host of a configured base URL.
    pub fn allow_base_url(&mut self, base_url: &str) -> Result<()> {
        let parsed = Url::parse(base_url)
            .map_err(|e| BindoraError::Config(format!("Invalid base URL '{}': {}", base_url, e)))?;
        match parsed.host_str() {
            Some(host) => {
                self.allow_domain(host);
                Ok(())
            }
            None => Err(BindoraError::Config(format!("Base URL has no host: {}", base_url))),
        }
    }

    /// Validates if a URL is permitted under the current policy.
    pub fn is_allowed(&self, url: &str) -> bool {
        if let Ok(parsed) = Url::parse(url) {
            if let Some(host) = parsed.host_str() {
                // Exact match or a subdomain of an allowed domain
                for allowed in &self.allowlist {
                    if host == allowed || host.ends_with(&format!(".{}", allowed)) {
                        return true;
                    }
                }
            }
        }
        false
    }

    fn guard(&self, url: &str) -> Result<()> {
        if !self.is_allowed(url) {
            return Err(BindoraError::Security(format!(
                "Host not in allowlist for URL {}",
                url
            )));
        }
        Ok(())
    }

    /// GET a JSON document. A 404 is `Ok(None)`.
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<Option<T>> {
        self.guard(url)?;
        let resp = self.client.get(url).send().await?;
        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(status_error(status, url));
        }
        Ok(Some(resp.json::<T>().await?))
    }

    /// GET a plain-text body. A 404 is `Ok(None)`.
    pub async fn get_text(&self, url: &str) -> Result<Option<String>> {
        self.guard(url)?;
        let resp = self.client.get(url).send().await?;
        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(status_error(status, url));
        }
        Ok(Some(resp.text().await?))
    }

    /// POST a JSON body and return the raw response; callers interpret 4xx.
    pub async fn post_json<B: Serialize + ?Sized>(
        &self,
        url: &str,
        body: &B,
    ) -> Result<reqwest::Response> {
        self.guard(url)?;
        Ok(self.client.post(url).json(body).send().await?)
    }
}

/// Maps a non-success status to an error. Server-side and throttling
/// failures are `Upstream` (retried); other client errors are not retried.
pub fn status_error(status: StatusCode, url: &str) -> BindoraError {
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        BindoraError::Upstream(format!("{} returned {}", url, status))
    } else if status == StatusCode::NOT_FOUND {
        BindoraError::NotFound(url.to_string())
    } else {
        BindoraError::Validation(format!("{} rejected the request with {}", url, status))
    }
}
