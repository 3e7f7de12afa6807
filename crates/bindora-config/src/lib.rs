//! Configuration loading for Bindora.
//! Reads bindora.toml from the current directory or the path in the
//! BINDORA_CONFIG env var, then applies BINDORA_* environment overrides.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use bindora_common::{BindoraError, RetryPolicy};

pub const CONFIG_ENV: &str = "BINDORA_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "bindora.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(String),

    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {key}: {reason}")]
    Invalid { key: String, reason: String },
}

impl From<ConfigError> for BindoraError {
    fn from(e: ConfigError) -> Self {
        BindoraError::Config(e.to_string())
    }
}

fn invalid(key: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid { key: key.to_string(), reason: reason.into() }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub encoder: EncoderConfig,
    #[serde(default)]
    pub sources: SourcesConfig,
    #[serde(default)]
    pub retry: RetryPolicy,
}

// ── Scoring ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Steepness of the logistic mapping from similarity to score.
    #[serde(default = "default_scale_factor")]
    pub scale_factor: f64,
    /// Raw similarities below this value have their score halved.
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,
}

fn default_scale_factor()         -> f64 { 5.0 }
fn default_similarity_threshold() -> f64 { 0.0 }

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            scale_factor: default_scale_factor(),
            similarity_threshold: default_similarity_threshold(),
        }
    }
}

// ── Cache ───────────────────────────────────────────────────────────────────

/// Longest accepted cache TTL: 30 days.
pub const MAX_CACHE_TTL_SECONDS: u64 = 30 * 24 * 3_600;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    /// Per-process LRU.
    #[default]
    Memory,
    /// Shared Redis at `cache.redis_url`, optionally fronted by an LRU.
    Redis,
}

impl std::str::FromStr for CacheBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "memory" => Ok(CacheBackend::Memory),
            "redis" => Ok(CacheBackend::Redis),
            other => Err(invalid("cache.backend", format!("unknown backend '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "bool_true")]
    pub enabled: bool,
    #[serde(default)]
    pub backend: CacheBackend,
    #[serde(default = "default_ttl_seconds")]
    pub ttl_seconds: u64,
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
    #[serde(default)]
    pub redis_url: Option<String>,
    /// In-process entries kept in front of Redis; 0 disables the local tier.
    #[serde(default = "default_l1_entries")]
    pub l1_entries: usize,
}

fn bool_true()           -> bool  { true }
fn default_ttl_seconds() -> u64   { 3_600 }
fn default_max_entries() -> usize { 10_000 }
fn default_l1_entries()  -> usize { 1_000 }

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            backend: CacheBackend::default(),
            ttl_seconds: default_ttl_seconds(),
            max_entries: default_max_entries(),
            redis_url: None,
            l1_entries: default_l1_entries(),
        }
    }
}

// ── Search ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_max_sequence_length")]
    pub max_sequence_length: usize,
    #[serde(default)]
    pub min_score: f64,
    #[serde(default = "default_max_results")]
    pub default_max_results: usize,
    #[serde(default = "default_max_results_limit")]
    pub max_results_limit: usize,
    #[serde(default = "default_catalog_limit")]
    pub catalog_limit: usize,
    #[serde(default = "default_max_disease_targets")]
    pub max_disease_targets: usize,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    /// Molecules encoded concurrently per target.
    #[serde(default = "default_fingerprint_concurrency")]
    pub fingerprint_concurrency: usize,
}

fn default_max_sequence_length()     -> usize { 1_024 }
fn default_max_results()             -> usize { 20 }
fn default_max_results_limit()       -> usize { 100 }
fn default_catalog_limit()           -> usize { 100 }
fn default_max_disease_targets()     -> usize { 10 }
fn default_timeout_seconds()         -> u64   { 30 }
fn default_fingerprint_concurrency() -> usize { 8 }

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_sequence_length: default_max_sequence_length(),
            min_score: 0.0,
            default_max_results: default_max_results(),
            max_results_limit: default_max_results_limit(),
            catalog_limit: default_catalog_limit(),
            max_disease_targets: default_max_disease_targets(),
            timeout_seconds: default_timeout_seconds(),
            fingerprint_concurrency: default_fingerprint_concurrency(),
        }
    }
}

// ── Encoder ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EncoderMode {
    /// Deterministic in-process encoders.
    #[default]
    Stub,
    /// HTTP encoding service at `encoder.base_url`.
    Remote,
}

impl std::str::FromStr for EncoderMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "stub" => Ok(EncoderMode::Stub),
            "remote" => Ok(EncoderMode::Remote),
            other => Err(invalid("encoder.mode", format!("unknown mode '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncoderConfig {
    #[serde(default)]
    pub mode: EncoderMode,
    /// Length of both target embeddings and molecule fingerprints.
    #[serde(default = "default_dimension")]
    pub dimension: usize,
    #[serde(default = "default_fingerprint_radius")]
    pub fingerprint_radius: u32,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_encoder_model")]
    pub model: String,
}

fn default_dimension()          -> usize  { 2_048 }
fn default_fingerprint_radius() -> u32    { 2 }
fn default_encoder_model()      -> String { "bindora-stub-v1".to_string() }

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            mode: EncoderMode::default(),
            dimension: default_dimension(),
            fingerprint_radius: default_fingerprint_radius(),
            base_url: None,
            model: default_encoder_model(),
        }
    }
}

// ── Sources ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CatalogKind {
    #[default]
    Builtin,
    Chembl,
}

impl std::str::FromStr for CatalogKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "builtin" => Ok(CatalogKind::Builtin),
            "chembl" => Ok(CatalogKind::Chembl),
            other => Err(invalid("sources.catalog", format!("unknown catalog '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourcesConfig {
    #[serde(default)]
    pub catalog: CatalogKind,
    #[serde(default = "default_uniprot_url")]
    pub uniprot_url: String,
    #[serde(default = "default_chembl_url")]
    pub chembl_url: String,
    /// NCBI taxonomy id; 9606 is human.
    #[serde(default = "default_organism_id")]
    pub organism_id: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
}

fn default_uniprot_url()     -> String { "https://rest.uniprot.org".to_string() }
fn default_chembl_url()      -> String { "https://www.ebi.ac.uk/chembl/api/data".to_string() }
fn default_organism_id()     -> String { "9606".to_string() }
fn default_request_timeout() -> u64    { 30 }

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            catalog: CatalogKind::default(),
            uniprot_url: default_uniprot_url(),
            chembl_url: default_chembl_url(),
            organism_id: default_organism_id(),
            request_timeout_seconds: default_request_timeout(),
        }
    }
}

impl Config {
    /// Load configuration from bindora.toml.
    /// Checks BINDORA_CONFIG first, then the current directory. A missing
    /// default file yields the built-in defaults; a missing file named by
    /// BINDORA_CONFIG is an error.
    pub fn load() -> Result<Self, ConfigError> {
        let explicit = std::env::var(CONFIG_ENV).ok();
        let path = explicit.clone().unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

        let mut config = if Path::new(&path).exists() {
            Self::load_from(&path)?
        } else if explicit.is_some() {
            return Err(ConfigError::NotFound(path));
        } else {
            info!(path = %path, "No config file found, using defaults");
            Config::default()
        };

        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a config file without applying env overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config: Config = toml::from_str(&content)?;
        debug!(path = %path.display(), "Loaded config file");
        Ok(config)
    }

    /// Apply BINDORA_* overrides. `lookup` is `std::env::var` in production.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(mode) = lookup("BINDORA_ENCODER_MODE") {
            self.encoder.mode = mode.parse()?;
        }
        if let Some(url) = lookup("BINDORA_ENCODER_URL") {
            self.encoder.base_url = Some(url);
        }
        if let Some(catalog) = lookup("BINDORA_CATALOG") {
            self.sources.catalog = catalog.parse()?;
        }
        if let Some(url) = lookup("BINDORA_UNIPROT_URL") {
            self.sources.uniprot_url = url;
        }
        if let Some(url) = lookup("BINDORA_CHEMBL_URL") {
            self.sources.chembl_url = url;
        }
        if let Some(backend) = lookup("BINDORA_CACHE_BACKEND") {
            self.cache.backend = backend.parse()?;
        }
        if let Some(url) = lookup("BINDORA_REDIS_URL") {
            self.cache.redis_url = Some(url);
        }
        if let Some(ttl) = lookup("BINDORA_CACHE_TTL") {
            self.cache.ttl_seconds = ttl
                .trim()
                .parse()
                .map_err(|_| invalid("BINDORA_CACHE_TTL", format!("'{ttl}' is not a number of seconds")))?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.scoring.scale_factor > 0.0) {
            return Err(invalid("scoring.scale_factor", "must be positive"));
        }
        if !(-1.0..=1.0).contains(&self.scoring.similarity_threshold) {
            return Err(invalid("scoring.similarity_threshold", "must be within [-1, 1]"));
        }
        if self.cache.enabled && self.cache.ttl_seconds == 0 {
            return Err(invalid("cache.ttl_seconds", "must be positive when the cache is enabled"));
        }
        if self.cache.ttl_seconds > MAX_CACHE_TTL_SECONDS {
            return Err(invalid(
                "cache.ttl_seconds",
                format!("must be at most {MAX_CACHE_TTL_SECONDS} seconds"),
            ));
        }
        if self.cache.enabled && self.cache.backend == CacheBackend::Redis {
            match self.cache.redis_url.as_deref().map(str::trim) {
                None | Some("") => {
                    return Err(invalid("cache.redis_url", "required when cache.backend = \"redis\""));
                }
                Some(url) if !(url.starts_with("redis://") || url.starts_with("rediss://")) => {
                    return Err(invalid("cache.redis_url", format!("'{url}' is not a redis:// URL")));
                }
                Some(_) => {}
            }
        }
        if self.encoder.dimension == 0 {
            return Err(invalid("encoder.dimension", "must be positive"));
        }
        if self.search.max_sequence_length == 0 {
            return Err(invalid("search.max_sequence_length", "must be positive"));
        }
        if self.search.max_results_limit == 0 {
            return Err(invalid("search.max_results_limit", "must be at least 1"));
        }
        if !(0.0..=100.0).contains(&self.search.min_score) {
            return Err(invalid("search.min_score", "must be within [0, 100]"));
        }
        if self.encoder.mode == EncoderMode::Remote
            && self.encoder.base_url.as_deref().map_or(true, |u| u.trim().is_empty())
        {
            return Err(invalid("encoder.base_url", "required when encoder.mode = \"remote\""));
        }
        if self.retry.max_attempts == 0 {
            return Err(invalid("retry.max_attempts", "must be at least 1"));
        }
        if self.retry.multiplier < 1.0 {
            return Err(invalid("retry.multiplier", "must be >= 1.0"));
        }
        Ok(())
    }
}
