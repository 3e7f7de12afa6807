use thiserror::Error;

#[derive(Debug, Error)]
pub enum BindoraError {
    /// Malformed query, empty input, unsupported kind or invalid alphabet.
    #[error("Validation error: {0}")]
    Validation(String),

    /// No target could be resolved, or a looked-up id does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A collaborator failed after exhausting its retry policy.
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// An encoder could not parse its input.
    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Security error: {0}")]
    Security(String),
}

impl BindoraError {
    /// Whether a collaborator call that produced this error may be retried.
    /// Transport failures are; a response that arrived but could not be
    /// decoded is not.
    pub fn is_retryable(&self) -> bool {
        match self {
            BindoraError::Upstream(_) => true,
            BindoraError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            _ => false,
        }
    }

    /// Stable lowercase label, used in logs and by callers mapping errors to statuses.
    pub fn kind(&self) -> &'static str {
        match self {
            BindoraError::Validation(_) => "validation",
            BindoraError::NotFound(_) => "not_found",
            BindoraError::Upstream(_) => "upstream",
            BindoraError::Encoding(_) => "encoding",
            BindoraError::Cache(_) => "cache",
            BindoraError::Config(_) => "config",
            BindoraError::Http(_) => "upstream",
            BindoraError::Serialization(_) => "serialization",
            BindoraError::Security(_) => "security",
        }
    }
}

pub type Result<T> = std::result::Result<T, BindoraError>;
