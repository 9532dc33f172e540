//! Pipeline error taxonomy.
//!
//! Every stage returns `Result<T, PipelineError>`. The CLI prints
//! [`PipelineError::kind`] so operators can tell which stage failed.

use std::path::PathBuf;

use reqwest::StatusCode;

pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Credential or authorization failure at any provider.
    #[error("{0}")]
    Auth(String),

    /// Discovery polling exceeded its wait bound.
    #[error("discovery did not complete within {waited_secs}s")]
    Timeout { waited_secs: u64 },

    /// Malformed or unexpected provider response.
    #[error("{0}")]
    Data(String),

    /// Empty or failed memo generation.
    #[error("{0}")]
    Generation(String),

    /// Empty or failed speech synthesis.
    #[error("{0}")]
    Synthesis(String),

    /// Send failure after a valid credential was obtained.
    #[error("{0}")]
    Delivery(String),

    #[error("{0}")]
    Config(String),

    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PipelineError {
    /// Taxonomy name shown on stderr.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Auth(_) => "AuthError",
            Self::Timeout { .. } => "TimeoutError",
            Self::Data(_) => "DataError",
            Self::Generation(_) => "GenerationError",
            Self::Synthesis(_) => "SynthesisError",
            Self::Delivery(_) => "DeliveryError",
            Self::Config(_) => "ConfigError",
            Self::Io { .. } => "IoError",
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Map a rejected provider credential to `Auth`, anything else through `other`.
    pub fn from_status(
        provider: &str,
        status: StatusCode,
        body: &str,
        other: fn(String) -> PipelineError,
    ) -> Self {
        let snippet: String = body.chars().take(300).collect();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            Self::Auth(format!("{provider} rejected credentials ({status}): {snippet}"))
        } else {
            other(format!("{provider} returned {status}: {snippet}"))
        }
    }
}
