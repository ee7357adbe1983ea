// Error types module

use thiserror::Error;

/// Errors raised while turning a request into an image response
///
/// Only `Fallback` ever reaches the client (as an empty 404). `Validation`,
/// `Unauthorized` and `Fetch` are converted into a fallback attempt by the
/// dispatcher. Cache misses are not errors, see `cache::CacheLookup`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PipelineError {
    /// Missing or disallowed file name, or a handler without a bucket
    #[error("Validation error: {0}")]
    Validation(String),

    /// The authorization predicate rejected the request token
    #[error("Authorization rejected request token")]
    Unauthorized,

    /// Origin transport failure or a non-200 response
    #[error("Fetch error: {message}")]
    Fetch {
        status: Option<u16>,
        message: String,
    },

    /// No usable fallback image
    #[error("Fallback error: {0}")]
    Fallback(String),
}

impl PipelineError {
    pub fn validation(message: impl Into<String>) -> Self {
        PipelineError::Validation(message.into())
    }

    pub fn fetch_status(status: u16) -> Self {
        PipelineError::Fetch {
            status: Some(status),
            message: format!("origin responded with status {}", status),
        }
    }

    pub fn fetch_transport(message: impl Into<String>) -> Self {
        PipelineError::Fetch {
            status: None,
            message: message.into(),
        }
    }

    pub fn fallback(message: impl Into<String>) -> Self {
        PipelineError::Fallback(message.into())
    }

    /// Short label used for log fields and metric labels
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::Validation(_) => "validation",
            PipelineError::Unauthorized => "unauthorized",
            PipelineError::Fetch { .. } => "fetch",
            PipelineError::Fallback(_) => "fallback",
        }
    }
}
