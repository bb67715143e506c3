//! Error taxonomy for one destination's publish attempt

use crosspost_core::models::Network;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PublishError {
    /// Content does not satisfy the network's constraints; no request was made
    #[error("Validation failed: {0}")]
    Validation(String),

    /// The destination cannot be used (missing or unusable credentials)
    #[error("Connection error: {0}")]
    Connection(String),

    /// The network rejected a request
    #[error("{network} API error ({status}): {message}")]
    Protocol {
        network: Network,
        status: u16,
        code: Option<String>,
        message: String,
    },

    /// The network reported that server-side processing failed
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),

    /// Processing did not finish within the polling budget
    #[error("Processing timed out for {resource} after {attempts} status checks")]
    ProcessingTimeout { resource: String, attempts: u32 },

    #[error("Unsupported: {0}")]
    Unsupported(String),

    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The adapter panicked; contained at the destination boundary
    #[error("Adapter panicked: {0}")]
    Panicked(String),
}

impl PublishError {
    pub fn protocol(network: Network, status: u16, message: impl Into<String>) -> Self {
        PublishError::Protocol {
            network,
            status,
            code: None,
            message: message.into(),
        }
    }

    /// Whether repeating the same request could succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            PublishError::Validation(_)
            | PublishError::Connection(_)
            | PublishError::Unsupported(_)
            | PublishError::Panicked(_) => false,
            PublishError::Protocol { status, .. } => !matches!(status, 401 | 403 | 404),
            _ => true,
        }
    }
}
