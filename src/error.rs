//! Error types shared across the client.

use thiserror::Error;

/// Failures talking to the hosted backend.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GatewayError {
    /// No backend URL/key was provided at build or launch time
    #[error("Backend is not configured")]
    NotConfigured,

    /// Transport level failure (DNS, TLS, connection reset, ...)
    #[error("Network error: {0}")]
    Network(String),

    /// The backend answered with a non-success status
    #[error("Request failed ({status}): {message}")]
    Rpc { status: u16, message: String },

    /// The body could not be decoded into the expected shape
    #[error("Unexpected response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            GatewayError::Decode(err.to_string())
        } else {
            GatewayError::Network(err.to_string())
        }
    }
}

/// Invalid queue or application configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("batch size must be greater than zero")]
    EmptyBatch,

    #[error("refill threshold {threshold} must be even and at least 2")]
    InvalidThreshold { threshold: usize },

    #[error("refill threshold {threshold} must be smaller than the batch size {batch_size}")]
    ThresholdTooLarge { threshold: usize, batch_size: usize },
}
