//! Error types for the Earth Engine client.

use thiserror::Error;

/// Errors produced while talking to the Earth Engine REST service.
#[derive(Error, Debug)]
pub enum CloudError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("authentication error: {0}")]
    Auth(String),

    #[error("data unavailable: {0}")]
    DataUnavailable(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("invalid TIFF: {reason}")]
    InvalidTiff { reason: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("core error: {0}")]
    Core(#[from] satembed_core::Error),
}

impl CloudError {
    /// Whether this error was caused by the caller's input rather than the
    /// service or the network.
    pub fn is_validation(&self) -> bool {
        match self {
            CloudError::InvalidRequest(_) | CloudError::Config(_) => true,
            CloudError::Core(e) => e.is_validation(),
            _ => false,
        }
    }
}

impl From<figment::Error> for CloudError {
    fn from(e: figment::Error) -> Self {
        CloudError::Config(e.to_string())
    }
}

/// Result alias for cloud operations.
pub type Result<T> = std::result::Result<T, CloudError>;
