//! Error types for the distributor side of docgrid
//!
//! Merge and maintenance failures never show up here; they end as operation
//! outcomes in the metrics layer. What remains are startup and input errors.

use docgrid_core::{DecodeError, EncodeError, RepoError};
use thiserror::Error;

/// Main result type used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for docgrid
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Document type repo could not be built
    #[error("Document type repo error: {0}")]
    Repo(#[from] RepoError),

    /// Document could not be decoded
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Document could not be encoded
    #[error("Encode error: {0}")]
    Encode(#[from] EncodeError),

    /// Cluster state string did not parse
    #[error("Invalid cluster state: {0}")]
    ClusterState(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// I/O errors from std
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Prometheus metrics errors
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// Logging could not be installed
    #[error("Logging error: {0}")]
    Logging(String),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a cluster state error
    pub fn cluster_state(msg: impl Into<String>) -> Self {
        Self::ClusterState(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repo_errors_convert() {
        let err: Error = RepoError::illegal_config("duplicate id 7").into();
        assert!(matches!(err, Error::Repo(_)));
        assert_eq!(err.to_string(), "Document type repo error: Illegal config: duplicate id 7");
    }

    #[test]
    fn test_helper_constructors() {
        assert!(matches!(Error::config("x"), Error::Config(m) if m == "x"));
        assert!(matches!(Error::cluster_state("bad"), Error::ClusterState(_)));
    }
}
