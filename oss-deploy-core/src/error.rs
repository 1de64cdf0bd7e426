//! Error types for configuration validation, the storage capability and a deploy run.

use std::path::PathBuf;
use thiserror::Error;

/// Configuration is rejected before any I/O happens.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required storage setting: {0}")]
    MissingStorageField(&'static str),

    #[error("pathPrefix must match ^/.*/$, got {0:?}")]
    InvalidPathPrefix(String),

    #[error("chunkSize must be a positive integer")]
    InvalidChunkSize,

    #[error("rule #{index}: pattern {pattern:?} does not compile: {source}")]
    InvalidRulePattern {
        index: usize,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("rule #{index}: header {header:?} must have the form \"Name: Value\"")]
    InvalidRuleHeader { index: usize, header: String },
}

/// Errors reported by an [`ObjectStore`](crate::contract::ObjectStore) implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("object not found: {0}")]
    NotFound(String),

    #[error("storage backend error: {0}")]
    Backend(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl StoreError {
    pub fn backend(msg: impl Into<String>) -> Self {
        StoreError::Backend(msg.into().into())
    }
}

/// Errors raised while deploying a directory.
#[derive(Debug, Error)]
pub enum DeployError {
    #[error("failed to list {}: {source}", path.display())]
    Listing {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read local file {}: {source}", path.display())]
    LocalIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to probe remote object {key}: {source}")]
    RemoteProbe {
        key: String,
        #[source]
        source: StoreError,
    },

    #[error("failed to upload {key}: {source}")]
    RemoteUpload {
        key: String,
        #[source]
        source: StoreError,
    },
}

impl DeployError {
    /// Errors after which the run must not start another batch.
    pub fn is_fatal(&self) -> bool {
        matches!(self, DeployError::Listing { .. } | DeployError::LocalIo { .. })
    }
}
