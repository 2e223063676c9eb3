//! Error types shared by the op model and the rule configuration loader.

use std::path::PathBuf;

use thiserror::Error;

/// Failures decoding a batch of ops.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OpsError {
    /// One element of the batch is not a well-typed op. The whole batch is void.
    #[error("invalid ops batch: item {index}: {reason}")]
    InvalidOpsBatch { index: usize, reason: String },

    /// The surrounding `{"ops": [...]}` document could not be read.
    #[error("malformed ops document: {0}")]
    MalformedDocument(String),
}

/// Failures loading a rule configuration document.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported rule config format: {}", .0.display())]
    UnsupportedFormat(PathBuf),
}
