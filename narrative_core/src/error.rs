//! Error types for the stores, collaborators, pipeline and session.

use std::path::PathBuf;

use thiserror::Error;

/// Failures of the SQLite-backed world stores.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("SQLite error: {0}")]
    Sql(#[from] rusqlite::Error),
}

/// Failures reported by an external planner, narrator or memory store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CollaboratorError {
    #[error("{0} unavailable: {1}")]
    Unavailable(&'static str, String),
    #[error("{0}")]
    Failed(String),
}

/// Failures reading overlay documents from disk.
#[derive(Debug, Error)]
pub enum OverlayError {
    #[error("failed to read overlay {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Fatal failures that end a turn early.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("memory store error: {0}")]
    Memory(#[source] CollaboratorError),
    #[error("overlay error: {0}")]
    Overlay(#[from] OverlayError),
    #[error("snapshot export failed: {0}")]
    Snapshot(#[source] std::io::Error),
    #[error("op encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Failures opening or advancing a game session.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("chat history error: {0}")]
    ChatHistory(#[source] std::io::Error),
    #[error("chat history encoding error: {0}")]
    ChatHistoryEncoding(#[from] serde_json::Error),
}

/// Failures loading or saving [`crate::Settings`].
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("TOML encode error: {0}")]
    Encode(#[from] toml::ser::Error),
}
