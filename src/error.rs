//! Error types for the mirror snapshot and verification tools.

use std::path::PathBuf;
use thiserror::Error;

/// Metadata store errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Failed to open metadata store at {path:?}: {message}")]
    Open { path: PathBuf, message: String },

    #[error("Metadata store read failed: {0}")]
    Read(String),

    #[error("Metadata store write failed: {0}")]
    Write(String),

    #[error("Corrupt metadata store entry: {0}")]
    Corrupt(String),

    #[error("Failed to close metadata store: {0}")]
    Close(String),
}

/// Run-level errors. Any of these aborts a create or verify run.
#[derive(Debug, Error)]
pub enum MirrorError {
    #[error("Unable to scan directory {path:?}: {source}")]
    Scan {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("File name is not valid UTF-8: {path:?}")]
    InvalidName { path: PathBuf },

    #[error("Unable to open {path:?}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unable to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Usage(String),

    #[error("Unable to write report: {0}")]
    Report(#[source] std::io::Error),

    #[error("Not supported: {0}")]
    Unsupported(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<config::ConfigError> for MirrorError {
    fn from(err: config::ConfigError) -> Self {
        MirrorError::Config(err.to_string())
    }
}
