//! Error types for the relationship configuration store.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while reading a single configuration layer.
///
/// These never leave the store: [`ConfigStore::load`](super::ConfigStore::load)
/// logs them and treats the layer as absent.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The override file exists but could not be read.
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The override file is not valid relationship JSON.
    #[error("Malformed relationship file {path}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
