//! Error types for prefetch resolution.

use thiserror::Error;

use crate::transport::TransportError;

/// Errors that abort the resolution of a single predicate.
#[derive(Debug, Error)]
pub enum PrefetchError {
    #[error("Invalid base URL {url}: {source}")]
    BaseUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The response parsed but is not a member collection.
    #[error("Unexpected response shape: {0}")]
    Shape(String),
}
