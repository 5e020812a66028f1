//! # Transport Boundary
//!
//! The planner never talks HTTP itself. It builds a [`RequestDescriptor`] and hands
//! it to a [`Transport`] supplied by the host application, together with headers
//! from an [`AuthProvider`] and a base URL from a [`BaseUrlProvider`].
//!
//! Hosts answer in one of two shapes, captured by [`TransportResponse`]:
//! an already parsed JSON body, or a raw text envelope that still needs parsing.
//! [`TransportResponse::into_json`] is the single place where both shapes are
//! normalized.
//!
//! For tests see the [`mock`] module.

pub mod mock;

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// Header name → value.
pub type Headers = BTreeMap<String, String>;

/// Everything a transport needs to perform one request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestDescriptor {
    pub method: String,
    pub url: String,
    pub headers: Headers,
    /// Human readable label for logs and request inspectors.
    pub title: String,
    /// Free-form metadata forwarded to the transport.
    pub metadata: Value,
}

/// Response handed back by a [`Transport`].
#[derive(Debug, Clone, PartialEq)]
pub enum TransportResponse {
    /// Body already decoded by the transport.
    Json(Value),
    /// Raw status and body text.
    Envelope { status: u16, body: String },
}

impl TransportResponse {
    pub fn json(body: Value) -> Self {
        TransportResponse::Json(body)
    }

    pub fn envelope(status: u16, body: impl Into<String>) -> Self {
        TransportResponse::Envelope {
            status,
            body: body.into(),
        }
    }

    /// Normalizes both shapes into a JSON value.
    ///
    /// # Errors
    /// - [`TransportError::Status`] for a non-2xx envelope
    /// - [`TransportError::Parse`] when the envelope body is not JSON
    pub fn into_json(self) -> Result<Value, TransportError> {
        match self {
            TransportResponse::Json(body) => Ok(body),
            TransportResponse::Envelope { status, body } => {
                if !(200..300).contains(&status) {
                    return Err(TransportError::Status {
                        status,
                        body: preview(&body),
                    });
                }
                Ok(serde_json::from_str(&body)?)
            }
        }
    }
}

const BODY_PREVIEW_CHARS: usize = 256;

fn preview(body: &str) -> String {
    body.chars().take(BODY_PREVIEW_CHARS).collect()
}

/// Errors reported by, or while decoding the answer of, a transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The request could not be performed (connection, timeout, ...).
    #[error("Transport failed: {0}")]
    Failed(String),

    #[error("Unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Unparsable response body: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Performs requests on behalf of the planner.
///
/// Timeouts and connection pooling are the implementor's concern.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, tenant: &str, request: RequestDescriptor) -> Result<TransportResponse, TransportError>;
}

/// Supplies authentication headers for a tenant.
pub trait AuthProvider: Send + Sync {
    fn headers(&self, tenant: &str) -> Headers;
}

impl<F> AuthProvider for F
where
    F: Fn(&str) -> Headers + Send + Sync,
{
    fn headers(&self, tenant: &str) -> Headers {
        self(tenant)
    }
}

/// Supplies the API base URL for a tenant.
pub trait BaseUrlProvider: Send + Sync {
    fn base_url(&self, tenant: &str) -> String;
}

impl<F> BaseUrlProvider for F
where
    F: Fn(&str) -> String + Send + Sync,
{
    fn base_url(&self, tenant: &str) -> String {
        self(tenant)
    }
}
