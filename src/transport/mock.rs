//! # Mock Transport
//!
//! A scripted [`Transport`] for testing the planner without a live backend.
//!
//! Queue the responses you expect, run the code under test, then call
//! [`MockTransport::verify`] to make sure every expectation was consumed.
//!
//! ```ignore
//! let mock = MockTransport::new();
//! mock.expect_request("mxapiasset").return_keys("assetnum", &["A100", "A101"]);
//!
//! let transport: Arc<dyn Transport> = Arc::new(mock.clone());
//! // run the planner...
//! mock.verify();
//! ```

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{RequestDescriptor, Transport, TransportError, TransportResponse};

/// One queued answer, optionally bound to a related resource.
struct Expectation {
    resource: Option<String>,
    response: Result<TransportResponse, TransportError>,
}

#[derive(Default)]
struct MockState {
    expectations: VecDeque<Expectation>,
    requests: Vec<(String, RequestDescriptor)>,
}

/// A transport that replays queued responses in order.
///
/// Clones share the same queue, so one handle can be given to the planner while
/// the test keeps another for assertions.
#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Expects the next request, whatever resource it targets.
    pub fn expect_any(&self) -> ResponseBuilder {
        ResponseBuilder {
            resource: None,
            state: self.state.clone(),
        }
    }

    /// Expects the next request to query `resource`.
    pub fn expect_request(&self, resource: impl Into<String>) -> ResponseBuilder {
        ResponseBuilder {
            resource: Some(resource.into()),
            state: self.state.clone(),
        }
    }

    /// Requests received so far, with the tenant they were sent for.
    pub fn requests(&self) -> Vec<(String, RequestDescriptor)> {
        self.state.lock().unwrap().requests.clone()
    }

    /// Panics if any queued expectation was not consumed.
    pub fn verify(&self) {
        let state = self.state.lock().unwrap();
        if !state.expectations.is_empty() {
            panic!("Not all expectations were met. {} remaining", state.expectations.len());
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, tenant: &str, request: RequestDescriptor) -> Result<TransportResponse, TransportError> {
        let mut state = self.state.lock().unwrap();
        let expectation = state
            .expectations
            .pop_front()
            .unwrap_or_else(|| panic!("Unexpected request: {}", request.url));
        if let Some(resource) = &expectation.resource {
            let path = format!("/os/{resource}?");
            assert!(
                request.url.contains(&path),
                "Expected a request for {resource}, got {}",
                request.url
            );
        }
        state.requests.push((tenant.to_string(), request));
        expectation.response
    }
}

/// Builder completing an expectation with its response.
pub struct ResponseBuilder {
    resource: Option<String>,
    state: Arc<Mutex<MockState>>,
}

impl ResponseBuilder {
    /// Answers with an already decoded JSON body.
    pub fn return_json(self, body: Value) {
        self.push(Ok(TransportResponse::Json(body)));
    }

    /// Answers with a raw text envelope.
    pub fn return_envelope(self, status: u16, body: impl Into<String>) {
        self.push(Ok(TransportResponse::envelope(status, body)));
    }

    /// Answers with a lean member collection holding `keys` under `field`.
    pub fn return_keys(self, field: &str, keys: &[&str]) {
        let member: Vec<Value> = keys.iter().map(|k| json!({ field: k })).collect();
        self.return_json(json!({ "member": member }));
    }

    /// Fails the request.
    pub fn return_err(self, error: TransportError) {
        self.push(Err(error));
    }

    fn push(self, response: Result<TransportResponse, TransportError>) {
        let mut state = self.state.lock().unwrap();
        state.expectations.push_back(Expectation {
            resource: self.resource,
            response,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::Headers;

    fn request(url: &str) -> RequestDescriptor {
        RequestDescriptor {
            method: "GET".into(),
            url: url.into(),
            headers: Headers::new(),
            title: "test".into(),
            metadata: Value::Null,
        }
    }

    #[tokio::test]
    async fn replays_in_order() {
        let mock = MockTransport::new();
        mock.expect_request("mxapiasset").return_keys("assetnum", &["A1"]);
        mock.expect_any().return_envelope(500, "boom");

        let first = mock.send("acme", request("https://h/os/mxapiasset?lean=1")).await.unwrap();
        assert_eq!(first.into_json().unwrap()["member"][0]["assetnum"], "A1");

        let second = mock.send("acme", request("https://h/os/other?lean=1")).await.unwrap();
        assert!(second.into_json().is_err());

        assert_eq!(mock.requests().len(), 2);
        assert_eq!(mock.requests()[0].0, "acme");
        mock.verify();
    }

    #[test]
    #[should_panic(expected = "Not all expectations were met")]
    fn verify_detects_leftovers() {
        let mock = MockTransport::new();
        mock.expect_any().return_err(TransportError::Failed("down".into()));
        mock.verify();
    }
}
