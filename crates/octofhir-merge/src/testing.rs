//! In-memory transport for engine and dispatcher tests.

use std::sync::Arc;

use async_trait::async_trait;
use http::StatusCode;
use http::header::{CONTENT_TYPE, HeaderValue};
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::time::Instant;

use crate::http::{APPLICATION_JSON, HttpRequest, HttpResponse};
use crate::transport::{HttpTransport, TransportError};

pub const URL: &str = "https://example.org/graphql";

/// Records every request it receives and answers with a canned response.
#[derive(Debug)]
pub struct RecordingTransport {
    sent: Mutex<Vec<(Instant, HttpRequest)>>,
    response: Mutex<Result<HttpResponse, String>>,
}

impl RecordingTransport {
    pub fn new() -> Arc<Self> {
        Self::responding(json!({"data": {"ok": true}}))
    }

    pub fn responding(body: Value) -> Arc<Self> {
        let response = HttpResponse::new(StatusCode::OK)
            .with_header(CONTENT_TYPE, HeaderValue::from_static(APPLICATION_JSON))
            .with_body(body.to_string());

        Arc::new(Self {
            sent: Mutex::new(Vec::new()),
            response: Mutex::new(Ok(response)),
        })
    }

    pub fn failing(message: &str) -> Arc<Self> {
        let transport = Self::new();
        *transport.response.lock() = Err(message.to_string());
        transport
    }

    pub fn sent(&self) -> Vec<HttpRequest> {
        self.sent.lock().iter().map(|(_, r)| r.clone()).collect()
    }

    pub fn sent_at(&self) -> Vec<Instant> {
        self.sent.lock().iter().map(|(at, _)| *at).collect()
    }

    pub fn send_count(&self) -> usize {
        self.sent.lock().len()
    }

    /// JSON bodies of every recorded request.
    pub fn bodies(&self) -> Vec<Value> {
        self.sent
            .lock()
            .iter()
            .map(|(_, r)| serde_json::from_slice(r.body.as_deref().unwrap_or_default()).unwrap())
            .collect()
    }
}

#[async_trait]
impl HttpTransport for RecordingTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        self.sent.lock().push((Instant::now(), request));
        self.response.lock().clone().map_err(TransportError::Network)
    }
}

/// A mergeable GraphQL request against [`URL`].
pub fn query(text: &str, variables: Value) -> HttpRequest {
    let variables = variables.as_object().cloned();
    HttpRequest::graphql(URL, text, variables)
}
