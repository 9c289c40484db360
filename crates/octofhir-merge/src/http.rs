//! HTTP request and response values exchanged with the transport.
//!
//! Responses are fully buffered so a single merged response can be copied to
//! every waiting caller.

use bytes::Bytes;
use http::header::{CONTENT_TYPE, HeaderName, HeaderValue};
use http::{HeaderMap, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::json;

use crate::Variables;

/// Content type of GraphQL-over-HTTP request bodies.
pub const APPLICATION_JSON: &str = "application/json";

/// An outbound HTTP request.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
    /// Whether the merge engine may coalesce this request with others.
    /// Defaults to `true`.
    pub allow_merging: bool,
}

impl HttpRequest {
    /// Creates a request without a body.
    #[must_use]
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HeaderMap::new(),
            body: None,
            allow_merging: true,
        }
    }

    /// Creates a `POST` request with the given body.
    #[must_use]
    pub fn post(url: impl Into<String>, body: impl Into<Bytes>) -> Self {
        Self::new(Method::POST, url).with_body(body)
    }

    /// Creates a GraphQL `POST` request with a JSON body
    /// `{"query": ..., "variables": ...}`.
    #[must_use]
    pub fn graphql(url: impl Into<String>, query: &str, variables: Option<Variables>) -> Self {
        let body = json!({
            "query": query,
            "variables": variables.unwrap_or_default(),
        });

        Self::json(url, body.to_string())
    }

    /// Creates a `POST` request with a JSON body and matching `Content-Type`.
    #[must_use]
    pub fn json(url: impl Into<String>, body: impl Into<Bytes>) -> Self {
        Self::post(url, body).with_header(CONTENT_TYPE, HeaderValue::from_static(APPLICATION_JSON))
    }

    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    #[must_use]
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Opts this request in or out of merging.
    ///
    /// Requests with merging disabled are forwarded to the transport
    /// immediately and never wait for a debounce window.
    #[must_use]
    pub fn with_merging(mut self, allow: bool) -> Self {
        self.allow_merging = allow;
        self
    }
}

/// A buffered HTTP response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl HttpResponse {
    /// Creates an empty response with the given status.
    #[must_use]
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    #[must_use]
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Deserializes the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the body is not valid JSON for `T`.
    pub fn json<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_slice(&self.body)
    }

    /// Returns the body as UTF-8 text, replacing invalid sequences.
    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}
