//! # octofhir-merge
//!
//! Client-side request coalescing for GraphQL endpoints.
//!
//! Many independently issued queries that arrive within a short debounce
//! window are merged into one synthetic operation, sent as a single HTTP
//! request, and the one response is handed back to every original caller.
//! This cuts the round-trip count for bursts of compatible queries, for
//! example several UI components querying the same endpoint at once.
//!
//! ## Overview
//!
//! ```text
//! caller ──execute──▶ eligibility ──bypass──────────────────────▶ transport
//!                          │
//!                          ▼
//!                      registry ◀── scheduler (grid-aligned debounce)
//!                          │
//!                      dispatcher ── merge ── serialize ──▶ transport (once)
//!                          │
//!                  fan-out to every waiting caller
//! ```
//!
//! Only `query` operations are merged. Mutations, subscriptions and requests
//! that opt out via [`HttpRequest::with_merging`] go straight to the transport.
//!
//! ## Limitations
//!
//! No validation is made that merged operations are compatible:
//!
//! - conflicting field aliases or arguments between operations will fail on the server
//! - conflicting variable names will fail (variables are merged last-writer-wins)
//! - conflicting fragment names will fail
//! - operation directives are dropped
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use octofhir_merge::{HttpRequest, MergeConfig, MergeEngine, ReqwestTransport, TransportConfig};
//!
//! let transport = Arc::new(ReqwestTransport::new(&TransportConfig::default())?);
//! let engine = MergeEngine::new(transport, MergeConfig::default());
//!
//! let request = HttpRequest::graphql("https://example.org/graphql", "{ me { id } }", None);
//! let response = engine.execute(request).await?;
//! ```
//!
//! ## Modules
//!
//! - [`document`] - Parsed request documents, parsing and printing
//! - [`eligibility`] - Decides whether a request may be merged
//! - [`merge`] - Document and variables merge algorithm
//! - [`registry`] - Pending requests and drained batches
//! - [`scheduler`] - Grid-aligned debounce timer
//! - [`dispatcher`] - Single send and response fan-out
//! - [`engine`] - The public [`MergeEngine`]
//! - [`transport`] - Transport abstraction and the reqwest implementation

pub mod config;
pub mod dispatcher;
pub mod document;
pub mod eligibility;
pub mod engine;
pub mod error;
pub mod http;
pub mod merge;
pub mod registry;
pub mod scheduler;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

// Re-export main types
pub use config::{MergeConfig, TransportConfig};
pub use document::{Document, OperationKind, parse, parse_operation};
pub use engine::MergeEngine;
pub use error::MergeError;
pub use crate::http::{HttpRequest, HttpResponse};
pub use merge::{MERGED_OPERATION_NAME, merge_documents, merge_variables};
pub use transport::{DynTransport, HttpTransport, ReqwestTransport, TransportError};

/// Variables payload of a GraphQL request.
pub type Variables = serde_json::Map<String, serde_json::Value>;

/// Result type for merge engine operations.
pub type Result<T> = std::result::Result<T, MergeError>;
