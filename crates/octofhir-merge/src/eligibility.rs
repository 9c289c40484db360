//! Decides whether a request may wait for a merged batch.
//!
//! Rules are applied in order:
//!
//! 1. requests that opt out of merging bypass the engine;
//! 2. anything but `POST` is rejected;
//! 3. the body is parsed; a document without a query operation bypasses,
//!    as does a non-query operation picked by `operationName`;
//! 4. everything else is merge-eligible.

use http::Method;
use serde::Deserialize;
use serde_json::Value;

use crate::Variables;
use crate::document::{Definition, Document, OperationKind, parse_definitions};
use crate::error::MergeError;
use crate::http::HttpRequest;

/// Outcome of [`classify`].
#[derive(Debug)]
pub enum Eligibility {
    /// Forward the request to the transport as-is.
    Bypass(BypassReason),
    /// Enqueue the request for the next batch.
    Merge(MergeCandidate),
}

/// Why a request is not merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BypassReason {
    OptedOut,
    /// The operation that would run is not a query.
    NotAQuery(OperationKind),
    /// The document defines fragments only.
    NoOperation,
}

/// The parsed parts of a merge-eligible request.
#[derive(Debug, Clone)]
pub struct MergeCandidate {
    pub document: Document,
    pub variables: Variables,
}

/// GraphQL-over-HTTP request body, decoded but not yet parsed.
#[derive(Debug)]
struct RequestBody {
    query: String,
    operation_name: Option<String>,
    variables: Variables,
}

#[derive(Debug, Deserialize)]
struct RawRequestBody {
    query: Option<String>,

    #[serde(rename = "operationName")]
    operation_name: Option<String>,

    variables: Option<Value>,
}

impl RequestBody {
    fn decode(body: &[u8]) -> Result<Self, MergeError> {
        let raw: RawRequestBody = serde_json::from_slice(body)?;

        let query = raw
            .query
            .ok_or_else(|| MergeError::parse("Cannot find 'query' in the request body"))?;

        let variables = match raw.variables {
            None | Some(Value::Null) => Variables::new(),
            Some(Value::Object(map)) => map,
            Some(other) => {
                return Err(MergeError::parse(format!(
                    "'variables' must be an object, got {other}"
                )));
            }
        };

        Ok(Self {
            query,
            operation_name: raw.operation_name,
            variables,
        })
    }
}

/// Parses a GraphQL request body into its document and variables.
///
/// # Errors
///
/// Returns [`MergeError::Parse`] if the body is not JSON, has no `query`,
/// has `variables` that are not an object, or the query text is invalid.
pub fn parse_request_body(body: &[u8]) -> Result<MergeCandidate, MergeError> {
    let body = RequestBody::decode(body)?;
    let document =
        Document::from_definitions(parse_definitions(&body.query)?, body.operation_name.as_deref())?;

    Ok(MergeCandidate {
        document,
        variables: body.variables,
    })
}

/// Classifies a request for the merge engine.
///
/// Without `operationName`, a document whose operations are all mutations or
/// subscriptions bypasses even when it holds several of them. Several
/// operations including a query still need `operationName`.
///
/// # Errors
///
/// Returns [`MergeError::Precondition`] for methods other than `POST` and
/// [`MergeError::Parse`] for malformed bodies.
pub fn classify(request: &HttpRequest) -> Result<Eligibility, MergeError> {
    if !request.allow_merging {
        return Ok(Eligibility::Bypass(BypassReason::OptedOut));
    }

    if request.method != Method::POST {
        return Err(MergeError::precondition(format!(
            "Only POST requests can be merged, got {}",
            request.method
        )));
    }

    let body = RequestBody::decode(request.body.as_deref().unwrap_or_default())?;
    let definitions = parse_definitions(&body.query)?;

    if body.operation_name.is_none() {
        let mut kinds = definitions.iter().filter_map(Definition::operation_kind);
        if !kinds.clone().any(|kind| kind == OperationKind::Query) {
            let reason = kinds
                .next()
                .map_or(BypassReason::NoOperation, BypassReason::NotAQuery);
            return Ok(Eligibility::Bypass(reason));
        }
    }

    let document = Document::from_definitions(definitions, body.operation_name.as_deref())?;
    match document.operation_type {
        OperationKind::Query => Ok(Eligibility::Merge(MergeCandidate {
            document,
            variables: body.variables,
        })),
        kind => Ok(Eligibility::Bypass(BypassReason::NotAQuery(kind))),
    }
}
