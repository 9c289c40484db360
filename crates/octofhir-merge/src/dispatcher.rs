//! Batch dispatch.
//!
//! Turns a drained [`Batch`] into exactly one outbound request, sends it once
//! and resolves every completion slot of the batch with the outcome. A failed
//! send is delivered to every waiter of the batch.

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::Variables;
use crate::error::MergeError;
use crate::http::HttpRequest;
use crate::merge::{merge_documents_named, merge_variables};
use crate::registry::Batch;
use crate::transport::DynTransport;

/// Wire body of a merged request.
#[derive(Debug, Serialize)]
struct MergedPayload<'a> {
    query: &'a str,
    variables: &'a Variables,
}

/// Sends batches through the transport.
#[derive(Clone)]
pub struct Dispatcher {
    transport: DynTransport,
    operation_name: String,
}

impl Dispatcher {
    pub fn new(transport: DynTransport, operation_name: impl Into<String>) -> Self {
        Self {
            transport,
            operation_name: operation_name.into(),
        }
    }

    /// Builds the single merged request for a batch.
    ///
    /// The request is opted out of merging so it cannot re-enter an engine.
    ///
    /// # Errors
    ///
    /// Returns [`MergeError::Precondition`] if the batch is empty, targets more
    /// than one URL, or its merged body cannot be encoded.
    pub fn build_request(&self, batch: &Batch) -> Result<HttpRequest, MergeError> {
        let url = batch.destination()?;

        let document =
            merge_documents_named(batch.requests().map(|r| &r.document), &self.operation_name);
        let variables = merge_variables(batch.requests().map(|r| &r.variables));
        let query = document.serialize();

        // String keys and JSON values only; encoding does not fail in practice.
        let body = serde_json::to_vec(&MergedPayload {
            query: &query,
            variables: &variables,
        })
        .map_err(|e| MergeError::precondition(format!("Failed to encode merged request: {e}")))?;

        Ok(HttpRequest::json(url, body).with_merging(false))
    }

    /// Sends the batch and fans the outcome out to its callers.
    ///
    /// Returns the number of callers that received a result.
    #[instrument(skip(self, batch), fields(batch_size = batch.len()))]
    pub async fn dispatch(&self, batch: Batch) -> usize {
        if batch.is_empty() {
            debug!("Nothing to dispatch");
            return 0;
        }

        let request = match self.build_request(&batch) {
            Ok(request) => request,
            Err(e) => {
                warn!(error = %e, code = e.error_code(), "Batch rejected before send");
                return batch.fail_all(e);
            }
        };

        info!(url = %request.url, "Sending merged request");

        match self.transport.execute(request).await {
            Ok(response) => {
                debug!(status = %response.status, "Merged request completed");
                batch.complete_all(Ok(response))
            }
            Err(e) => {
                warn!(error = %e, "Merged request failed");
                batch.fail_all(e.into())
            }
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("operation_name", &self.operation_name)
            .finish_non_exhaustive()
    }
}
