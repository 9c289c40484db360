//! Pending requests and batches.
//!
//! Every mergeable request waits in the [`PendingRegistry`] together with the
//! sending half of a oneshot channel, its completion slot. Draining the
//! registry swaps its contents out into a [`Batch`], so a request can only
//! ever be part of one batch.

use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::trace;

use crate::Variables;
use crate::document::Document;
use crate::error::MergeError;
use crate::http::HttpResponse;

/// Result delivered to a waiting caller.
pub type Completion = Result<HttpResponse, MergeError>;

/// Receiving half of a pending request's completion slot.
pub type CompletionReceiver = oneshot::Receiver<Completion>;

/// A mergeable request waiting for its batch.
#[derive(Debug)]
pub struct PendingRequest {
    pub document: Document,
    pub variables: Variables,
    pub url: String,
    pub enqueued_at: Instant,
    completion: oneshot::Sender<Completion>,
}

impl PendingRequest {
    /// Creates a pending request and the receiver its caller waits on.
    #[must_use]
    pub fn new(
        document: Document,
        variables: Variables,
        url: impl Into<String>,
    ) -> (Self, CompletionReceiver) {
        let (completion, receiver) = oneshot::channel();
        let pending = Self {
            document,
            variables,
            url: url.into(),
            enqueued_at: Instant::now(),
            completion,
        };
        (pending, receiver)
    }

    /// Resolves the completion slot. Returns `false` if the caller is gone.
    pub fn complete(self, result: Completion) -> bool {
        self.completion.send(result).is_ok()
    }
}

/// Requests that have not been sent yet, in arrival order.
#[derive(Debug, Default)]
pub struct PendingRegistry {
    pending: Vec<PendingRequest>,
}

impl PendingRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, request: PendingRequest) {
        self.pending.push(request);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Destination shared by the pending requests, if any are pending.
    #[must_use]
    pub fn destination(&self) -> Option<&str> {
        self.pending.first().map(|p| p.url.as_str())
    }

    /// Arrival time of the oldest pending request.
    #[must_use]
    pub fn oldest_enqueued_at(&self) -> Option<Instant> {
        self.pending.first().map(|p| p.enqueued_at)
    }

    /// Moves every pending request into a batch, leaving the registry empty.
    pub fn take_batch(&mut self) -> Batch {
        Batch {
            requests: std::mem::take(&mut self.pending),
        }
    }
}

/// A drained set of pending requests, dispatched together.
#[derive(Debug, Default)]
pub struct Batch {
    requests: Vec<PendingRequest>,
}

impl Batch {
    #[must_use]
    pub fn len(&self) -> usize {
        self.requests.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    pub fn requests(&self) -> impl Iterator<Item = &PendingRequest> {
        self.requests.iter()
    }

    /// The single destination URL of the batch.
    ///
    /// # Errors
    ///
    /// Returns [`MergeError::Precondition`] if the batch is empty or its
    /// requests target different URLs.
    pub fn destination(&self) -> Result<&str, MergeError> {
        let first = self
            .requests
            .first()
            .ok_or_else(|| MergeError::precondition("Batch is empty"))?;

        if let Some(other) = self.requests.iter().find(|r| r.url != first.url) {
            return Err(MergeError::precondition(format!(
                "All merged requests must target the same URL, got '{}' and '{}'",
                first.url, other.url
            )));
        }
        Ok(&first.url)
    }

    /// Resolves every completion slot with its own copy of `result`.
    ///
    /// Returns the number of callers that were still waiting.
    pub fn complete_all(self, result: Completion) -> usize {
        let total = self.requests.len();
        let delivered = self
            .requests
            .into_iter()
            .map(|request| request.complete(result.clone()))
            .filter(|delivered| *delivered)
            .count();

        if delivered < total {
            trace!(dropped = total - delivered, "Some callers stopped waiting");
        }
        delivered
    }

    /// Fails every completion slot with the same error.
    pub fn fail_all(self, error: MergeError) -> usize {
        self.complete_all(Err(error))
    }
}

impl From<Vec<PendingRequest>> for Batch {
    fn from(requests: Vec<PendingRequest>) -> Self {
        Self { requests }
    }
}
