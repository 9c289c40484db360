//! The merge engine.
//!
//! [`MergeEngine`] is the entry point embedders use in place of calling the
//! transport directly. It classifies every request, forwards the ones that
//! cannot be merged, and parks mergeable queries in the pending registry
//! until the debounce timer (or a manual flush) dispatches them as one batch.
//!
//! The registry, the live timer and the closed flag sit behind one lock. The
//! lock is held for enqueue and for the swap-and-clear drain only, never
//! across network I/O.

use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::Result;
use crate::config::MergeConfig;
use crate::dispatcher::Dispatcher;
use crate::eligibility::{Eligibility, MergeCandidate, classify};
use crate::error::MergeError;
use crate::http::{HttpRequest, HttpResponse};
use crate::registry::{CompletionReceiver, PendingRegistry, PendingRequest};
use crate::scheduler::DebounceScheduler;
use crate::transport::DynTransport;

/// Coalesces concurrent GraphQL queries into merged requests.
///
/// Cloning is cheap; clones share the same registry and timer.
#[derive(Clone)]
pub struct MergeEngine {
    shared: Arc<Shared>,
}

struct Shared {
    transport: DynTransport,
    dispatcher: Dispatcher,
    config: MergeConfig,
    runtime: Handle,
    state: Mutex<EngineState>,
}

struct EngineState {
    registry: PendingRegistry,
    scheduler: DebounceScheduler,
    closed: bool,
}

impl MergeEngine {
    /// Creates an engine on the current Tokio runtime.
    ///
    /// The debounce grid starts now.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime.
    #[must_use]
    pub fn new(transport: DynTransport, config: MergeConfig) -> Self {
        Self::with_runtime(transport, config, Handle::current())
    }

    /// Creates an engine with the default configuration and the given
    /// debounce interval.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime.
    #[must_use]
    pub fn with_interval(transport: DynTransport, interval: Duration) -> Self {
        Self::new(transport, MergeConfig::with_interval(interval))
    }

    /// Creates an engine whose timers and dispatches run on `runtime`.
    #[must_use]
    pub fn with_runtime(transport: DynTransport, config: MergeConfig, runtime: Handle) -> Self {
        let dispatcher = Dispatcher::new(transport.clone(), config.operation_name.clone());
        let scheduler = DebounceScheduler::new(runtime.clone(), &config);

        Self {
            shared: Arc::new(Shared {
                transport,
                dispatcher,
                config,
                runtime,
                state: Mutex::new(EngineState {
                    registry: PendingRegistry::new(),
                    scheduler,
                    closed: false,
                }),
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &MergeConfig {
        &self.shared.config
    }

    /// Executes a request, merging it with concurrent queries when possible.
    ///
    /// Mergeable queries resolve once their batch has been sent; every caller
    /// of a batch receives a copy of the same response. Opted-out requests,
    /// mutations and subscriptions are sent immediately.
    ///
    /// # Errors
    ///
    /// - [`MergeError::Precondition`] for non-`POST` requests, or a URL that
    ///   differs from the one already pending
    /// - [`MergeError::Parse`] for malformed bodies
    /// - [`MergeError::Transport`] if the (merged) send failed
    /// - [`MergeError::Cancelled`] if the engine shut down before the batch was sent
    /// - [`MergeError::Shutdown`] for mergeable requests after [`shutdown`](Self::shutdown)
    pub async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        match classify(&request)? {
            Eligibility::Bypass(reason) => {
                debug!(?reason, url = %request.url, "Bypassing merge");
                Ok(self.shared.transport.execute(request).await?)
            }
            Eligibility::Merge(candidate) => {
                let receiver = self.enqueue(candidate, request.url)?;
                receiver.await.unwrap_or_else(|_| Err(MergeError::Cancelled))
            }
        }
    }

    fn enqueue(&self, candidate: MergeCandidate, url: String) -> Result<CompletionReceiver> {
        let mut guard = self.shared.state.lock();
        let state = &mut *guard;

        if state.closed {
            return Err(MergeError::Shutdown);
        }
        if let Some(pending) = state.registry.destination().filter(|pending| *pending != url) {
            return Err(MergeError::precondition(format!(
                "All merged requests must target the same URL, '{url}' differs from pending '{pending}'"
            )));
        }

        let (request, receiver) = PendingRequest::new(candidate.document, candidate.variables, url);
        state.registry.push(request);

        let delay = state
            .scheduler
            .flush_delay(Instant::now(), state.registry.oldest_enqueued_at());
        let shared = Arc::downgrade(&self.shared);
        state.scheduler.reschedule(delay, move || Shared::on_timer(&shared));

        debug!(pending = state.registry.len(), ?delay, "Request enqueued");
        Ok(receiver)
    }

    /// Dispatches the pending batch right away, without waiting for the
    /// grid boundary. The dispatch runs in the background.
    pub fn flush(&self) {
        self.shared.state.lock().scheduler.cancel();
        self.shared.spawn_flush();
    }

    /// Dispatches the pending batch and waits for the send to complete.
    ///
    /// Returns the number of callers that received a result.
    pub async fn flush_now(&self) -> usize {
        self.shared.flush().await
    }

    /// Stops accepting mergeable requests and fails every pending one with
    /// [`MergeError::Cancelled`].
    ///
    /// Requests that bypass merging keep working. Returns the number of
    /// callers that were cancelled.
    pub fn shutdown(&self) -> usize {
        let batch = {
            let mut state = self.shared.state.lock();
            state.closed = true;
            state.scheduler.cancel();
            state.registry.take_batch()
        };

        let cancelled = batch.fail_all(MergeError::Cancelled);
        info!(cancelled, "Merge engine shut down");
        cancelled
    }

    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.shared.state.lock().closed
    }

    /// Number of requests waiting for the next batch.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.shared.state.lock().registry.len()
    }
}

impl Shared {
    fn on_timer(shared: &Weak<Self>) {
        if let Some(shared) = shared.upgrade() {
            shared.spawn_flush();
        }
    }

    /// Runs the dispatch in its own task so that cancelling the timer never
    /// aborts a send in flight.
    fn spawn_flush(self: &Arc<Self>) {
        let shared = Arc::clone(self);
        self.runtime.spawn(async move {
            shared.flush().await;
        });
    }

    async fn flush(&self) -> usize {
        let batch = {
            let mut state = self.state.lock();
            state.scheduler.cancel();
            state.registry.take_batch()
        };
        self.dispatcher.dispatch(batch).await
    }
}

impl std::fmt::Debug for MergeEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MergeEngine")
            .field("config", &self.shared.config)
            .field("pending", &self.pending_count())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use futures_util::future::join_all;
    use http::{Method, StatusCode};
    use serde_json::json;
    use tokio::task::JoinHandle;

    use super::*;
    use crate::testing::{RecordingTransport, URL, query};

    fn ms(millis: u64) -> Duration {
        Duration::from_millis(millis)
    }

    fn engine(transport: &Arc<RecordingTransport>, interval: Duration) -> MergeEngine {
        MergeEngine::with_interval(transport.clone(), interval)
    }

    fn spawn_execute(engine: &MergeEngine, request: HttpRequest) -> JoinHandle<Result<HttpResponse>> {
        let engine = engine.clone();
        tokio::spawn(async move { engine.execute(request).await })
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_queries_share_one_send() {
        let transport = RecordingTransport::new();
        let engine = engine(&transport, ms(50));

        let handles: Vec<_> = (0..5)
            .map(|i| spawn_execute(&engine, query(&format!("{{ field{i} }}"), json!({}))))
            .collect();

        for result in join_all(handles).await {
            assert_eq!(result.unwrap().unwrap().status, StatusCode::OK);
        }

        assert_eq!(transport.send_count(), 1);
        assert_eq!(
            transport.bodies()[0]["query"],
            "query MergedOperation {\n  field0\n  field1\n  field2\n  field3\n  field4\n}\n"
        );
        assert_eq!(engine.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_arrivals_flush_on_grid_boundary() {
        let transport = RecordingTransport::responding(json!({"data": {"a": 1, "b": 2}}));
        let engine = engine(&transport, ms(50));
        let start = Instant::now();

        tokio::time::sleep(ms(10)).await;
        let a = spawn_execute(&engine, query("query A($a: Int) { a(x: $a) }", json!({"a": 1})));

        tokio::time::sleep(ms(20)).await;
        let b = spawn_execute(&engine, query("query B($b: Int) { b(y: $b) }", json!({"b": 2})));

        let a = a.await.unwrap().unwrap();
        let b = b.await.unwrap().unwrap();

        assert_eq!(transport.send_count(), 1);
        let sent_after = transport.sent_at()[0] - start;
        assert!(sent_after >= ms(49) && sent_after < ms(50), "sent after {sent_after:?}");

        let body = &transport.bodies()[0];
        assert_eq!(
            body["query"],
            "query MergedOperation($a: Int, $b: Int) {\n  a(x: $a)\n  b(y: $b)\n}\n"
        );
        assert_eq!(body["variables"], json!({"a": 1, "b": 2}));

        assert_eq!(a.status, b.status);
        assert_eq!(a.headers, b.headers);
        assert_eq!(a.body, b.body);
    }

    #[tokio::test(start_paused = true)]
    async fn test_opt_out_is_sent_on_its_own() {
        let transport = RecordingTransport::new();
        let engine = engine(&transport, ms(50));
        let start = Instant::now();

        let merged = spawn_execute(&engine, query("{ a }", json!({})));
        tokio::time::sleep(ms(1)).await;

        let opted_out = query("{ b }", json!({})).with_merging(false);
        engine.execute(opted_out).await.unwrap();

        assert_eq!(transport.sent_at()[0] - start, ms(1));
        assert_eq!(transport.send_count(), 1);
        assert_eq!(transport.bodies()[0]["query"], "{ b }");

        merged.await.unwrap().unwrap();
        assert_eq!(transport.send_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_mutation_is_not_delayed() {
        let transport = RecordingTransport::new();
        let engine = engine(&transport, ms(50));
        let start = Instant::now();

        let pending = spawn_execute(&engine, query("{ a }", json!({})));
        tokio::time::sleep(ms(1)).await;

        let mutation = query("mutation { create { id } }", json!({}));
        engine.execute(mutation).await.unwrap();

        assert_eq!(transport.sent_at()[0] - start, ms(1));
        assert_eq!(transport.send_count(), 1);
        assert_eq!(transport.bodies()[0]["query"], "mutation { create { id } }");
        assert_eq!(engine.pending_count(), 1);

        pending.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_several_mutations_are_forwarded_unmerged() {
        let transport = RecordingTransport::new();
        let engine = engine(&transport, ms(50));

        let text = "mutation A { a } mutation B { b }";
        engine.execute(query(text, json!({}))).await.unwrap();

        assert_eq!(transport.send_count(), 1);
        assert_eq!(transport.bodies()[0]["query"], text);
        assert_eq!(engine.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_with_nothing_pending() {
        let transport = RecordingTransport::new();
        let engine = engine(&transport, ms(50));

        engine.flush();
        assert_eq!(engine.flush_now().await, 0);
        tokio::time::sleep(ms(200)).await;

        assert_eq!(transport.send_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_flush_skips_the_wait() {
        let transport = RecordingTransport::new();
        let engine = engine(&transport, ms(50));
        let start = Instant::now();

        let pending = spawn_execute(&engine, query("{ a }", json!({})));
        tokio::time::sleep(ms(1)).await;
        assert_eq!(engine.pending_count(), 1);

        engine.flush();
        pending.await.unwrap().unwrap();

        assert_eq!(transport.sent_at()[0] - start, ms(1));

        // The cancelled timer does not send an empty batch later.
        tokio::time::sleep(ms(200)).await;
        assert_eq!(transport.send_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_now_reports_completed_callers() {
        let transport = RecordingTransport::new();
        let engine = engine(&transport, ms(50));

        let a = spawn_execute(&engine, query("{ a }", json!({})));
        let b = spawn_execute(&engine, query("{ b }", json!({})));
        tokio::time::sleep(ms(1)).await;

        assert_eq!(engine.flush_now().await, 2);
        a.await.unwrap().unwrap();
        b.await.unwrap().unwrap();
        assert_eq!(transport.send_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_failure_fails_whole_batch() {
        let transport = RecordingTransport::failing("connection refused");
        let engine = engine(&transport, ms(50));

        let results = join_all([
            spawn_execute(&engine, query("{ a }", json!({}))),
            spawn_execute(&engine, query("{ b }", json!({}))),
        ])
        .await;

        for result in results {
            assert!(matches!(result.unwrap(), Err(MergeError::Transport(_))));
        }
        assert_eq!(transport.send_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_different_url_is_rejected() {
        let transport = RecordingTransport::new();
        let engine = engine(&transport, ms(50));

        let pending = spawn_execute(&engine, query("{ a }", json!({})));
        tokio::time::sleep(ms(1)).await;

        let other = HttpRequest::graphql("https://other.example.org/graphql", "{ b }", None);
        let err = engine.execute(other).await.unwrap_err();
        assert!(matches!(err, MergeError::Precondition(_)));
        assert_eq!(engine.pending_count(), 1);

        pending.await.unwrap().unwrap();
        assert_eq!(transport.sent()[0].url, URL);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_requests_never_enter_the_registry() {
        let transport = RecordingTransport::new();
        let engine = engine(&transport, ms(50));

        let get = HttpRequest::new(Method::GET, URL);
        assert!(matches!(
            engine.execute(get).await.unwrap_err(),
            MergeError::Precondition(_)
        ));

        let malformed = HttpRequest::post(URL, r#"{"variables": {}}"#);
        assert!(matches!(
            engine.execute(malformed).await.unwrap_err(),
            MergeError::Parse(_)
        ));

        assert_eq!(engine.pending_count(), 0);
        tokio::time::sleep(ms(200)).await;
        assert_eq!(transport.send_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_cancels_pending_requests() {
        let transport = RecordingTransport::new();
        let engine = engine(&transport, ms(50));

        let pending = spawn_execute(&engine, query("{ a }", json!({})));
        tokio::time::sleep(ms(1)).await;

        assert_eq!(engine.shutdown(), 1);
        assert!(engine.is_shutdown());
        assert!(matches!(pending.await.unwrap(), Err(MergeError::Cancelled)));

        let err = engine.execute(query("{ b }", json!({}))).await.unwrap_err();
        assert!(matches!(err, MergeError::Shutdown));

        // Bypassed requests still go through.
        engine
            .execute(query("mutation { c }", json!({})))
            .await
            .unwrap();

        tokio::time::sleep(ms(200)).await;
        assert_eq!(transport.send_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_max_delay_caps_the_wait() {
        let transport = RecordingTransport::new();
        let config = MergeConfig::with_interval(ms(50)).with_max_delay(ms(20));
        let engine = MergeEngine::new(transport.clone(), config);
        let start = Instant::now();

        tokio::time::sleep(ms(5)).await;
        spawn_execute(&engine, query("{ a }", json!({})))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(transport.sent_at()[0] - start, ms(25));
    }

    #[tokio::test(start_paused = true)]
    async fn test_later_batch_after_first_dispatch() {
        let transport = RecordingTransport::new();
        let engine = engine(&transport, ms(50));
        let start = Instant::now();

        spawn_execute(&engine, query("{ a }", json!({})))
            .await
            .unwrap()
            .unwrap();

        tokio::time::sleep(ms(11)).await;
        spawn_execute(&engine, query("{ b }", json!({})))
            .await
            .unwrap()
            .unwrap();

        let sent_at: Vec<_> = transport.sent_at().iter().map(|at| *at - start).collect();
        assert_eq!(sent_at, [ms(49), ms(99)]);
    }
}
