//! Grid-aligned debounce timer.
//!
//! Flushes are aligned to a fixed grid of `interval` ticks measured from the
//! moment the scheduler was created, not to "interval after the last
//! arrival". Every arrival cancels the live timer and arms a new one at the
//! next grid boundary, so a burst keeps sliding the flush forward one
//! boundary at a time until arrivals stop. An optional `max_delay` caps how
//! far the flush may slide past the arrival of the oldest pending request.

use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::trace;

use crate::config::MergeConfig;

/// How much earlier than the exact grid boundary a timer fires.
pub const BOUNDARY_LEAD: Duration = Duration::from_millis(1);

/// Time left until the next grid boundary, minus [`BOUNDARY_LEAD`].
///
/// With a 50ms grid, an arrival 10ms after the start flushes at 49ms.
#[must_use]
pub fn next_tick_delay(elapsed: Duration, interval: Duration) -> Duration {
    if interval.is_zero() {
        return Duration::ZERO;
    }

    let interval_nanos = interval.as_nanos();
    let into_window = elapsed.as_nanos() % interval_nanos;
    let remaining = u64::try_from(interval_nanos - into_window).unwrap_or(u64::MAX);

    Duration::from_nanos(remaining).saturating_sub(BOUNDARY_LEAD)
}

/// Owns the single live flush timer of an engine.
#[derive(Debug)]
pub struct DebounceScheduler {
    runtime: Handle,
    started: Instant,
    interval: Duration,
    max_delay: Option<Duration>,
    timer: Option<JoinHandle<()>>,
}

impl DebounceScheduler {
    /// Creates a scheduler whose grid starts now.
    #[must_use]
    pub fn new(runtime: Handle, config: &MergeConfig) -> Self {
        Self {
            runtime,
            started: Instant::now(),
            interval: config.interval,
            max_delay: config.max_delay,
            timer: None,
        }
    }

    /// Origin of the debounce grid.
    #[must_use]
    pub fn started(&self) -> Instant {
        self.started
    }

    /// Delay from `now` until the next flush should fire.
    ///
    /// `oldest` is the arrival time of the oldest pending request and only
    /// matters when a `max_delay` is configured.
    #[must_use]
    pub fn flush_delay(&self, now: Instant, oldest: Option<Instant>) -> Duration {
        let elapsed = now.saturating_duration_since(self.started);
        let delay = next_tick_delay(elapsed, self.interval);

        match (self.max_delay, oldest) {
            (Some(max_delay), Some(oldest)) => {
                delay.min((oldest + max_delay).saturating_duration_since(now))
            }
            _ => delay,
        }
    }

    /// Cancels the live timer, if any, and arms a new one that calls `fire`
    /// after `delay`.
    pub fn reschedule<F>(&mut self, delay: Duration, fire: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.cancel();
        trace!(?delay, "Flush timer armed");

        self.timer = Some(self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            fire();
        }));
    }

    /// Cancels the live timer. Returns `true` if a timer was still pending.
    pub fn cancel(&mut self) -> bool {
        match self.timer.take() {
            Some(timer) => {
                let pending = !timer.is_finished();
                timer.abort();
                pending
            }
            None => false,
        }
    }

    /// Whether a timer is armed and has not fired yet.
    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.timer.as_ref().is_some_and(|timer| !timer.is_finished())
    }
}

impl Drop for DebounceScheduler {
    fn drop(&mut self) {
        self.cancel();
    }
}
