// =============================================================================
// Deterministic Clock — context-scoped time source
// =============================================================================
//
// Every time read on the decision path (signal generation, expiry, artifact
// timestamps, risk date rollover) goes through `clock::now()`. Production
// code runs without a scope and falls back to the system clock; tests attach
// a `FixedClock` to the task context and replay cycles against frozen time.
//
// Reading `Utc::now()` directly anywhere on the decision path is a bug.
// =============================================================================

use std::sync::Arc;

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use parking_lot::Mutex;

/// A source of the current instant.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Real wall-clock time. Production default.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock frozen at a preset instant, advanced manually.
#[derive(Debug)]
pub struct FixedClock {
    current: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn at(instant: DateTime<Utc>) -> Self {
        Self {
            current: Mutex::new(instant),
        }
    }

    /// Move the clock forward. Negative durations are rejected: a clock that
    /// runs backwards would invalidate every expiry comparison downstream.
    pub fn advance(&self, delta: Duration) {
        assert!(
            delta >= Duration::zero(),
            "FixedClock cannot advance by a negative duration"
        );
        let mut current = self.current.lock();
        *current = *current + delta;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.current.lock()
    }
}

tokio::task_local! {
    static SCOPED_CLOCK: Arc<dyn Clock>;
}

/// Current instant from the clock attached to the task context, falling back
/// to the system clock when no scope is active.
pub fn now() -> DateTime<Utc> {
    SCOPED_CLOCK
        .try_with(|c| c.now())
        .unwrap_or_else(|_| Utc::now())
}

/// Run a future with `clock` attached to the task context.
pub async fn scope<F>(clock: Arc<dyn Clock>, fut: F) -> F::Output
where
    F: std::future::Future,
{
    SCOPED_CLOCK.scope(clock, fut).await
}

/// Synchronous variant of [`scope`] for non-async call sites and tests.
pub fn sync_scope<F, R>(clock: Arc<dyn Clock>, f: F) -> R
where
    F: FnOnce() -> R,
{
    SCOPED_CLOCK.sync_scope(clock, f)
}

/// Canonical timestamp format for persistence: RFC 3339 UTC with microsecond
/// precision. Fixed-width, so lexicographic order equals chronological order.
pub fn fmt_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a timestamp written by [`fmt_ts`].
pub fn parse_ts(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
