//! Prometheus metrics
//!
//! Thin wrappers over the `metrics` facade. Without an installed recorder
//! (tests, exporter disabled) every call is a no-op.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::time::Duration;

/// Outcome of one protective-stop update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopUpdateOutcome {
    /// Exchange accepted the new stop
    Applied,
    /// Exchange already held the stop, no write sent
    Skipped,
    /// Exchange rejected the stop
    Rejected,
    /// Retries exhausted on a transient failure
    Exhausted,
}

impl StopUpdateOutcome {
    fn label(&self) -> &'static str {
        match self {
            StopUpdateOutcome::Applied => "applied",
            StopUpdateOutcome::Skipped => "skipped",
            StopUpdateOutcome::Rejected => "rejected",
            StopUpdateOutcome::Exhausted => "exhausted",
        }
    }
}

/// Record an exchange read latency ("price" or "position")
pub fn record_feed_latency(kind: &'static str, duration: Duration) {
    metrics::histogram!("trailguard_feed_latency_ms", "kind" => kind)
        .record(duration.as_secs_f64() * 1000.0);
}

/// Count a failed feed read
pub fn record_feed_error(symbol: &str, kind: &'static str) {
    metrics::counter!(
        "trailguard_feed_errors_total",
        "symbol" => symbol.to_string(),
        "kind" => kind
    )
    .increment(1);
}

/// Count a stop update by outcome
pub fn record_stop_update(symbol: &str, outcome: StopUpdateOutcome) {
    metrics::counter!(
        "trailguard_stop_updates_total",
        "symbol" => symbol.to_string(),
        "outcome" => outcome.label()
    )
    .increment(1);
}

/// Publish the stop currently held by the exchange
pub fn set_current_stop(symbol: &str, stop: Decimal) {
    metrics::gauge!("trailguard_current_stop", "symbol" => symbol.to_string())
        .set(stop.to_f64().unwrap_or_default());
}

/// Publish the number of running monitors
pub fn set_active_monitors(count: usize) {
    metrics::gauge!("trailguard_active_monitors").set(count as f64);
}
