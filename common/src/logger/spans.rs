use std::time::{Duration, Instant};

use tracing::{Span, field};

/// Span wrapping a single feed update from receipt to dispatch.
///
/// `ts_ms` is recorded once the book timestamp is known.
pub fn update_span(seq: u64) -> Span {
    tracing::info_span!("update", seq, ts_ms = field::Empty)
}

/// Runs `f` and emits a `performance` warning if it took longer than `max`.
pub fn warn_if_slow<F, T>(label: &'static str, max: Duration, f: F) -> T
where
    F: FnOnce() -> T,
{
    let start = Instant::now();
    let out = f();
    let elapsed = start.elapsed();
    if elapsed > max {
        tracing::warn!(
            target: "performance",
            label = label,
            elapsed_us = elapsed.as_micros() as u64,
            "slow operation detected"
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn warn_if_slow_returns_closure_output() {
        let out = warn_if_slow("noop", Duration::from_secs(1), || 40 + 2);
        assert_eq!(out, 42);
    }

    #[test]
    fn update_span_accepts_timestamp() {
        let span = update_span(7);
        span.record("ts_ms", 1_700_000_000_000u64);
    }
}
