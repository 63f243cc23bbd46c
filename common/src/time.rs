use std::time::{Duration, Instant};

/// Fractional milliseconds between two instants.
pub fn elapsed_ms(from: Instant, to: Instant) -> f64 {
    duration_ms(to.saturating_duration_since(from))
}

pub fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1_000.0
}
