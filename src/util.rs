//! Small helpers shared across agents.

use std::time::Instant;

use std::sync::OnceLock;

static START: OnceLock<Instant> = OnceLock::new();

/// Monotonic nanosecond clock, relative to process start. Used for latency
/// telemetry and sequencing — never for wall-clock display.
pub fn monotonic_ns() -> u64 {
    let start = START.get_or_init(Instant::now);
    start.elapsed().as_nanos() as u64
}
