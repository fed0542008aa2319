//! Exponential backoff with jitter.

use std::time::Duration;

use rand::Rng;

fn capped_delay(attempt: u32, base_ms: u64, max_ms: u64) -> u64 {
    let exponential_base = 2u64.saturating_pow(attempt - 1);
    let delay_ms = base_ms.saturating_mul(exponential_base);
    delay_ms.clamp(base_ms.min(max_ms), max_ms)
}

/// Calculate the delay after `attempt` failed attempts.
///
/// The delay doubles with every attempt starting at `base_ms` and never
/// exceeds `max_ms`, jitter included.
pub fn calculate_backoff(attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
    if attempt == 0 {
        return Duration::from_millis(0);
    }

    let capped_delay = capped_delay(attempt, base_ms, max_ms);

    // Apply jitter (0 to 10% of the delay)
    let jitter_range = capped_delay / 10;
    let jitter = if jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };

    Duration::from_millis(capped_delay.saturating_add(jitter).min(max_ms))
}

/// Upper bound of [`calculate_backoff`] for `attempt`, jitter included.
pub fn max_backoff(attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }
    let capped_delay = capped_delay(attempt, base_ms, max_ms);
    Duration::from_millis(capped_delay.saturating_add(capped_delay / 10).min(max_ms))
}
