//! Exponential backoff with jitter.

use std::time::Duration;
use rand::Rng;

/// Delay before retry number `attempt` (1-based). Attempt 0 is immediate.
pub fn reload_backoff(attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
    if attempt == 0 {
        return Duration::from_millis(0);
    }

    let exponential = 2u64.saturating_pow(attempt - 1);
    let delay_ms = base_ms.saturating_mul(exponential).min(max_ms);

    // Jitter up to 10% so concurrent retries don't align
    let jitter_range = delay_ms / 10;
    let jitter = if jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };

    Duration::from_millis(delay_ms + jitter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_growth_and_cap() {
        assert_eq!(reload_backoff(0, 250, 5000).as_millis(), 0);

        let first = reload_backoff(1, 250, 5000);
        assert!(first.as_millis() >= 250);

        let second = reload_backoff(2, 250, 5000);
        assert!(second.as_millis() >= 500);

        // jitter adds at most 10% on top of the cap
        let capped = reload_backoff(12, 250, 5000);
        assert!(capped.as_millis() >= 5000);
        assert!(capped.as_millis() < 5500);
    }
}
