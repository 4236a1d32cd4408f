// Exponential backoff shared by RetryExecutor and JobQueue

use std::time::Duration;

/// Largest exponent applied before the multiplier saturates.
const MAX_EXPONENT: u32 = 63;

/// Delay to wait after failed attempt number `attempt` (1-indexed).
///
/// Formula: `base_delay_ms * 2^(attempt - 1)`, so the first retry waits exactly
/// `base_delay_ms`. No jitter and no cap: the sequence is non-decreasing and
/// saturates at `u64::MAX` milliseconds instead of overflowing.
/// An `attempt` of 0 is treated as 1.
pub fn backoff_delay(base_delay_ms: u64, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(MAX_EXPONENT);
    Duration::from_millis(base_delay_ms.saturating_mul(1u64 << exponent))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_retry_waits_base_delay() {
        assert_eq!(backoff_delay(1000, 1), Duration::from_millis(1000));
        assert_eq!(backoff_delay(1000, 0), Duration::from_millis(1000));
    }

    #[test]
    fn test_delay_doubles_per_attempt() {
        assert_eq!(backoff_delay(250, 2), Duration::from_millis(500));
        assert_eq!(backoff_delay(250, 3), Duration::from_millis(1000));
        assert_eq!(backoff_delay(250, 4), Duration::from_millis(2000));
    }

    #[test]
    fn test_sequence_is_non_decreasing_and_saturates() {
        let mut previous = Duration::ZERO;
        for attempt in 1..=200 {
            let delay = backoff_delay(1000, attempt);
            assert!(delay >= previous, "attempt {} went backwards", attempt);
            previous = delay;
        }
        assert_eq!(backoff_delay(1000, 200), Duration::from_millis(u64::MAX));
    }

    #[test]
    fn test_zero_base_never_waits() {
        assert_eq!(backoff_delay(0, 5), Duration::ZERO);
    }
}
