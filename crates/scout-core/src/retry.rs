//! Backoff for model call retries

use rand::Rng;
use std::time::Duration;

/// Exponential backoff with +/-25% jitter: `base`, `2*base`, `4*base`, ...
pub(crate) fn retry_backoff_delay(base: Duration, attempt: u32) -> Duration {
    let base_ms = (base.as_millis() as u64).saturating_mul(2u64.saturating_pow(attempt));
    let jitter_range = base_ms / 4;
    let jitter = if jitter_range > 0 {
        let offset = rand::thread_rng().gen_range(0..=jitter_range * 2);
        offset as i64 - jitter_range as i64
    } else {
        0
    };
    Duration::from_millis((base_ms as i64 + jitter).max(0) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exponential_growth() {
        let base = Duration::from_millis(400);
        for _ in 0..20 {
            let d0 = retry_backoff_delay(base, 0);
            let d1 = retry_backoff_delay(base, 1);
            let d2 = retry_backoff_delay(base, 2);

            assert!((300..=500).contains(&d0.as_millis()), "attempt 0: {:?}", d0);
            assert!((600..=1000).contains(&d1.as_millis()), "attempt 1: {:?}", d1);
            assert!((1200..=2000).contains(&d2.as_millis()), "attempt 2: {:?}", d2);
        }
    }

    #[test]
    fn test_zero_base() {
        assert_eq!(retry_backoff_delay(Duration::ZERO, 3), Duration::ZERO);
    }

    #[test]
    fn test_no_overflow() {
        let _ = retry_backoff_delay(Duration::from_secs(1), 40);
    }
}
