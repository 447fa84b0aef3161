//! Per-channel token-bucket rate limiter.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::DeliveryError;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Tokens refilled per second.
    pub rate_per_sec: f64,

    /// Bucket capacity (and the initial fill).
    pub burst: f64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            rate_per_sec: 1.0,
            burst: 5.0,
        }
    }
}

/// Token bucket. Refills continuously; one token per dispatch attempt.
///
/// A rejection here happens before any external call and before the breaker
/// sees anything — running out of tokens is our doing, not the platform's.
#[derive(Debug, Clone)]
pub struct TokenBucket {
    config: RateLimitConfig,
    tokens: f64,
    last_refill: DateTime<Utc>,
}

/// Guards against float drift right at the one-token boundary.
const TOKEN_EPSILON: f64 = 1e-9;

impl TokenBucket {
    pub fn new(config: RateLimitConfig, now: DateTime<Utc>) -> Self {
        let tokens = config.burst;
        Self {
            config,
            tokens,
            last_refill: now,
        }
    }

    pub fn try_acquire(&mut self, now: DateTime<Utc>) -> Result<(), DeliveryError> {
        self.refill(now);
        if self.tokens + TOKEN_EPSILON >= 1.0 {
            self.tokens -= 1.0;
            Ok(())
        } else {
            Err(DeliveryError::RateLimited)
        }
    }

    /// Tokens that would be available at `now`, without writing anything
    /// back — health checks must not mutate limiter state.
    pub fn available(&self, now: DateTime<Utc>) -> f64 {
        let elapsed = (now - self.last_refill).num_milliseconds().max(0) as f64 / 1000.0;
        (self.tokens + elapsed * self.config.rate_per_sec).min(self.config.burst)
    }

    fn refill(&mut self, now: DateTime<Utc>) {
        self.tokens = self.available(now);
        self.last_refill = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    fn bucket(rate_per_sec: f64, burst: f64) -> TokenBucket {
        TokenBucket::new(
            RateLimitConfig {
                rate_per_sec,
                burst,
            },
            t0(),
        )
    }

    #[test]
    fn burst_plus_one_is_rejected_at_zero_elapsed() {
        let mut bucket = bucket(1.0, 3.0);
        let now = t0();

        for _ in 0..3 {
            bucket.try_acquire(now).unwrap();
        }
        assert!(matches!(
            bucket.try_acquire(now),
            Err(DeliveryError::RateLimited)
        ));
    }

    #[test]
    fn tokens_refill_over_time_up_to_burst() {
        let mut bucket = bucket(2.0, 3.0);
        let now = t0();
        for _ in 0..3 {
            bucket.try_acquire(now).unwrap();
        }

        // half a second -> one token at 2/s
        let later = now + Duration::milliseconds(500);
        bucket.try_acquire(later).unwrap();
        assert!(bucket.try_acquire(later).is_err());

        // a long idle stretch refills to burst, not beyond
        let much_later = now + Duration::seconds(3600);
        assert!((bucket.available(much_later) - 3.0).abs() < 1e-6);
    }

    #[test]
    fn available_is_read_only() {
        let bucket = bucket(1.0, 5.0);
        let later = t0() + Duration::seconds(2);

        let first = bucket.available(later);
        let second = bucket.available(later);
        assert_eq!(first, second);
        assert!((first - 5.0).abs() < 1e-6);
    }
}
