//! Per-channel guard: breaker + limiter behind one mutex.
//!
//! Dispatches to the same channel serialize on the guard's mutex so token
//! accounting and failure counting stay correct under concurrency; different
//! channels never contend with each other.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::domain::ChannelId;
use crate::ports::Clock;

use super::breaker::{BreakerConfig, BreakerState, CircuitBreaker};
use super::limiter::{RateLimitConfig, TokenBucket};

pub struct ChannelGuard {
    pub breaker: CircuitBreaker,
    pub limiter: TokenBucket,
}

/// Read-only view of one guard, taken for health reporting.
#[derive(Debug, Clone)]
pub struct GuardSnapshot {
    pub breaker_state: BreakerState,
    pub consecutive_failures: u32,
    pub tokens_available: f64,
    pub next_retry_at: Option<DateTime<Utc>>,
}

/// Lazily-populated map of channel guards.
pub struct GuardMap {
    guards: Mutex<HashMap<ChannelId, Arc<tokio::sync::Mutex<ChannelGuard>>>>,
    breaker_config: BreakerConfig,
    limiter_config: RateLimitConfig,
    clock: Arc<dyn Clock>,
}

impl GuardMap {
    pub fn new(
        breaker_config: BreakerConfig,
        limiter_config: RateLimitConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            guards: Mutex::new(HashMap::new()),
            breaker_config,
            limiter_config,
            clock,
        }
    }

    /// The guard for a channel, created on first use.
    pub fn guard(&self, channel_id: ChannelId) -> Arc<tokio::sync::Mutex<ChannelGuard>> {
        let mut guards = self.guards.lock().expect("guard map lock poisoned");
        Arc::clone(guards.entry(channel_id).or_insert_with(|| {
            Arc::new(tokio::sync::Mutex::new(ChannelGuard {
                breaker: CircuitBreaker::new(self.breaker_config.clone()),
                limiter: TokenBucket::new(self.limiter_config.clone(), self.clock.now()),
            }))
        }))
    }

    /// Snapshot one channel without mutating anything. A channel that never
    /// dispatched reports the untouched defaults.
    pub async fn snapshot(&self, channel_id: ChannelId) -> GuardSnapshot {
        let existing = {
            let guards = self.guards.lock().expect("guard map lock poisoned");
            guards.get(&channel_id).cloned()
        };
        let now = self.clock.now();
        match existing {
            Some(guard) => {
                let guard = guard.lock().await;
                GuardSnapshot {
                    breaker_state: guard.breaker.state(),
                    consecutive_failures: guard.breaker.consecutive_failures(),
                    tokens_available: guard.limiter.available(now),
                    next_retry_at: guard.breaker.next_retry_at(),
                }
            }
            None => GuardSnapshot {
                breaker_state: BreakerState::Closed,
                consecutive_failures: 0,
                tokens_available: self.limiter_config.burst,
                next_retry_at: None,
            },
        }
    }
}
