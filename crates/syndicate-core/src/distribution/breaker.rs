//! Per-channel circuit breaker.
//!
//! State transitions:
//! - Closed -> Open (threshold consecutive failures inside the window)
//! - Open -> HalfOpen (cooldown elapsed; exactly one trial call allowed)
//! - HalfOpen -> Closed (trial succeeded, counters reset)
//! - HalfOpen -> Open (trial failed; cooldown backs off per reopen)
//!
//! While Open, dispatches fail fast without touching the external platform —
//! the breaker bounds the blast radius of one degraded channel.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::DeliveryError;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakerConfig {
    /// Consecutive failures that trip the breaker.
    pub failure_threshold: u32,

    /// Failures further apart than this don't count as consecutive.
    pub failure_window_ms: u64,

    /// Initial Open duration before a half-open trial is allowed.
    pub cooldown_ms: u64,

    /// Cooldown growth per re-open (failed trial).
    pub cooldown_multiplier: f64,

    pub max_cooldown_ms: u64,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            failure_window_ms: 60_000,
            cooldown_ms: 30_000,
            cooldown_multiplier: 2.0,
            max_cooldown_ms: 300_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

/// Breaker state machine. Pure over injected `now`; the per-channel guard
/// mutex provides the single-writer discipline.
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    config: BreakerConfig,
    state: BreakerState,
    consecutive_failures: u32,
    last_failure_at: Option<DateTime<Utc>>,
    next_retry_at: Option<DateTime<Utc>>,
    /// Failed trials since the breaker first opened; drives cooldown backoff.
    reopens: u32,
    /// The half-open trial that is currently out.
    trial_inflight: bool,
}

impl CircuitBreaker {
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            state: BreakerState::Closed,
            consecutive_failures: 0,
            last_failure_at: None,
            next_retry_at: None,
            reopens: 0,
            trial_inflight: false,
        }
    }

    /// Gate one dispatch attempt. May move Open -> HalfOpen when the
    /// cooldown has elapsed; the caller must report the outcome via
    /// `on_success`/`on_failure` so the trial slot is released.
    pub fn check(&mut self, now: DateTime<Utc>) -> Result<(), DeliveryError> {
        match self.state {
            BreakerState::Closed => Ok(()),
            BreakerState::Open => {
                let retry_at = self.next_retry_at.unwrap_or(now);
                if now >= retry_at {
                    self.state = BreakerState::HalfOpen;
                    self.trial_inflight = true;
                    Ok(())
                } else {
                    Err(DeliveryError::CircuitOpen { retry_at })
                }
            }
            BreakerState::HalfOpen => {
                if self.trial_inflight {
                    // only one trial at a time
                    Err(DeliveryError::CircuitOpen {
                        retry_at: self.next_retry_at.unwrap_or(now),
                    })
                } else {
                    self.trial_inflight = true;
                    Ok(())
                }
            }
        }
    }

    /// Would a dispatch be rejected right now? Read-only — never flips
    /// Open -> HalfOpen, so health checks and retry fast-fails don't consume
    /// the trial slot.
    pub fn peek_rejection(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self.state {
            BreakerState::Closed => None,
            BreakerState::Open => {
                let retry_at = self.next_retry_at.unwrap_or(now);
                (now < retry_at).then_some(retry_at)
            }
            BreakerState::HalfOpen => self
                .trial_inflight
                .then(|| self.next_retry_at.unwrap_or(now)),
        }
    }

    pub fn on_success(&mut self) {
        self.state = BreakerState::Closed;
        self.consecutive_failures = 0;
        self.last_failure_at = None;
        self.next_retry_at = None;
        self.reopens = 0;
        self.trial_inflight = false;
    }

    pub fn on_failure(&mut self, now: DateTime<Utc>) {
        if self.state == BreakerState::HalfOpen {
            // failed trial: back off and re-open
            self.reopens += 1;
            self.consecutive_failures += 1;
            self.last_failure_at = Some(now);
            self.trial_inflight = false;
            self.open(now);
            return;
        }

        if let Some(last) = self.last_failure_at
            && now - last > self.failure_window()
        {
            // too old to be consecutive
            self.consecutive_failures = 0;
        }
        self.consecutive_failures += 1;
        self.last_failure_at = Some(now);

        if self.state == BreakerState::Closed
            && self.consecutive_failures >= self.config.failure_threshold
        {
            self.open(now);
        }
    }

    pub fn state(&self) -> BreakerState {
        self.state
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn next_retry_at(&self) -> Option<DateTime<Utc>> {
        self.next_retry_at
    }

    fn open(&mut self, now: DateTime<Utc>) {
        self.state = BreakerState::Open;
        self.next_retry_at = Some(now + self.cooldown_after(self.reopens));
    }

    /// cooldown * multiplier^reopens, capped.
    fn cooldown_after(&self, reopens: u32) -> Duration {
        let base_ms = self.config.cooldown_ms as f64;
        let backed_off = base_ms * self.config.cooldown_multiplier.powi(reopens as i32);
        let capped = backed_off.min(self.config.max_cooldown_ms as f64);
        Duration::milliseconds(capped as i64)
    }

    fn failure_window(&self) -> Duration {
        Duration::milliseconds(self.config.failure_window_ms as i64)
    }
}
