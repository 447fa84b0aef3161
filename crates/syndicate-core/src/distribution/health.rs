//! Health reporter: per-channel breaker/limiter snapshot.
//!
//! Reads off the hot path and never mutates guard state — an elapsed
//! cooldown still reports Open until a real dispatch flips it.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::{Channel, ChannelId};

use super::breaker::BreakerState;
use super::guard::GuardMap;

#[derive(Debug, Clone, Serialize)]
pub struct ChannelHealth {
    pub channel_name: String,
    pub breaker_state: BreakerState,
    pub consecutive_failures: u32,
    pub tokens_available: f64,
    pub next_retry_at: Option<DateTime<Utc>>,
}

pub struct HealthReporter {
    channels: HashMap<ChannelId, Channel>,
    guards: Arc<GuardMap>,
}

impl HealthReporter {
    pub fn new(channels: HashMap<ChannelId, Channel>, guards: Arc<GuardMap>) -> Self {
        Self { channels, guards }
    }

    /// Snapshot every configured channel, including ones that never
    /// dispatched (they report the untouched defaults).
    pub async fn health_check(&self) -> HashMap<ChannelId, ChannelHealth> {
        let mut report = HashMap::with_capacity(self.channels.len());
        for (id, channel) in &self.channels {
            let snap = self.guards.snapshot(*id).await;
            report.insert(
                *id,
                ChannelHealth {
                    channel_name: channel.name.clone(),
                    breaker_state: snap.breaker_state,
                    consecutive_failures: snap.consecutive_failures,
                    tokens_available: snap.tokens_available,
                    next_retry_at: snap.next_retry_at,
                },
            );
        }
        report
    }
}
