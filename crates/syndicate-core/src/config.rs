//! Engine configuration.
//!
//! Everything defaults sensibly; deployments override the parts they care
//! about from whatever config source the host application uses.

use serde::{Deserialize, Serialize};

use crate::distribution::breaker::BreakerConfig;
use crate::distribution::limiter::RateLimitConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Run-attempt budget per job; past it, Failed is final.
    pub max_job_attempts: u32,

    /// Dispatch-attempt cap per distribution record.
    pub max_distribution_attempts: u32,

    /// Upper bound on one external platform call. A call that outlives this
    /// is treated as a transient network failure.
    pub dispatch_timeout_ms: u64,

    /// Initial kill-switch position for the distribution module.
    pub distribution_enabled: bool,

    pub breaker: BreakerConfig,
    pub limiter: RateLimitConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_job_attempts: 5,
            max_distribution_attempts: 3,
            dispatch_timeout_ms: 10_000,
            distribution_enabled: true,
            breaker: BreakerConfig::default(),
            limiter: RateLimitConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn dispatch_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.dispatch_timeout_ms)
    }
}
