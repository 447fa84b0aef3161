//! Error taxonomy for the engine and the delivery pipeline.

use chrono::{DateTime, Utc};
use thiserror::Error;

use super::ids::JobId;
use super::job::{JobType, StepName};

/// Failure of one delivery attempt to an external platform.
///
/// The kind decides retry eligibility: rate-limit/breaker/network failures
/// are worth retrying as-is, platform rejections and permanent failures are
/// not (though an operator may still force a retry after fixing config).
#[derive(Debug, Clone, Error)]
pub enum DeliveryError {
    #[error("rate limited: no token available for this channel")]
    RateLimited,

    #[error("circuit open until {retry_at}")]
    CircuitOpen { retry_at: DateTime<Utc> },

    #[error("platform rejected the content: {0}")]
    PlatformRejected(String),

    #[error("transient network failure: {0}")]
    TransientNetwork(String),

    #[error("permanent delivery failure: {0}")]
    Permanent(String),
}

impl DeliveryError {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DeliveryError::RateLimited
                | DeliveryError::CircuitOpen { .. }
                | DeliveryError::TransientNetwork(_)
        )
    }
}

/// Engine-level error surfaced to callers.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Conflict: an open job with the same fingerprint already exists.
    /// Carries the existing id so the caller can reference it.
    #[error("duplicate job: already in progress as {existing}")]
    DuplicateJob { existing: JobId },

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// The operation is not legal for the record's current status.
    #[error("cannot {operation} while {status}")]
    InvalidState {
        operation: &'static str,
        status: String,
    },

    /// Site-wide kill switch: distribution refuses all mutating operations.
    #[error("distribution module is disabled")]
    ModuleDisabled,

    #[error("no workflow registered for job type {0}")]
    WorkflowMissing(JobType),

    #[error("step {step} is not part of the {job_type} workflow")]
    StepMissing { job_type: JobType, step: StepName },

    #[error(transparent)]
    Delivery(#[from] DeliveryError),

    #[error("record store failure: {0}")]
    Store(String),
}

impl EngineError {
    pub fn invalid_state(operation: &'static str, status: impl ToString) -> Self {
        EngineError::InvalidState {
            operation,
            status: status.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::rate_limited(DeliveryError::RateLimited, true)]
    #[case::circuit(DeliveryError::CircuitOpen { retry_at: Utc::now() }, true)]
    #[case::network(DeliveryError::TransientNetwork("timeout".into()), true)]
    #[case::rejected(DeliveryError::PlatformRejected("bad content".into()), false)]
    #[case::permanent(DeliveryError::Permanent("revoked credentials".into()), false)]
    fn retryability_by_kind(#[case] err: DeliveryError, #[case] retryable: bool) {
        assert_eq!(err.is_retryable(), retryable);
    }

    #[test]
    fn duplicate_job_carries_the_existing_id() {
        let existing = JobId::from_ulid(ulid::Ulid::new());
        let err = EngineError::DuplicateJob { existing };
        assert!(err.to_string().contains(&existing.to_string()));
    }
}
