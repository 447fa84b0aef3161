//! Distribution record: one (post, channel) delivery tracked independently.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::ids::{ChannelId, DistributionId, PostId};

/// External id returned by a platform on successful delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalRef(String);

impl ExternalRef {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExternalRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Distribution state.
///
/// State transitions:
/// - Scheduled -> Pending -> InProgress -> Succeeded
/// - InProgress -> Failed (retry resets to Pending until the attempt cap)
/// - Scheduled | Pending -> Cancelled
///
/// Succeeded is terminal and never retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistributionStatus {
    Scheduled,
    Pending,
    InProgress,
    Succeeded,
    Failed,
    Cancelled,
}

impl DistributionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            DistributionStatus::Succeeded
                | DistributionStatus::Failed
                | DistributionStatus::Cancelled
        )
    }

    /// Open records block duplicate creation for the same (post, channel).
    pub fn is_open(self) -> bool {
        matches!(
            self,
            DistributionStatus::Scheduled
                | DistributionStatus::Pending
                | DistributionStatus::InProgress
        )
    }
}

impl fmt::Display for DistributionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DistributionStatus::Scheduled => "scheduled",
            DistributionStatus::Pending => "pending",
            DistributionStatus::InProgress => "in_progress",
            DistributionStatus::Succeeded => "succeeded",
            DistributionStatus::Failed => "failed",
            DistributionStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// One delivery of a post to one channel.
///
/// Design: same record discipline as `JobRecord` — transitions via `mark_*`
/// methods, the store holds the single source of truth.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistributionRecord {
    pub id: DistributionId,
    pub post_id: PostId,
    pub channel_id: ChannelId,
    pub status: DistributionStatus,

    pub scheduled_at: DateTime<Utc>,

    /// Dispatch attempts made; capped by configuration, after which the
    /// record stays Failed permanently.
    pub attempts: u32,

    pub last_error: Option<String>,
    pub external_ref: Option<ExternalRef>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DistributionRecord {
    pub fn new(
        id: DistributionId,
        post_id: PostId,
        channel_id: ChannelId,
        scheduled_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            post_id,
            channel_id,
            status: DistributionStatus::Scheduled,
            scheduled_at,
            attempts: 0,
            last_error: None,
            external_ref: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Dispatch claim: Scheduled/Pending -> InProgress, counting the attempt.
    pub fn start_attempt(&mut self, now: DateTime<Utc>) {
        self.status = DistributionStatus::InProgress;
        self.attempts += 1;
        self.updated_at = now;
    }

    pub fn mark_succeeded(&mut self, external_ref: ExternalRef, now: DateTime<Utc>) {
        self.status = DistributionStatus::Succeeded;
        self.external_ref = Some(external_ref);
        self.last_error = None;
        self.updated_at = now;
    }

    pub fn mark_failed(&mut self, error: String, now: DateTime<Utc>) {
        self.status = DistributionStatus::Failed;
        self.last_error = Some(error);
        self.updated_at = now;
    }

    pub fn mark_cancelled(&mut self, now: DateTime<Utc>) {
        self.status = DistributionStatus::Cancelled;
        self.updated_at = now;
    }

    /// Manual retry: Failed -> Pending. The immediate re-dispatch charges
    /// the attempt, so the counter moves exactly once per retry.
    pub fn mark_retried(&mut self, now: DateTime<Utc>) {
        self.status = DistributionStatus::Pending;
        self.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use ulid::Ulid;

    fn record() -> DistributionRecord {
        let now = Utc::now();
        DistributionRecord::new(
            DistributionId::from_ulid(Ulid::new()),
            PostId::new("p1"),
            ChannelId::from_ulid(Ulid::new()),
            now,
            now,
        )
    }

    #[test]
    fn new_record_is_scheduled() {
        let rec = record();
        assert_eq!(rec.status, DistributionStatus::Scheduled);
        assert_eq!(rec.attempts, 0);
        assert!(rec.external_ref.is_none());
    }

    #[test]
    fn attempt_then_success_records_external_ref() {
        let mut rec = record();
        rec.start_attempt(Utc::now());
        assert_eq!(rec.status, DistributionStatus::InProgress);
        assert_eq!(rec.attempts, 1);

        rec.mark_succeeded(ExternalRef::new("ext-99"), Utc::now());
        assert_eq!(rec.status, DistributionStatus::Succeeded);
        assert_eq!(rec.external_ref, Some(ExternalRef::new("ext-99")));
        assert!(rec.last_error.is_none());
    }

    #[test]
    fn retry_cycle_counts_one_attempt_per_dispatch() {
        let mut rec = record();
        rec.start_attempt(Utc::now());
        rec.mark_failed("connection reset".to_string(), Utc::now());
        assert_eq!(rec.attempts, 1);

        rec.mark_retried(Utc::now());
        assert_eq!(rec.status, DistributionStatus::Pending);
        rec.start_attempt(Utc::now());
        assert_eq!(rec.attempts, 2);
    }

    #[rstest]
    #[case::scheduled(DistributionStatus::Scheduled, true)]
    #[case::pending(DistributionStatus::Pending, true)]
    #[case::in_progress(DistributionStatus::InProgress, true)]
    #[case::succeeded(DistributionStatus::Succeeded, false)]
    #[case::failed(DistributionStatus::Failed, false)]
    #[case::cancelled(DistributionStatus::Cancelled, false)]
    fn open_statuses(#[case] status: DistributionStatus, #[case] open: bool) {
        assert_eq!(status.is_open(), open);
    }
}
