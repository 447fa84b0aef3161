//! RecordStore port: the durable source of truth for jobs and distributions.
//!
//! Every status change goes through a conditional transition: the store
//! checks the current status against `expected` and applies the mutation
//! atomically, or fails with `InvalidState`. That makes the store the
//! serialization point for claims — two workers racing on the same Pending
//! job cannot both win.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::{
    ChannelId, DistributionId, DistributionRecord, DistributionStatus, EngineError, JobId,
    JobRecord, JobStatus, PostId,
};

/// Mutation applied to a job record under the store's transition lock.
pub type JobMutation<'a> = &'a (dyn Fn(&mut JobRecord) + Send + Sync);

/// Mutation applied to a distribution record under the store's transition lock.
pub type DistributionMutation<'a> = &'a (dyn Fn(&mut DistributionRecord) + Send + Sync);

/// Query filter for distribution listings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DistributionFilter {
    pub post_id: Option<PostId>,
    pub channel_id: Option<ChannelId>,
    pub statuses: Option<Vec<DistributionStatus>>,
}

impl DistributionFilter {
    pub fn with_statuses(statuses: Vec<DistributionStatus>) -> Self {
        Self {
            statuses: Some(statuses),
            ..Self::default()
        }
    }

    pub fn matches(&self, record: &DistributionRecord) -> bool {
        if let Some(post_id) = &self.post_id
            && post_id != &record.post_id
        {
            return false;
        }
        if let Some(channel_id) = &self.channel_id
            && *channel_id != record.channel_id
        {
            return false;
        }
        if let Some(statuses) = &self.statuses
            && !statuses.contains(&record.status)
        {
            return false;
        }
        true
    }
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn create_job(&self, job: JobRecord) -> Result<(), EngineError>;

    async fn get_job(&self, id: JobId) -> Result<JobRecord, EngineError>;

    /// Conditional update: applies `mutate` only while the job's status is in
    /// `expected`; otherwise fails with `InvalidState` naming `operation`.
    /// Returns the updated record.
    async fn transition_job(
        &self,
        id: JobId,
        operation: &'static str,
        expected: &[JobStatus],
        mutate: JobMutation<'_>,
    ) -> Result<JobRecord, EngineError>;

    /// Any non-terminal job with this fingerprint (the dedup window).
    async fn find_open_job_by_fingerprint(
        &self,
        fingerprint: &str,
    ) -> Result<Option<JobRecord>, EngineError>;

    /// Creation-time descending, `page` is 1-based.
    async fn list_jobs(&self, page: usize, limit: usize) -> Result<Vec<JobRecord>, EngineError>;

    async fn create_distribution(&self, record: DistributionRecord) -> Result<(), EngineError>;

    async fn get_distribution(
        &self,
        id: DistributionId,
    ) -> Result<DistributionRecord, EngineError>;

    async fn transition_distribution(
        &self,
        id: DistributionId,
        operation: &'static str,
        expected: &[DistributionStatus],
        mutate: DistributionMutation<'_>,
    ) -> Result<DistributionRecord, EngineError>;

    /// Any open (Scheduled/Pending/InProgress) record for this (post, channel).
    async fn find_open_distribution(
        &self,
        post_id: &PostId,
        channel_id: ChannelId,
    ) -> Result<Option<DistributionRecord>, EngineError>;

    async fn list_post_distributions(
        &self,
        post_id: &PostId,
    ) -> Result<Vec<DistributionRecord>, EngineError>;

    async fn list_distributions(
        &self,
        filter: &DistributionFilter,
    ) -> Result<Vec<DistributionRecord>, EngineError>;
}
