//! In-memory RecordStore for development and tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::domain::{
    ChannelId, DistributionId, DistributionRecord, DistributionStatus, EngineError, JobId,
    JobRecord, JobStatus, PostId,
};
use crate::ports::record_store::{
    DistributionFilter, DistributionMutation, JobMutation, RecordStore,
};

/// Store state: single source of truth for all records.
#[derive(Default)]
struct StoreState {
    jobs: HashMap<JobId, JobRecord>,
    distributions: HashMap<DistributionId, DistributionRecord>,
}

/// In-memory store.
///
/// Conditional transitions run entirely under the state mutex, which is what
/// makes claim races resolve to exactly one winner. No await happens while
/// the lock is held.
#[derive(Clone, Default)]
pub struct InMemoryRecordStore {
    state: Arc<Mutex<StoreState>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StoreState> {
        self.state.lock().expect("record store lock poisoned")
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn create_job(&self, job: JobRecord) -> Result<(), EngineError> {
        let mut state = self.lock();
        if state.jobs.contains_key(&job.id) {
            return Err(EngineError::Store(format!("job {} already exists", job.id)));
        }
        state.jobs.insert(job.id, job);
        Ok(())
    }

    async fn get_job(&self, id: JobId) -> Result<JobRecord, EngineError> {
        self.lock()
            .jobs
            .get(&id)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(id.to_string()))
    }

    async fn transition_job(
        &self,
        id: JobId,
        operation: &'static str,
        expected: &[JobStatus],
        mutate: JobMutation<'_>,
    ) -> Result<JobRecord, EngineError> {
        let mut state = self.lock();
        let job = state
            .jobs
            .get_mut(&id)
            .ok_or_else(|| EngineError::NotFound(id.to_string()))?;
        if !expected.contains(&job.status) {
            return Err(EngineError::invalid_state(operation, job.status));
        }
        mutate(job);
        Ok(job.clone())
    }

    async fn find_open_job_by_fingerprint(
        &self,
        fingerprint: &str,
    ) -> Result<Option<JobRecord>, EngineError> {
        Ok(self
            .lock()
            .jobs
            .values()
            .find(|job| job.status.is_open() && job.fingerprint == fingerprint)
            .cloned())
    }

    async fn list_jobs(&self, page: usize, limit: usize) -> Result<Vec<JobRecord>, EngineError> {
        if page == 0 {
            return Err(EngineError::Validation("page is 1-based".to_string()));
        }
        let state = self.lock();
        let mut jobs: Vec<JobRecord> = state.jobs.values().cloned().collect();
        // ULIDs embed the creation timestamp, so the id is a stable tiebreak
        jobs.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(jobs
            .into_iter()
            .skip((page - 1) * limit)
            .take(limit)
            .collect())
    }

    async fn create_distribution(&self, record: DistributionRecord) -> Result<(), EngineError> {
        let mut state = self.lock();
        if state.distributions.contains_key(&record.id) {
            return Err(EngineError::Store(format!(
                "distribution {} already exists",
                record.id
            )));
        }
        state.distributions.insert(record.id, record);
        Ok(())
    }

    async fn get_distribution(
        &self,
        id: DistributionId,
    ) -> Result<DistributionRecord, EngineError> {
        self.lock()
            .distributions
            .get(&id)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(id.to_string()))
    }

    async fn transition_distribution(
        &self,
        id: DistributionId,
        operation: &'static str,
        expected: &[DistributionStatus],
        mutate: DistributionMutation<'_>,
    ) -> Result<DistributionRecord, EngineError> {
        let mut state = self.lock();
        let record = state
            .distributions
            .get_mut(&id)
            .ok_or_else(|| EngineError::NotFound(id.to_string()))?;
        if !expected.contains(&record.status) {
            return Err(EngineError::invalid_state(operation, record.status));
        }
        mutate(record);
        Ok(record.clone())
    }

    async fn find_open_distribution(
        &self,
        post_id: &PostId,
        channel_id: ChannelId,
    ) -> Result<Option<DistributionRecord>, EngineError> {
        Ok(self
            .lock()
            .distributions
            .values()
            .find(|rec| {
                rec.status.is_open() && &rec.post_id == post_id && rec.channel_id == channel_id
            })
            .cloned())
    }

    async fn list_post_distributions(
        &self,
        post_id: &PostId,
    ) -> Result<Vec<DistributionRecord>, EngineError> {
        let filter = DistributionFilter {
            post_id: Some(post_id.clone()),
            ..DistributionFilter::default()
        };
        self.list_distributions(&filter).await
    }

    async fn list_distributions(
        &self,
        filter: &DistributionFilter,
    ) -> Result<Vec<DistributionRecord>, EngineError> {
        let state = self.lock();
        let mut records: Vec<DistributionRecord> = state
            .distributions
            .values()
            .filter(|rec| filter.matches(rec))
            .cloned()
            .collect();
        records.sort_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id)));
        Ok(records)
    }
}
