//! Engine: builder + facade over the whole subsystem.
//!
//! The builder wires workflows, channels and platform adapters together and
//! validates the wiring fail-fast: every expected job type must have a
//! workflow, every channel's kind must have a platform adapter. Broken
//! wiring is a startup error, never a runtime surprise.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;

use crate::config::EngineConfig;
use crate::dedup::DedupGuard;
use crate::distribution::{ChannelHealth, Dispatcher, GuardMap, HealthReporter};
use crate::domain::{
    Channel, ChannelId, ChannelKind, DistributionId, DistributionRecord, EngineError, JobId,
    JobRecord, JobStatus, JobType, PostId, Priority, StepName, fingerprint,
};
use crate::impls::InMemoryRecordStore;
use crate::ports::record_store::DistributionFilter;
use crate::ports::{Clock, IdGenerator, PlatformClient, RecordStore, SystemClock, UlidGenerator};
use crate::queue::PriorityQueue;
use crate::workflow::{JobRunner, Step, WorkerGroup, WorkflowRegistry};

/// Wiring failure found at build time.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("missing workflows for job types: {0:?}")]
    MissingWorkflows(Vec<String>),

    #[error("channel {channel} has kind {kind} but no platform adapter for it")]
    MissingPlatform { channel: String, kind: String },
}

pub struct EngineBuilder {
    config: EngineConfig,
    store: Option<Arc<dyn RecordStore>>,
    clock: Option<Arc<dyn Clock>>,
    ids: Option<Arc<dyn IdGenerator>>,
    registry: WorkflowRegistry,
    channels: Vec<Channel>,
    platforms: HashMap<ChannelKind, Arc<dyn PlatformClient>>,
    expected_workflows: Option<Vec<JobType>>,
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self {
            config: EngineConfig::default(),
            store: None,
            clock: None,
            ids: None,
            registry: WorkflowRegistry::new(),
            channels: Vec::new(),
            platforms: HashMap::new(),
            expected_workflows: None,
        }
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn store(mut self, store: Arc<dyn RecordStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = Some(ids);
        self
    }

    /// Register the ordered step chain for a job type.
    pub fn workflow(
        mut self,
        job_type: JobType,
        steps: Vec<(StepName, Arc<dyn Step>)>,
    ) -> Result<Self, EngineError> {
        self.registry.register(job_type, steps)?;
        Ok(self)
    }

    pub fn channel(mut self, channel: Channel) -> Self {
        self.channels.push(channel);
        self
    }

    pub fn platform(mut self, kind: ChannelKind, client: Arc<dyn PlatformClient>) -> Self {
        self.platforms.insert(kind, client);
        self
    }

    /// Declare the job types this deployment expects; `build()` fails if any
    /// of them is missing a workflow.
    pub fn expect_workflows(mut self, job_types: &[&str]) -> Self {
        self.expected_workflows = Some(job_types.iter().map(|t| JobType::new(*t)).collect());
        self
    }

    pub fn build(self) -> Result<Engine, BuildError> {
        if let Some(expected) = &self.expected_workflows {
            let missing: Vec<String> = expected
                .iter()
                .filter(|t| !self.registry.contains(t))
                .map(|t| t.to_string())
                .collect();
            if !missing.is_empty() {
                return Err(BuildError::MissingWorkflows(missing));
            }
        }
        for channel in &self.channels {
            if !self.platforms.contains_key(&channel.kind) {
                return Err(BuildError::MissingPlatform {
                    channel: channel.name.clone(),
                    kind: channel.kind.to_string(),
                });
            }
        }

        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(InMemoryRecordStore::new()));
        let ids = self
            .ids
            .unwrap_or_else(|| Arc::new(UlidGenerator::new(Arc::clone(&clock))));

        let channels: HashMap<ChannelId, Channel> = self
            .channels
            .into_iter()
            .map(|channel| (channel.id, channel))
            .collect();
        let guards = Arc::new(GuardMap::new(
            self.config.breaker.clone(),
            self.config.limiter.clone(),
            Arc::clone(&clock),
        ));

        let registry = Arc::new(self.registry);
        let queue = Arc::new(PriorityQueue::new());
        let runner = Arc::new(JobRunner::new(
            Arc::clone(&store),
            Arc::clone(&registry),
            Arc::clone(&clock),
        ));
        let dispatcher = Arc::new(Dispatcher::new(
            Arc::clone(&store),
            channels.clone(),
            self.platforms,
            Arc::clone(&guards),
            Arc::clone(&clock),
            Arc::clone(&ids),
            self.config.dispatch_timeout(),
            self.config.max_distribution_attempts,
            self.config.distribution_enabled,
        ));
        let health = HealthReporter::new(channels, guards);

        Ok(Engine {
            config: self.config,
            store,
            clock,
            ids,
            registry,
            queue,
            dedup: DedupGuard::new(),
            runner,
            dispatcher,
            health,
        })
    }
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// The assembled engine: enqueue/run/retry/cancel jobs, distribute posts,
/// observe channel health.
pub struct Engine {
    config: EngineConfig,
    store: Arc<dyn RecordStore>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    registry: Arc<WorkflowRegistry>,
    queue: Arc<PriorityQueue>,
    dedup: DedupGuard,
    runner: Arc<JobRunner>,
    dispatcher: Arc<Dispatcher>,
    health: HealthReporter,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine").finish_non_exhaustive()
    }
}

impl Engine {
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    /// Accept one unit of work. Fails with `DuplicateJob` if an open job with
    /// the same fingerprint exists — a conflict, not a generic failure.
    pub async fn enqueue_job(
        &self,
        job_type: JobType,
        payload: serde_json::Value,
        priority: Priority,
    ) -> Result<JobRecord, EngineError> {
        if !self.registry.contains(&job_type) {
            return Err(EngineError::WorkflowMissing(job_type));
        }
        if !payload.is_object() {
            return Err(EngineError::Validation(
                "payload must be a JSON object".to_string(),
            ));
        }

        let fp = fingerprint(&job_type, &payload);
        let job = JobRecord::new(
            self.ids.generate_job_id(),
            job_type,
            payload,
            priority,
            fp,
            self.clock.now(),
        );
        let job = self
            .dedup
            .check_and_reserve(self.store.as_ref(), job)
            .await?;
        self.queue.push(&job);
        info!(job = %job.id, job_type = %job.job_type, priority = ?job.priority, "job enqueued");
        Ok(job)
    }

    pub async fn get_job(&self, id: JobId) -> Result<JobRecord, EngineError> {
        self.store.get_job(id).await
    }

    /// Paginated, newest first. `page` is 1-based.
    pub async fn get_job_history(
        &self,
        page: usize,
        limit: usize,
    ) -> Result<Vec<JobRecord>, EngineError> {
        self.store.list_jobs(page, limit).await
    }

    /// Drive one job through its workflow right now (what a worker does).
    pub async fn run_job(&self, id: JobId) -> Result<JobRecord, EngineError> {
        self.runner.run(id).await
    }

    /// Manual retry of a Failed job: back to Pending and into the queue.
    pub async fn retry_job(&self, id: JobId) -> Result<JobRecord, EngineError> {
        let job = self.store.get_job(id).await?;
        if job.status != JobStatus::Failed {
            return Err(EngineError::invalid_state("retry", job.status));
        }
        if job.attempts >= self.config.max_job_attempts {
            return Err(EngineError::invalid_state(
                "retry",
                format!("attempt budget exhausted after {}", job.attempts),
            ));
        }

        let now = self.clock.now();
        let job = self
            .store
            .transition_job(id, "retry", &[JobStatus::Failed], &|j| j.mark_retried(now))
            .await?;
        self.queue.push(&job);
        info!(job = %job.id, attempts = job.attempts, "job re-queued");
        Ok(job)
    }

    /// Cooperative cancel: only lands while Pending or between steps.
    pub async fn cancel_job(&self, id: JobId) -> Result<JobRecord, EngineError> {
        let now = self.clock.now();
        self.store
            .transition_job(
                id,
                "cancel",
                &[JobStatus::Pending, JobStatus::StepComplete],
                &|j| j.mark_cancelled(now),
            )
            .await
    }

    /// Spawn `n` workers draining the queue until shutdown.
    pub fn spawn_workers(&self, n: usize) -> WorkerGroup {
        WorkerGroup::spawn(n, Arc::clone(&self.queue), Arc::clone(&self.runner))
    }

    pub fn queued_jobs(&self) -> usize {
        self.queue.len()
    }

    // ---- distribution ----

    pub async fn bulk_distribute(
        &self,
        post_ids: &[PostId],
        channel_ids: &[ChannelId],
    ) -> Result<Vec<DistributionRecord>, EngineError> {
        self.dispatcher.bulk_distribute(post_ids, channel_ids).await
    }

    pub async fn dispatch_distribution(
        &self,
        id: DistributionId,
    ) -> Result<DistributionRecord, EngineError> {
        self.dispatcher.dispatch(id).await
    }

    pub async fn retry_distribution(
        &self,
        id: DistributionId,
    ) -> Result<DistributionRecord, EngineError> {
        self.dispatcher.retry(id).await
    }

    pub async fn cancel_distribution(
        &self,
        id: DistributionId,
    ) -> Result<DistributionRecord, EngineError> {
        self.dispatcher.cancel(id).await
    }

    pub async fn get_distribution(
        &self,
        id: DistributionId,
    ) -> Result<DistributionRecord, EngineError> {
        self.dispatcher.get_distribution(id).await
    }

    pub async fn get_post_distributions(
        &self,
        post_id: &PostId,
    ) -> Result<Vec<DistributionRecord>, EngineError> {
        self.dispatcher.get_post_distributions(post_id).await
    }

    pub async fn get_distributions(
        &self,
        filter: &DistributionFilter,
    ) -> Result<Vec<DistributionRecord>, EngineError> {
        self.dispatcher.get_distributions(filter).await
    }

    pub async fn run_pending_distributions(
        &self,
    ) -> Result<Vec<DistributionRecord>, EngineError> {
        self.dispatcher.run_pending().await
    }

    pub fn set_distribution_enabled(&self, enabled: bool) {
        self.dispatcher.set_enabled(enabled);
    }

    pub async fn health_check(&self) -> HashMap<ChannelId, ChannelHealth> {
        self.health.health_check().await
    }
}
