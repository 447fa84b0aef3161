//! Worker group: N concurrent workers draining the priority queue.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::queue::PriorityQueue;

use super::runner::JobRunner;

/// Handle over a group of spawned workers.
/// - `request_shutdown()` stops workers from taking new jobs
/// - `shutdown_and_join()` additionally waits for in-flight runs to finish
pub struct WorkerGroup {
    shutdown_tx: watch::Sender<bool>,
    joins: Vec<JoinHandle<()>>,
}

impl WorkerGroup {
    /// Spawn `n` workers over a shared queue and runner.
    pub fn spawn(n: usize, queue: Arc<PriorityQueue>, runner: Arc<JobRunner>) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let mut joins = Vec::with_capacity(n);
        for worker_id in 0..n {
            let q = Arc::clone(&queue);
            let r = Arc::clone(&runner);
            let mut rx = shutdown_rx.clone();

            let join = tokio::spawn(async move {
                worker_loop(worker_id, q, r, &mut rx).await;
            });
            joins.push(join);
        }

        Self { shutdown_tx, joins }
    }

    /// Stop taking new jobs. In-flight runs are never interrupted — a step
    /// that already started gets to finish (cancellation stays cooperative).
    pub fn request_shutdown(&self) {
        // receivers may already be dropped
        let _ = self.shutdown_tx.send(true);
    }

    pub async fn shutdown_and_join(self) {
        self.request_shutdown();
        for j in self.joins {
            let _ = j.await;
        }
    }
}

async fn worker_loop(
    worker_id: usize,
    queue: Arc<PriorityQueue>,
    runner: Arc<JobRunner>,
    shutdown_rx: &mut watch::Receiver<bool>,
) {
    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        // pop_wait parks, so race it against shutdown
        let job_id = tokio::select! {
            _ = shutdown_rx.changed() => continue,
            job_id = queue.pop_wait() => job_id,
        };

        match runner.run(job_id).await {
            Ok(job) => {
                debug!(worker_id, job = %job.id, status = %job.status, "run finished");
            }
            Err(err) => {
                // a lost claim race lands here too; the job is someone else's
                warn!(worker_id, job = %job_id, error = %err, "run not started");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{JobId, JobRecord, JobStatus, JobType, Priority, fingerprint};
    use crate::impls::InMemoryRecordStore;
    use crate::ports::{RecordStore, SystemClock};
    use crate::workflow::registry::WorkflowRegistry;
    use crate::workflow::step::{Step, StepOutcome, step};
    use async_trait::async_trait;
    use chrono::Utc;
    use serde_json::json;
    use std::time::Duration;
    use ulid::Ulid;

    struct QuickStep;

    #[async_trait]
    impl Step for QuickStep {
        async fn run(
            &self,
            _job: &JobRecord,
            _payload: &serde_json::Value,
        ) -> Result<StepOutcome, String> {
            Ok(StepOutcome::done())
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn workers_drain_queued_jobs_and_shut_down() {
        let job_type = JobType::new("blog-autopublish");
        let mut registry = WorkflowRegistry::new();
        registry
            .register(job_type.clone(), vec![step("select", QuickStep)])
            .unwrap();

        let store = Arc::new(InMemoryRecordStore::new());
        let queue = Arc::new(PriorityQueue::new());
        let runner = Arc::new(JobRunner::new(
            Arc::clone(&store) as Arc<dyn RecordStore>,
            Arc::new(registry),
            Arc::new(SystemClock),
        ));

        let mut ids = Vec::new();
        for i in 0..4 {
            let payload = json!({"postId": format!("p{i}")});
            let job = JobRecord::new(
                JobId::from_ulid(Ulid::new()),
                job_type.clone(),
                payload.clone(),
                Priority::Normal,
                fingerprint(&job_type, &payload),
                Utc::now(),
            );
            ids.push(job.id);
            store.create_job(job.clone()).await.unwrap();
            queue.push(&job);
        }

        let group = WorkerGroup::spawn(2, Arc::clone(&queue), runner);

        // wait until every job reached a terminal state
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        loop {
            let mut done = 0;
            for id in &ids {
                if store.get_job(*id).await.unwrap().status.is_terminal() {
                    done += 1;
                }
            }
            if done == ids.len() {
                break;
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "workers did not drain the queue in time"
            );
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        group.shutdown_and_join().await;

        for id in ids {
            assert_eq!(store.get_job(id).await.unwrap().status, JobStatus::Succeeded);
        }
    }
}
