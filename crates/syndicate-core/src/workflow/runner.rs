//! Job runner: drives one job through its registered step chain.
//!
//! Every transition is persisted through the record store before control
//! moves on, so a crash mid-workflow leaves the job resumable from the last
//! completed step. The store's conditional transitions are also where
//! concurrent cancellation wins: the runner re-claims at every step boundary
//! and backs off if the job is no longer its own.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::domain::{EngineError, JobId, JobRecord, JobStatus, StepName};
use crate::ports::{Clock, RecordStore};

use super::registry::WorkflowRegistry;

/// Cap on persisted error text; full detail goes to the log.
const ERROR_SUMMARY_MAX: usize = 240;

pub struct JobRunner {
    store: Arc<dyn RecordStore>,
    registry: Arc<WorkflowRegistry>,
    clock: Arc<dyn Clock>,
}

impl JobRunner {
    pub fn new(
        store: Arc<dyn RecordStore>,
        registry: Arc<WorkflowRegistry>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            registry,
            clock,
        }
    }

    /// Execute the job's step chain to completion, failure, or cancellation.
    ///
    /// Accepts a Pending job (fresh or manually retried) or a StepComplete
    /// job (crash recovery); either way the claim counts one run attempt.
    /// Step failures land on the record as Failed + `last_error`, not as an
    /// `Err` from this method — `Err` means the claim or the store failed.
    pub async fn run(&self, job_id: JobId) -> Result<JobRecord, EngineError> {
        let now = self.clock.now();
        let mut job = self
            .store
            .transition_job(
                job_id,
                "claim",
                &[JobStatus::Pending, JobStatus::StepComplete],
                &|j| j.start_attempt(now),
            )
            .await?;

        let chain = self
            .registry
            .chain(&job.job_type)
            .ok_or_else(|| EngineError::WorkflowMissing(job.job_type.clone()))?;

        // resume after the last completed step, if any
        let mut idx = match &job.step {
            Some(step) => {
                let pos = self.registry.position(&job.job_type, step).ok_or_else(|| {
                    EngineError::StepMissing {
                        job_type: job.job_type.clone(),
                        step: step.clone(),
                    }
                })?;
                pos + 1
            }
            None => 0,
        };

        info!(job = %job.id, job_type = %job.job_type, attempt = job.attempts, "run started");

        while idx < chain.len() {
            let (name, step) = &chain[idx];
            debug!(job = %job.id, step = %name, "step started");

            let payload = job.payload.clone();
            let result = step.run(&job, &payload).await;
            let now = self.clock.now();

            let outcome = match result {
                Ok(outcome) => outcome,
                Err(message) => {
                    let summary = summarize_error(&message);
                    warn!(job = %job.id, step = %name, error = %message, "step failed");
                    return self
                        .store
                        .transition_job(job_id, "fail", &[JobStatus::Running], &|j| {
                            j.mark_failed(summary.clone(), now)
                        })
                        .await;
                }
            };

            let successor = match &outcome.next {
                None => None,
                Some(next) => match self.registry.position(&job.job_type, next) {
                    Some(pos) if pos > idx => Some(pos),
                    Some(_) => {
                        let summary = format!("step {name} named successor {next} out of order");
                        warn!(job = %job.id, step = %name, "{summary}");
                        return self
                            .store
                            .transition_job(job_id, "fail", &[JobStatus::Running], &|j| {
                                j.mark_failed(summary.clone(), now)
                            })
                            .await;
                    }
                    None => {
                        let summary = format!("step {name} named unknown successor {next}");
                        warn!(job = %job.id, step = %name, "{summary}");
                        return self
                            .store
                            .transition_job(job_id, "fail", &[JobStatus::Running], &|j| {
                                j.mark_failed(summary.clone(), now)
                            })
                            .await;
                    }
                },
            };

            match successor {
                None => {
                    let step_name = name.clone();
                    let data = outcome.data;
                    job = self
                        .store
                        .transition_job(job_id, "finish", &[JobStatus::Running], &|j| {
                            j.mark_succeeded(step_name.clone(), data.clone(), now)
                        })
                        .await?;
                    info!(job = %job.id, step = %step_name, "run succeeded");
                    return Ok(job);
                }
                Some(pos) => {
                    let step_name = name.clone();
                    let data = outcome.data;
                    job = self
                        .store
                        .transition_job(job_id, "advance", &[JobStatus::Running], &|j| {
                            j.complete_step(step_name.clone(), data.clone(), now)
                        })
                        .await?;

                    // step boundary: a concurrent cancel wins this transition
                    match self
                        .store
                        .transition_job(job_id, "resume", &[JobStatus::StepComplete], &|j| {
                            j.resume_step(now)
                        })
                        .await
                    {
                        Ok(resumed) => {
                            job = resumed;
                            idx = pos;
                        }
                        Err(EngineError::InvalidState { .. }) => {
                            let current = self.store.get_job(job_id).await?;
                            if current.status == JobStatus::Cancelled {
                                info!(job = %current.id, "cancelled at step boundary");
                                return Ok(current);
                            }
                            return Err(EngineError::invalid_state("resume", current.status));
                        }
                        Err(err) => return Err(err),
                    }
                }
            }
        }

        // the chain's last step already completed in a previous run; nothing
        // left to execute, close the job out
        let final_step = chain
            .last()
            .map(|(name, _)| name.clone())
            .unwrap_or_else(|| StepName::new("(empty)"));
        let now = self.clock.now();
        self.store
            .transition_job(job_id, "finish", &[JobStatus::Running], &|j| {
                j.mark_succeeded(final_step.clone(), serde_json::Value::Null, now)
            })
            .await
    }
}

/// First line, bounded length.
fn summarize_error(message: &str) -> String {
    let line = message.lines().next().unwrap_or("").trim();
    if line.len() > ERROR_SUMMARY_MAX {
        let cut = line
            .char_indices()
            .take_while(|(i, _)| *i < ERROR_SUMMARY_MAX)
            .last()
            .map(|(i, c)| i + c.len_utf8())
            .unwrap_or(0);
        format!("{}…", &line[..cut])
    } else {
        line.to_string()
    }
}
