//! Job record and status management.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::ids::JobId;

/// Job kind. Selects the registered workflow (ordered step chain).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobType(String);

impl JobType {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Name of one workflow step within a job type's chain.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StepName(String);

impl StepName {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StepName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Queue priority. Higher is served first; `Ord` derives in declaration
/// order, so the variants must stay lowest-to-highest.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
}

/// Job state.
///
/// State transitions:
/// - Pending -> Running -> StepComplete -> Running (next step, repeats)
/// - Running -> Succeeded (final step returned no successor)
/// - Running -> Failed (step error; manual retry resets to Pending)
/// - Pending | StepComplete -> Cancelled
///
/// Design note: transitions are monotonic except Failed -> Pending (manual
/// retry). Terminal states are never left once a retry budget is exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    StepComplete,
    Succeeded,
    Failed,
    Cancelled,
}

impl JobStatus {
    /// Is this a terminal state (no further transitions besides manual retry
    /// of Failed)?
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Succeeded | JobStatus::Failed | JobStatus::Cancelled
        )
    }

    /// Open = still occupying the dedup window (Pending/Running/StepComplete).
    pub fn is_open(self) -> bool {
        !self.is_terminal()
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::StepComplete => "step_complete",
            JobStatus::Succeeded => "succeeded",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Job record: one asynchronous unit of work advancing through named steps.
///
/// Design: single source of truth for job state lives in the record store;
/// state transitions go through the `mark_*` methods (never direct field
/// pokes) so `updated_at` stays honest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: JobId,
    pub job_type: JobType,

    /// Opaque structured input; step outputs are merged in as the workflow
    /// advances so a resumed job sees everything prior steps produced.
    pub payload: serde_json::Value,

    pub priority: Priority,
    pub status: JobStatus,

    /// Name of the last completed step (None before the first step finishes).
    pub step: Option<StepName>,

    /// Stable hash of job_type + canonicalized payload, used for dedup.
    pub fingerprint: String,

    /// Number of run attempts charged against the retry budget.
    pub attempts: u32,

    pub last_error: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobRecord {
    pub fn new(
        id: JobId,
        job_type: JobType,
        payload: serde_json::Value,
        priority: Priority,
        fingerprint: String,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            job_type,
            payload,
            priority,
            status: JobStatus::Pending,
            step: None,
            fingerprint,
            attempts: 0,
            last_error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Claim: Pending/StepComplete -> Running, counting the attempt.
    pub fn start_attempt(&mut self, now: DateTime<Utc>) {
        self.status = JobStatus::Running;
        self.attempts += 1;
        self.updated_at = now;
    }

    /// Resume within one run: StepComplete -> Running without re-counting.
    pub fn resume_step(&mut self, now: DateTime<Utc>) {
        self.status = JobStatus::Running;
        self.updated_at = now;
    }

    /// Persist a completed step and its output before the next step runs.
    pub fn complete_step(
        &mut self,
        step: StepName,
        data: serde_json::Value,
        now: DateTime<Utc>,
    ) {
        self.status = JobStatus::StepComplete;
        self.merge_step_data(&step, data);
        self.step = Some(step);
        self.updated_at = now;
    }

    /// Terminal success: records the final step name alongside the status.
    pub fn mark_succeeded(&mut self, step: StepName, data: serde_json::Value, now: DateTime<Utc>) {
        self.status = JobStatus::Succeeded;
        self.merge_step_data(&step, data);
        self.step = Some(step);
        self.last_error = None;
        self.updated_at = now;
    }

    pub fn mark_failed(&mut self, error: String, now: DateTime<Utc>) {
        self.status = JobStatus::Failed;
        self.last_error = Some(error);
        self.updated_at = now;
    }

    pub fn mark_cancelled(&mut self, now: DateTime<Utc>) {
        self.status = JobStatus::Cancelled;
        self.updated_at = now;
    }

    /// Manual retry: Failed -> Pending, consuming one unit of the budget.
    pub fn mark_retried(&mut self, now: DateTime<Utc>) {
        self.status = JobStatus::Pending;
        self.attempts += 1;
        self.updated_at = now;
    }

    /// Object outputs merge into the payload (later keys win); anything else
    /// non-null is kept under the step's name.
    fn merge_step_data(&mut self, step: &StepName, data: serde_json::Value) {
        match data {
            serde_json::Value::Null => {}
            serde_json::Value::Object(map) => {
                if let serde_json::Value::Object(payload) = &mut self.payload {
                    payload.extend(map);
                } else {
                    self.payload = serde_json::Value::Object(map);
                }
            }
            other => {
                if let serde_json::Value::Object(payload) = &mut self.payload {
                    payload.insert(step.as_str().to_string(), other);
                }
            }
        }
    }
}
