//! Step trait: one named transition function inside a workflow.

use async_trait::async_trait;
use std::sync::Arc;

use crate::domain::{JobRecord, StepName};

/// What a step produced and where the workflow goes next.
///
/// `next = None` signals the workflow is complete. A named successor must be
/// a registered step of the same chain, further along than the current one —
/// the runner enforces both.
#[derive(Debug, Clone)]
pub struct StepOutcome {
    /// Output persisted onto the job before the next step runs. Objects
    /// merge into the payload; scalars are kept under the step's name.
    pub data: serde_json::Value,
    pub next: Option<StepName>,
}

impl StepOutcome {
    /// Continue to a named successor.
    pub fn advance(data: serde_json::Value, next: impl Into<String>) -> Self {
        Self {
            data,
            next: Some(StepName::new(next)),
        }
    }

    /// Complete the workflow with this step's output.
    pub fn complete(data: serde_json::Value) -> Self {
        Self { data, next: None }
    }

    /// Complete with nothing to persist.
    pub fn done() -> Self {
        Self::complete(serde_json::Value::Null)
    }
}

/// A pure transition function over (job, payload).
///
/// Steps may call out to their own domain services, but they never touch
/// runner state directly — every transition flows back through the runner.
/// Errors are plain strings; the runner summarizes them onto the record.
#[async_trait]
pub trait Step: Send + Sync {
    async fn run(
        &self,
        job: &JobRecord,
        payload: &serde_json::Value,
    ) -> Result<StepOutcome, String>;
}

/// Convenience for building a named chain entry without spelling the cast.
pub fn step(name: impl Into<String>, step: impl Step + 'static) -> (StepName, Arc<dyn Step>) {
    (StepName::new(name), Arc::new(step))
}
