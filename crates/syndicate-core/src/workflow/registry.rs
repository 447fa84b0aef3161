//! Workflow registry: job type -> ordered chain of named steps.
//!
//! Design: built once during initialization (mutable), read-only at runtime
//! behind an `Arc`. No locks needed on the hot path.

use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::{EngineError, JobType, StepName};

use super::step::Step;

#[derive(Default)]
pub struct WorkflowRegistry {
    chains: HashMap<JobType, Vec<(StepName, Arc<dyn Step>)>>,
}

impl WorkflowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the step chain for a job type. Rejects re-registration,
    /// empty chains, and duplicate step names within the chain.
    pub fn register(
        &mut self,
        job_type: JobType,
        steps: Vec<(StepName, Arc<dyn Step>)>,
    ) -> Result<(), EngineError> {
        if self.chains.contains_key(&job_type) {
            return Err(EngineError::Validation(format!(
                "workflow for {job_type} is already registered"
            )));
        }
        if steps.is_empty() {
            return Err(EngineError::Validation(format!(
                "workflow for {job_type} has no steps"
            )));
        }
        let mut seen = std::collections::HashSet::new();
        for (name, _) in &steps {
            if !seen.insert(name.clone()) {
                return Err(EngineError::Validation(format!(
                    "workflow for {job_type} registers step {name} twice"
                )));
            }
        }
        self.chains.insert(job_type, steps);
        Ok(())
    }

    pub fn chain(&self, job_type: &JobType) -> Option<&[(StepName, Arc<dyn Step>)]> {
        self.chains.get(job_type).map(|c| c.as_slice())
    }

    /// Index of `step` within the chain for `job_type`.
    pub fn position(&self, job_type: &JobType, step: &StepName) -> Option<usize> {
        self.chains
            .get(job_type)?
            .iter()
            .position(|(name, _)| name == step)
    }

    pub fn contains(&self, job_type: &JobType) -> bool {
        self.chains.contains_key(job_type)
    }

    pub fn registered_types(&self) -> Vec<JobType> {
        self.chains.keys().cloned().collect()
    }
}
