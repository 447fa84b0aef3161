//! Workflow execution: step chains, the registry, the runner, workers.

pub mod registry;
pub mod runner;
pub mod step;
pub mod worker;

pub use registry::WorkflowRegistry;
pub use runner::JobRunner;
pub use step::{Step, StepOutcome, step};
pub use worker::WorkerGroup;
