//! syndicate-core
//!
//! Background job/workflow execution engine with a multi-channel
//! distribution pipeline, for a content platform that pushes posts out to
//! external targets.
//!
//! Module map:
//! - **domain**: records and vocabulary (ids, job, distribution, channel,
//!   errors, fingerprint)
//! - **ports**: abstraction layer (RecordStore, PlatformClient, Clock,
//!   IdGenerator)
//! - **impls**: development/test implementations (in-memory store, console
//!   platform)
//! - **queue**: in-process priority queue (priority desc, FIFO within)
//! - **dedup**: single-flight fingerprint guard
//! - **workflow**: step chains, registry, the runner state machine, workers
//! - **distribution**: dispatcher + per-channel circuit breaker and rate
//!   limiter + health reporting
//! - **engine**: builder and facade tying it together

pub mod config;
pub mod dedup;
pub mod distribution;
pub mod domain;
pub mod engine;
pub mod impls;
pub mod ports;
pub mod queue;
pub mod workflow;

pub use config::EngineConfig;
pub use dedup::DedupGuard;
pub use distribution::{
    BreakerConfig, BreakerState, ChannelHealth, CircuitBreaker, Dispatcher, HealthReporter,
    RateLimitConfig, TokenBucket,
};
pub use domain::{
    Channel, ChannelId, ChannelKind, DeliveryError, DistributionId, DistributionRecord,
    DistributionStatus, EngineError, ExternalRef, JobId, JobRecord, JobStatus, JobType, PostId,
    Priority, StepName, fingerprint,
};
pub use engine::{BuildError, Engine, EngineBuilder};
pub use impls::{ConsolePlatform, InMemoryRecordStore};
pub use ports::{
    Clock, DistributionFilter, FixedClock, IdGenerator, PlatformClient, RecordStore, SystemClock,
    UlidGenerator,
};
pub use queue::PriorityQueue;
pub use workflow::{JobRunner, Step, StepOutcome, WorkerGroup, WorkflowRegistry, step};
