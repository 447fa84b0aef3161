//! Domain model (ids, records, channels, errors, fingerprints).

pub mod channel;
pub mod distribution;
pub mod errors;
pub mod fingerprint;
pub mod ids;
pub mod job;

pub use channel::{Channel, ChannelKind};
pub use distribution::{DistributionRecord, DistributionStatus, ExternalRef};
pub use errors::{DeliveryError, EngineError};
pub use fingerprint::fingerprint;
pub use ids::{ChannelId, DistributionId, JobId, PostId};
pub use job::{JobRecord, JobStatus, JobType, Priority, StepName};
