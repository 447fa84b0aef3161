//! PlatformClient port: the boundary to one external publishing platform.

use async_trait::async_trait;

use crate::domain::{Channel, DeliveryError, DistributionRecord, ExternalRef};

/// Pushes one post to one channel of an external platform.
///
/// Implementations classify their own failures into `DeliveryError` kinds;
/// the dispatcher adds the timeout (treated as transient) and the
/// breaker/limiter pre-checks around every call. At-least-once is the
/// contract: an adapter may be invoked again for a record that already went
/// out if the confirmation was lost, so deliveries should be idempotent on
/// `record.id` where the platform allows it.
#[async_trait]
pub trait PlatformClient: Send + Sync {
    async fn deliver(
        &self,
        record: &DistributionRecord,
        channel: &Channel,
    ) -> Result<ExternalRef, DeliveryError>;
}
