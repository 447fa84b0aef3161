//! ConsolePlatform: a development platform adapter.
//!
//! Logs every delivery and keeps them in memory so a demo (or a test) can
//! inspect what went out. No network involved.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tracing::info;
use ulid::Ulid;

use crate::domain::{Channel, DeliveryError, DistributionRecord, ExternalRef, PostId};
use crate::ports::PlatformClient;

/// One recorded delivery.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub post_id: PostId,
    pub channel_name: String,
    pub external_ref: ExternalRef,
}

#[derive(Clone, Default)]
pub struct ConsolePlatform {
    deliveries: Arc<Mutex<Vec<Delivery>>>,
}

impl ConsolePlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deliveries(&self) -> Vec<Delivery> {
        self.deliveries
            .lock()
            .expect("delivery log lock poisoned")
            .clone()
    }
}

#[async_trait]
impl PlatformClient for ConsolePlatform {
    async fn deliver(
        &self,
        record: &DistributionRecord,
        channel: &Channel,
    ) -> Result<ExternalRef, DeliveryError> {
        let external_ref = ExternalRef::new(format!("{}-{}", channel.kind, Ulid::new()));
        info!(
            post = %record.post_id,
            channel = %channel.name,
            external_ref = %external_ref,
            "delivered"
        );
        self.deliveries
            .lock()
            .expect("delivery log lock poisoned")
            .push(Delivery {
                post_id: record.post_id.clone(),
                channel_name: channel.name.clone(),
                external_ref: external_ref.clone(),
            });
        Ok(external_ref)
    }
}
