//! Distribution dispatcher: pushes posts to external channels.
//!
//! Every dispatch runs the same gauntlet: kill switch, claim the record
//! (Scheduled/Pending -> InProgress), take a rate-limit token, pass the
//! circuit breaker, then the platform call under a timeout. Failures are
//! classified and persisted; rate-limit rejections never count against the
//! breaker (running out of tokens is our doing, not the platform's).

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, info, warn};

use crate::domain::{
    Channel, ChannelId, ChannelKind, DeliveryError, DistributionId, DistributionRecord,
    DistributionStatus, EngineError, PostId,
};
use crate::ports::record_store::DistributionFilter;
use crate::ports::{Clock, IdGenerator, PlatformClient, RecordStore};

use super::guard::GuardMap;

pub struct Dispatcher {
    store: Arc<dyn RecordStore>,
    channels: HashMap<ChannelId, Channel>,
    platforms: HashMap<ChannelKind, Arc<dyn PlatformClient>>,
    guards: Arc<GuardMap>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    dispatch_timeout: std::time::Duration,
    max_attempts: u32,
    /// Site-wide kill switch; reads and in-flight work stay unaffected.
    enabled: AtomicBool,
}

impl Dispatcher {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn RecordStore>,
        channels: HashMap<ChannelId, Channel>,
        platforms: HashMap<ChannelKind, Arc<dyn PlatformClient>>,
        guards: Arc<GuardMap>,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
        dispatch_timeout: std::time::Duration,
        max_attempts: u32,
        enabled: bool,
    ) -> Self {
        Self {
            store,
            channels,
            platforms,
            guards,
            clock,
            ids,
            dispatch_timeout,
            max_attempts,
            enabled: AtomicBool::new(enabled),
        }
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
        info!(enabled, "distribution kill switch flipped");
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    fn ensure_enabled(&self) -> Result<(), EngineError> {
        if self.is_enabled() {
            Ok(())
        } else {
            Err(EngineError::ModuleDisabled)
        }
    }

    pub fn channel(&self, id: ChannelId) -> Option<&Channel> {
        self.channels.get(&id)
    }

    pub fn channels(&self) -> impl Iterator<Item = &Channel> {
        self.channels.values()
    }

    /// Deliver one record to its channel.
    ///
    /// On failure the record lands in Failed with `last_error` set and the
    /// classified `DeliveryError` comes back to the caller.
    pub async fn dispatch(
        &self,
        id: DistributionId,
    ) -> Result<DistributionRecord, EngineError> {
        self.ensure_enabled()?;

        let now = self.clock.now();
        let record = self
            .store
            .transition_distribution(
                id,
                "dispatch",
                &[DistributionStatus::Scheduled, DistributionStatus::Pending],
                &|r| r.start_attempt(now),
            )
            .await?;

        let channel = match self.channels.get(&record.channel_id) {
            Some(channel) => channel,
            None => {
                let message = format!("unknown channel {}", record.channel_id);
                self.persist_failure(id, &message).await?;
                return Err(EngineError::NotFound(message));
            }
        };
        let platform = self.platforms.get(&channel.kind).ok_or_else(|| {
            EngineError::Validation(format!("no platform adapter for kind {}", channel.kind))
        })?;

        // The guard stays locked across the platform call: dispatches to the
        // same channel are serialized, other channels proceed in parallel.
        let guard = self.guards.guard(record.channel_id);
        let mut guard = guard.lock().await;

        if let Err(err) = guard.limiter.try_acquire(now) {
            drop(guard);
            return Err(self.record_delivery_failure(id, err).await?);
        }
        if let Err(err) = guard.breaker.check(now) {
            drop(guard);
            return Err(self.record_delivery_failure(id, err).await?);
        }

        debug!(record = %id, channel = %channel.name, attempt = record.attempts, "delivering");
        let outcome =
            tokio::time::timeout(self.dispatch_timeout, platform.deliver(&record, channel)).await;
        let now = self.clock.now();

        match outcome {
            Ok(Ok(external_ref)) => {
                guard.breaker.on_success();
                drop(guard);
                let updated = self
                    .store
                    .transition_distribution(
                        id,
                        "complete",
                        &[DistributionStatus::InProgress],
                        &|r| r.mark_succeeded(external_ref.clone(), now),
                    )
                    .await?;
                info!(record = %id, channel = %channel.name, external_ref = %external_ref, "delivered");
                Ok(updated)
            }
            Ok(Err(err)) => {
                guard.breaker.on_failure(now);
                drop(guard);
                Err(self.record_delivery_failure(id, err).await?)
            }
            Err(_elapsed) => {
                guard.breaker.on_failure(now);
                drop(guard);
                let err = DeliveryError::TransientNetwork(format!(
                    "no response within {:?}",
                    self.dispatch_timeout
                ));
                Err(self.record_delivery_failure(id, err).await?)
            }
        }
    }

    /// Create one Scheduled record per (post, channel) pair, skipping pairs
    /// that already have an open record — idempotent re-invocation.
    pub async fn bulk_distribute(
        &self,
        post_ids: &[PostId],
        channel_ids: &[ChannelId],
    ) -> Result<Vec<DistributionRecord>, EngineError> {
        self.ensure_enabled()?;

        for channel_id in channel_ids {
            if !self.channels.contains_key(channel_id) {
                return Err(EngineError::NotFound(format!(
                    "unknown channel {channel_id}"
                )));
            }
        }

        let mut created = Vec::new();
        for post_id in post_ids {
            for channel_id in channel_ids {
                let channel = &self.channels[channel_id];
                if !channel.active {
                    warn!(post = %post_id, channel = %channel.name, "channel inactive, skipping");
                    continue;
                }
                if self
                    .store
                    .find_open_distribution(post_id, *channel_id)
                    .await?
                    .is_some()
                {
                    debug!(post = %post_id, channel = %channel.name, "open record exists, skipping");
                    continue;
                }
                let now = self.clock.now();
                let record = DistributionRecord::new(
                    self.ids.generate_distribution_id(),
                    post_id.clone(),
                    *channel_id,
                    now,
                    now,
                );
                self.store.create_distribution(record.clone()).await?;
                created.push(record);
            }
        }
        info!(created = created.len(), "bulk distribution scheduled");
        Ok(created)
    }

    /// Manual retry of a Failed record: re-submits immediately rather than
    /// queueing, unless the channel's breaker is open — then it fails fast
    /// without touching the record.
    pub async fn retry(&self, id: DistributionId) -> Result<DistributionRecord, EngineError> {
        self.ensure_enabled()?;

        let record = self.store.get_distribution(id).await?;
        if record.status != DistributionStatus::Failed {
            return Err(EngineError::invalid_state("retry", record.status));
        }
        if record.attempts >= self.max_attempts {
            return Err(EngineError::invalid_state(
                "retry",
                format!("failed permanently after {} attempts", record.attempts),
            ));
        }

        // fast-fail on an open breaker, without consuming the half-open trial
        {
            let guard = self.guards.guard(record.channel_id);
            let guard = guard.lock().await;
            if let Some(retry_at) = guard.breaker.peek_rejection(self.clock.now()) {
                return Err(DeliveryError::CircuitOpen { retry_at }.into());
            }
        }

        let now = self.clock.now();
        self.store
            .transition_distribution(id, "retry", &[DistributionStatus::Failed], &|r| {
                r.mark_retried(now)
            })
            .await?;
        self.dispatch(id).await
    }

    /// Cancel is only legal before delivery starts.
    pub async fn cancel(&self, id: DistributionId) -> Result<DistributionRecord, EngineError> {
        let now = self.clock.now();
        self.store
            .transition_distribution(
                id,
                "cancel",
                &[DistributionStatus::Scheduled, DistributionStatus::Pending],
                &|r| r.mark_cancelled(now),
            )
            .await
    }

    /// Drain everything due: Scheduled/Pending records whose scheduled time
    /// has arrived. Failures stay on their records; the drain continues.
    pub async fn run_pending(&self) -> Result<Vec<DistributionRecord>, EngineError> {
        self.ensure_enabled()?;

        let due = self
            .store
            .list_distributions(&DistributionFilter::with_statuses(vec![
                DistributionStatus::Scheduled,
                DistributionStatus::Pending,
            ]))
            .await?;
        let now = self.clock.now();

        let mut results = Vec::new();
        for record in due {
            if record.scheduled_at > now {
                continue;
            }
            match self.dispatch(record.id).await {
                Ok(updated) => results.push(updated),
                Err(EngineError::Delivery(_)) => {
                    // classified and persisted; pick up the failed record
                    results.push(self.store.get_distribution(record.id).await?);
                }
                Err(err) => {
                    warn!(record = %record.id, error = %err, "dispatch skipped");
                }
            }
        }
        Ok(results)
    }

    pub async fn get_distribution(
        &self,
        id: DistributionId,
    ) -> Result<DistributionRecord, EngineError> {
        self.store.get_distribution(id).await
    }

    pub async fn get_post_distributions(
        &self,
        post_id: &PostId,
    ) -> Result<Vec<DistributionRecord>, EngineError> {
        self.store.list_post_distributions(post_id).await
    }

    pub async fn get_distributions(
        &self,
        filter: &DistributionFilter,
    ) -> Result<Vec<DistributionRecord>, EngineError> {
        self.store.list_distributions(filter).await
    }

    /// Persist a classified delivery failure and hand the error back.
    async fn record_delivery_failure(
        &self,
        id: DistributionId,
        err: DeliveryError,
    ) -> Result<EngineError, EngineError> {
        self.persist_failure(id, &err.to_string()).await?;
        warn!(record = %id, error = %err, "delivery failed");
        Ok(EngineError::Delivery(err))
    }

    async fn persist_failure(
        &self,
        id: DistributionId,
        message: &str,
    ) -> Result<(), EngineError> {
        let now = self.clock.now();
        self.store
            .transition_distribution(id, "fail", &[DistributionStatus::InProgress], &|r| {
                r.mark_failed(message.to_string(), now)
            })
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distribution::breaker::{BreakerConfig, BreakerState};
    use crate::distribution::limiter::RateLimitConfig;
    use crate::domain::ExternalRef;
    use crate::impls::InMemoryRecordStore;
    use crate::ports::{SystemClock, UlidGenerator};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::AtomicU32;
    use ulid::Ulid;

    /// Platform whose outcomes are scripted per call; counts invocations.
    struct ScriptedPlatform {
        script: Mutex<VecDeque<Result<(), DeliveryError>>>,
        calls: AtomicU32,
    }

    impl ScriptedPlatform {
        fn new(script: Vec<Result<(), DeliveryError>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                calls: AtomicU32::new(0),
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PlatformClient for ScriptedPlatform {
        async fn deliver(
            &self,
            record: &DistributionRecord,
            _channel: &Channel,
        ) -> Result<ExternalRef, DeliveryError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.script.lock().unwrap().pop_front() {
                Some(Ok(())) | None => Ok(ExternalRef::new(format!("ext-{}", record.id))),
                Some(Err(err)) => Err(err),
            }
        }
    }

    struct Harness {
        dispatcher: Dispatcher,
        store: Arc<InMemoryRecordStore>,
        platform: Arc<ScriptedPlatform>,
        channel_id: ChannelId,
    }

    fn harness_with(
        script: Vec<Result<(), DeliveryError>>,
        breaker: BreakerConfig,
        limiter: RateLimitConfig,
    ) -> Harness {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let store = Arc::new(InMemoryRecordStore::new());
        let platform = Arc::new(ScriptedPlatform::new(script));
        let channel_id = ChannelId::from_ulid(Ulid::new());
        let channel = Channel::new(channel_id, "Dev Portal", ChannelKind::new("webhook"));

        let dispatcher = Dispatcher::new(
            Arc::clone(&store) as Arc<dyn RecordStore>,
            HashMap::from([(channel_id, channel)]),
            HashMap::from([(
                ChannelKind::new("webhook"),
                Arc::clone(&platform) as Arc<dyn PlatformClient>,
            )]),
            Arc::new(GuardMap::new(breaker, limiter, Arc::clone(&clock))),
            Arc::clone(&clock),
            Arc::new(UlidGenerator::new(Arc::clone(&clock))),
            std::time::Duration::from_secs(1),
            3,
            true,
        );

        Harness {
            dispatcher,
            store,
            platform,
            channel_id,
        }
    }

    fn harness(script: Vec<Result<(), DeliveryError>>) -> Harness {
        harness_with(
            script,
            BreakerConfig::default(),
            RateLimitConfig {
                rate_per_sec: 1000.0,
                burst: 1000.0,
            },
        )
    }

    async fn scheduled_record(h: &Harness, post: &str) -> DistributionId {
        let now = chrono::Utc::now();
        let record = DistributionRecord::new(
            DistributionId::from_ulid(Ulid::new()),
            PostId::new(post),
            h.channel_id,
            now,
            now,
        );
        let id = record.id;
        h.store.create_distribution(record).await.unwrap();
        id
    }

    #[tokio::test]
    async fn successful_dispatch_records_the_external_ref() {
        let h = harness(vec![Ok(())]);
        let id = scheduled_record(&h, "p1").await;

        let record = h.dispatcher.dispatch(id).await.unwrap();

        assert_eq!(record.status, DistributionStatus::Succeeded);
        assert!(record.external_ref.is_some());
        assert_eq!(record.attempts, 1);
        assert_eq!(h.platform.calls(), 1);
    }

    #[tokio::test]
    async fn exhausted_burst_rejects_before_the_platform_and_the_breaker() {
        let h = harness_with(
            vec![Ok(()), Ok(())],
            BreakerConfig::default(),
            RateLimitConfig {
                rate_per_sec: 0.001,
                burst: 1.0,
            },
        );
        let first = scheduled_record(&h, "p1").await;
        let second = scheduled_record(&h, "p2").await;

        h.dispatcher.dispatch(first).await.unwrap();
        let err = h.dispatcher.dispatch(second).await.unwrap_err();

        assert!(matches!(
            err,
            EngineError::Delivery(DeliveryError::RateLimited)
        ));
        // no second platform call was made
        assert_eq!(h.platform.calls(), 1);
        // the rejected record is failed-but-retryable
        let record = h.store.get_distribution(second).await.unwrap();
        assert_eq!(record.status, DistributionStatus::Failed);
        // a rate-limit rejection is not a breaker failure
        let snap = h.dispatcher.guards.snapshot(h.channel_id).await;
        assert_eq!(snap.consecutive_failures, 0);
        assert_eq!(snap.breaker_state, BreakerState::Closed);
    }

    #[tokio::test]
    async fn breaker_opens_after_threshold_and_fast_fails_without_calling_out() {
        let h = harness_with(
            vec![
                Err(DeliveryError::TransientNetwork("reset".into())),
                Err(DeliveryError::TransientNetwork("reset".into())),
            ],
            BreakerConfig {
                failure_threshold: 2,
                ..BreakerConfig::default()
            },
            RateLimitConfig {
                rate_per_sec: 1000.0,
                burst: 1000.0,
            },
        );

        for post in ["p1", "p2"] {
            let id = scheduled_record(&h, post).await;
            h.dispatcher.dispatch(id).await.unwrap_err();
        }
        assert_eq!(h.platform.calls(), 2);

        let id = scheduled_record(&h, "p3").await;
        let err = h.dispatcher.dispatch(id).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::Delivery(DeliveryError::CircuitOpen { .. })
        ));
        // the external platform was never contacted for the third record
        assert_eq!(h.platform.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn a_hung_platform_is_classified_as_transient_network() {
        struct HangingPlatform;

        #[async_trait]
        impl PlatformClient for HangingPlatform {
            async fn deliver(
                &self,
                _record: &DistributionRecord,
                _channel: &Channel,
            ) -> Result<ExternalRef, DeliveryError> {
                tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
                Ok(ExternalRef::new("never"))
            }
        }

        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let store = Arc::new(InMemoryRecordStore::new());
        let channel_id = ChannelId::from_ulid(Ulid::new());
        let channel = Channel::new(channel_id, "Dev Portal", ChannelKind::new("webhook"));
        let dispatcher = Dispatcher::new(
            Arc::clone(&store) as Arc<dyn RecordStore>,
            HashMap::from([(channel_id, channel)]),
            HashMap::from([(
                ChannelKind::new("webhook"),
                Arc::new(HangingPlatform) as Arc<dyn PlatformClient>,
            )]),
            Arc::new(GuardMap::new(
                BreakerConfig::default(),
                RateLimitConfig::default(),
                Arc::clone(&clock),
            )),
            Arc::clone(&clock),
            Arc::new(UlidGenerator::new(Arc::clone(&clock))),
            std::time::Duration::from_millis(100),
            3,
            true,
        );

        let now = chrono::Utc::now();
        let record = DistributionRecord::new(
            DistributionId::from_ulid(Ulid::new()),
            PostId::new("p1"),
            channel_id,
            now,
            now,
        );
        let id = record.id;
        store.create_distribution(record).await.unwrap();

        let err = dispatcher.dispatch(id).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::Delivery(DeliveryError::TransientNetwork(_))
        ));
        let record = store.get_distribution(id).await.unwrap();
        assert_eq!(record.status, DistributionStatus::Failed);
    }

    #[tokio::test]
    async fn kill_switch_refuses_mutating_operations() {
        let h = harness(vec![Ok(())]);
        let id = scheduled_record(&h, "p1").await;
        h.dispatcher.set_enabled(false);

        assert!(matches!(
            h.dispatcher.dispatch(id).await.unwrap_err(),
            EngineError::ModuleDisabled
        ));
        assert!(matches!(
            h.dispatcher
                .bulk_distribute(&[PostId::new("p1")], &[h.channel_id])
                .await
                .unwrap_err(),
            EngineError::ModuleDisabled
        ));
        assert!(matches!(
            h.dispatcher.retry(id).await.unwrap_err(),
            EngineError::ModuleDisabled
        ));

        // reads and cancels still work
        h.dispatcher.get_distribution(id).await.unwrap();
        h.dispatcher.cancel(id).await.unwrap();
    }

    #[tokio::test]
    async fn bulk_distribute_is_idempotent_on_open_pairs() {
        let h = harness(vec![]);
        let posts = [PostId::new("p1"), PostId::new("p2")];

        let first = h
            .dispatcher
            .bulk_distribute(&posts, &[h.channel_id])
            .await
            .unwrap();
        assert_eq!(first.len(), 2);

        let second = h
            .dispatcher
            .bulk_distribute(&posts, &[h.channel_id])
            .await
            .unwrap();
        assert!(second.is_empty());
    }

    #[tokio::test]
    async fn bulk_distribute_rejects_unknown_channels_and_skips_inactive() {
        let h = harness(vec![]);
        let unknown = ChannelId::from_ulid(Ulid::new());
        assert!(matches!(
            h.dispatcher
                .bulk_distribute(&[PostId::new("p1")], &[unknown])
                .await
                .unwrap_err(),
            EngineError::NotFound(_)
        ));

        // an inactive channel produces no records
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let store = Arc::new(InMemoryRecordStore::new());
        let channel_id = ChannelId::from_ulid(Ulid::new());
        let channel =
            Channel::new(channel_id, "Paused", ChannelKind::new("webhook")).inactive();
        let dispatcher = Dispatcher::new(
            Arc::clone(&store) as Arc<dyn RecordStore>,
            HashMap::from([(channel_id, channel)]),
            HashMap::new(),
            Arc::new(GuardMap::new(
                BreakerConfig::default(),
                RateLimitConfig::default(),
                Arc::clone(&clock),
            )),
            Arc::clone(&clock),
            Arc::new(UlidGenerator::new(Arc::clone(&clock))),
            std::time::Duration::from_secs(1),
            3,
            true,
        );

        let created = dispatcher
            .bulk_distribute(&[PostId::new("p1")], &[channel_id])
            .await
            .unwrap();
        assert!(created.is_empty());
    }

    #[tokio::test]
    async fn cancel_is_only_legal_before_delivery_starts() {
        let h = harness(vec![Ok(()), Ok(())]);

        let cancellable = scheduled_record(&h, "p1").await;
        let record = h.dispatcher.cancel(cancellable).await.unwrap();
        assert_eq!(record.status, DistributionStatus::Cancelled);

        let delivered = scheduled_record(&h, "p2").await;
        h.dispatcher.dispatch(delivered).await.unwrap();
        let err = h.dispatcher.cancel(delivered).await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidState { .. }));
    }

    #[tokio::test]
    async fn retry_resubmits_a_failed_record_immediately() {
        let h = harness(vec![
            Err(DeliveryError::TransientNetwork("reset".into())),
            Ok(()),
        ]);
        let id = scheduled_record(&h, "p1").await;

        h.dispatcher.dispatch(id).await.unwrap_err();
        let record = h.dispatcher.retry(id).await.unwrap();

        assert_eq!(record.status, DistributionStatus::Succeeded);
        assert_eq!(record.attempts, 2);
        assert_eq!(h.platform.calls(), 2);
    }

    #[tokio::test]
    async fn retry_is_rejected_for_succeeded_records_and_exhausted_budgets() {
        let h = harness(vec![
            Ok(()),
            Err(DeliveryError::TransientNetwork("reset".into())),
            Err(DeliveryError::TransientNetwork("reset".into())),
            Err(DeliveryError::TransientNetwork("reset".into())),
        ]);

        let done = scheduled_record(&h, "p1").await;
        h.dispatcher.dispatch(done).await.unwrap();
        assert!(matches!(
            h.dispatcher.retry(done).await.unwrap_err(),
            EngineError::InvalidState { .. }
        ));

        // burn through the attempt budget (max_attempts = 3)
        let doomed = scheduled_record(&h, "p2").await;
        h.dispatcher.dispatch(doomed).await.unwrap_err();
        h.dispatcher.retry(doomed).await.unwrap_err();
        h.dispatcher.retry(doomed).await.unwrap_err();
        let err = h.dispatcher.retry(doomed).await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidState { .. }));
        assert_eq!(h.store.get_distribution(doomed).await.unwrap().attempts, 3);
    }

    #[tokio::test]
    async fn retry_fails_fast_while_the_breaker_is_open() {
        let h = harness_with(
            vec![
                Err(DeliveryError::TransientNetwork("reset".into())),
                Err(DeliveryError::TransientNetwork("reset".into())),
            ],
            BreakerConfig {
                failure_threshold: 2,
                ..BreakerConfig::default()
            },
            RateLimitConfig {
                rate_per_sec: 1000.0,
                burst: 1000.0,
            },
        );

        let first = scheduled_record(&h, "p1").await;
        let second = scheduled_record(&h, "p2").await;
        h.dispatcher.dispatch(first).await.unwrap_err();
        h.dispatcher.dispatch(second).await.unwrap_err();

        let before = h.store.get_distribution(first).await.unwrap();
        let err = h.dispatcher.retry(first).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::Delivery(DeliveryError::CircuitOpen { .. })
        ));
        // fast-fail leaves the record untouched
        let after = h.store.get_distribution(first).await.unwrap();
        assert_eq!(after.attempts, before.attempts);
        assert_eq!(after.status, DistributionStatus::Failed);
        assert_eq!(h.platform.calls(), 2);
    }

    #[tokio::test]
    async fn run_pending_drains_due_records_and_keeps_going_past_failures() {
        let h = harness(vec![
            Ok(()),
            Err(DeliveryError::PlatformRejected("bad".into())),
            Ok(()),
        ]);
        for post in ["p1", "p2", "p3"] {
            scheduled_record(&h, post).await;
        }

        let results = h.dispatcher.run_pending().await.unwrap();
        assert_eq!(results.len(), 3);

        let succeeded = results
            .iter()
            .filter(|r| r.status == DistributionStatus::Succeeded)
            .count();
        let failed = results
            .iter()
            .filter(|r| r.status == DistributionStatus::Failed)
            .count();
        assert_eq!(succeeded, 2);
        assert_eq!(failed, 1);
    }
}
