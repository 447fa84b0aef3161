//! Deduplication guard: single-flight fingerprint reservation.
//!
//! Two concurrent enqueues with the same fingerprint must not both pass the
//! open-job lookup, so the lookup and the job creation happen while holding
//! a per-fingerprint async mutex. Different fingerprints never contend.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::domain::{EngineError, JobRecord};
use crate::ports::RecordStore;

#[derive(Default)]
pub struct DedupGuard {
    inflight: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl DedupGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically check for an open job with this fingerprint and create the
    /// record if there is none. Fails with `DuplicateJob` (carrying the
    /// existing id) on collision.
    pub async fn check_and_reserve(
        &self,
        store: &dyn RecordStore,
        job: JobRecord,
    ) -> Result<JobRecord, EngineError> {
        let fingerprint = job.fingerprint.clone();
        let lock = self.lock_for(&fingerprint);
        let result = {
            let _held = lock.lock().await;

            if let Some(existing) = store.find_open_job_by_fingerprint(&fingerprint).await? {
                Err(EngineError::DuplicateJob {
                    existing: existing.id,
                })
            } else {
                store.create_job(job.clone()).await?;
                Ok(job)
            }
        };
        self.prune(&fingerprint);
        result
    }

    fn lock_for(&self, fingerprint: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut inflight = self.inflight.lock().expect("dedup lock poisoned");
        Arc::clone(
            inflight
                .entry(fingerprint.to_string())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(()))),
        )
    }

    /// Drop the map entry once nobody else is waiting on it, so the map
    /// doesn't grow with every fingerprint ever seen.
    fn prune(&self, fingerprint: &str) {
        let mut inflight = self.inflight.lock().expect("dedup lock poisoned");
        if let Some(lock) = inflight.get(fingerprint)
            && Arc::strong_count(lock) == 1
        {
            inflight.remove(fingerprint);
        }
    }
}
