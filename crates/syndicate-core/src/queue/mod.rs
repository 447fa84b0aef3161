//! In-process priority queue for pending jobs.
//!
//! Ordering: priority descending, FIFO within equal priority (a monotonic
//! sequence number breaks ties). The queue holds ids only — record state
//! lives in the store, and duplicate elimination is the dedup guard's job,
//! not ours.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Mutex;

use tokio::sync::Notify;

use crate::domain::{JobId, JobRecord, JobType, Priority};

#[derive(Debug, Clone, PartialEq, Eq)]
struct QueueEntry {
    priority: Priority,
    seq: u64,
    job_id: JobId,
    job_type: JobType,
}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // max-heap: higher priority wins, then the earlier sequence number
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

#[derive(Default)]
struct QueueState {
    heap: BinaryHeap<QueueEntry>,
    next_seq: u64,
}

/// Priority queue drained by the worker group.
#[derive(Default)]
pub struct PriorityQueue {
    state: Mutex<QueueState>,
    notify: Notify,
}

impl PriorityQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, job: &JobRecord) {
        {
            let mut state = self.state.lock().expect("queue lock poisoned");
            let seq = state.next_seq;
            state.next_seq += 1;
            state.heap.push(QueueEntry {
                priority: job.priority,
                seq,
                job_id: job.id,
                job_type: job.job_type.clone(),
            });
        }
        // notify outside the lock
        self.notify.notify_one();
    }

    /// Next job id, or None when the queue is momentarily empty.
    pub fn pop(&self) -> Option<JobId> {
        let mut state = self.state.lock().expect("queue lock poisoned");
        state.heap.pop().map(|entry| entry.job_id)
    }

    /// Blocks until a job is available.
    pub async fn pop_wait(&self) -> JobId {
        loop {
            if let Some(job_id) = self.pop() {
                return job_id;
            }
            self.notify.notified().await;
        }
    }

    /// Type-scoped draining: next job of `job_type`, keeping everything else
    /// queued in order. Linear in queue size, which is fine for the
    /// occasional scoped drain this exists for.
    pub fn pop_for_type(&self, job_type: &JobType) -> Option<JobId> {
        let mut state = self.state.lock().expect("queue lock poisoned");
        let mut stash = Vec::new();
        let mut found = None;
        while let Some(entry) = state.heap.pop() {
            if entry.job_type == *job_type {
                found = Some(entry.job_id);
                break;
            }
            stash.push(entry);
        }
        for entry in stash {
            state.heap.push(entry);
        }
        found
    }

    pub fn len(&self) -> usize {
        self.state.lock().expect("queue lock poisoned").heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
