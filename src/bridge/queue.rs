//! Strictly ordered queue of pending jobs.
//!
//! Entries are keyed by their enqueue instant (with a sequence number as
//! tie-break) so iteration order is insertion order. Only the head may be
//! removed, and only by naming its identifier.

use std::collections::BTreeMap;

use tokio::sync::oneshot;
use tokio::time::Instant;

use crate::models::{Job, JobAnswer};
use crate::{AppError, Result};

/// Monotonic enqueue position. Never compared across process restarts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct EnqueueStamp {
    at: Instant,
    seq: u64,
}

/// A job paired with the write-once slot its caller is awaiting.
#[derive(Debug)]
pub struct PendingJob {
    /// The job shown to the operator.
    pub job: Job,
    slot: oneshot::Sender<JobAnswer>,
}

impl PendingJob {
    /// Resolve the slot, waking the suspended caller.
    ///
    /// Returns `false` when nobody is waiting any more (fire-and-forget
    /// jobs, or a caller that was torn down).
    pub fn resolve(self, answer: JobAnswer) -> bool {
        self.slot.send(answer).is_ok()
    }
}

/// Unbounded FIFO of pending jobs with head-only completion.
#[derive(Debug, Default)]
pub struct OrderedQueue {
    entries: BTreeMap<EnqueueStamp, PendingJob>,
    next_seq: u64,
}

impl OrderedQueue {
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a job and its result slot.
    pub fn push(&mut self, job: Job, slot: oneshot::Sender<JobAnswer>) {
        let stamp = EnqueueStamp {
            at: Instant::now(),
            seq: self.next_seq,
        };
        self.next_seq += 1;
        self.entries.insert(stamp, PendingJob { job, slot });
    }

    /// Oldest unresolved job, left in place.
    #[must_use]
    pub fn head(&self) -> Option<&Job> {
        self.entries.values().next().map(|pending| &pending.job)
    }

    /// Remove the head, provided its identifier is `job_id`.
    ///
    /// On mismatch the queue is left untouched.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Consistency` when the queue is empty or when
    /// `job_id` is not the head.
    pub fn pop_head(&mut self, job_id: &str) -> Result<PendingJob> {
        let Some(head) = self.entries.first_entry() else {
            return Err(AppError::Consistency(format!(
                "no job pending, cannot complete {job_id}"
            )));
        };
        if head.get().job.id != job_id {
            return Err(AppError::Consistency(format!(
                "attempt to complete jobs out of order: given {job_id}, expected {}",
                head.get().job.id
            )));
        }
        Ok(head.remove())
    }

    /// Drop every pending entry, closing their slots.
    pub fn clear(&mut self) -> usize {
        let dropped = self.entries.len();
        self.entries.clear();
        dropped
    }

    /// Number of pending jobs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no job is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
