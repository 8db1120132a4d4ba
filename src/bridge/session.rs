//! One human-in-the-loop conversation and its job queue.
//!
//! The recipe side calls [`Session::enqueue`] and awaits the returned
//! [`JobTicket`]; the polling side calls [`Session::next_job`] and
//! [`Session::complete_job`]. Answers must arrive in the order the jobs
//! were enqueued.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::{oneshot, Notify};
use tracing::{debug, error, info};
use uuid::Uuid;

use super::queue::OrderedQueue;
use crate::models::{Job, JobAnswer};
use crate::{AppError, Result};

/// Awaitable handle for the answer to one enqueued job.
#[derive(Debug)]
pub struct JobTicket {
    job_id: String,
    rx: oneshot::Receiver<JobAnswer>,
}

impl JobTicket {
    /// Identifier of the job this ticket waits on.
    #[must_use]
    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// Suspend until the operator completes the job.
    ///
    /// There is no timeout at this layer.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Cancelled` if the session was torn down first.
    pub async fn wait(self) -> Result<JobAnswer> {
        self.rx.await.map_err(|_| {
            AppError::Cancelled(format!("job {} was dropped before completion", self.job_id))
        })
    }
}

/// A polling conversation owning exactly one ordered queue.
#[derive(Debug)]
pub struct Session {
    id: String,
    queue: Mutex<OrderedQueue>,
    job_added: Notify,
    job_removed: Notify,
}

impl Session {
    /// Create a session with a fresh identifier.
    #[must_use]
    pub fn new() -> Self {
        Self::with_id(Uuid::new_v4().to_string())
    }

    /// Create a session with an explicit identifier.
    #[must_use]
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            queue: Mutex::new(OrderedQueue::new()),
            job_added: Notify::new(),
            job_removed: Notify::new(),
        }
    }

    /// Session identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    fn queue(&self) -> MutexGuard<'_, OrderedQueue> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a job and return the ticket for its answer.
    pub fn enqueue(&self, job: Job) -> JobTicket {
        let (tx, rx) = oneshot::channel();
        let job_id = job.id.clone();
        let kind = job.kind.name();
        let queue_size = {
            let mut queue = self.queue();
            queue.push(job, tx);
            queue.len()
        };
        self.job_added.notify_waiters();
        info!(session_id = %self.id, job_id = %job_id, kind, queue_size, "job enqueued");
        JobTicket { job_id, rx }
    }

    /// Oldest unresolved job without removing it; suspends while empty.
    pub async fn first_job(&self) -> Job {
        loop {
            // Registered before the check so an enqueue in between is not missed.
            let added = self.job_added.notified();
            if let Some(job) = self.queue().head().cloned() {
                return job;
            }
            added.await;
        }
    }

    /// [`Session::first_job`] bounded by `wait`; `None` means no job yet.
    pub async fn next_job(&self, wait: Duration) -> Option<Job> {
        match tokio::time::timeout(wait, self.first_job()).await {
            Ok(job) => Some(job),
            Err(_elapsed) => {
                debug!(session_id = %self.id, "no job within poll window");
                None
            }
        }
    }

    /// Resolve the head job with `answer`, provided `job_id` names it.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Consistency` if `job_id` is not the head or the
    /// queue is empty. The queue is left unchanged in that case.
    pub fn complete_job(&self, job_id: &str, answer: JobAnswer) -> Result<()> {
        let popped = {
            let mut queue = self.queue();
            let queue_size = queue.len();
            let expected = queue.head().map(|job| job.id.clone());
            queue.pop_head(job_id).inspect_err(|_| {
                error!(
                    session_id = %self.id,
                    given_job = job_id,
                    expected_job = ?expected,
                    queue_size,
                    "attempt to complete jobs out of order"
                );
            })?
        };

        self.job_removed.notify_waiters();
        let kind = popped.job.kind.name();
        if popped.resolve(answer) {
            info!(session_id = %self.id, job_id, kind, "job completed");
        } else {
            debug!(session_id = %self.id, job_id, kind, "job completed with no waiting caller");
        }
        Ok(())
    }

    /// Number of jobs awaiting completion.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.queue().len()
    }

    /// Suspend until no job is pending.
    pub async fn drained(&self) {
        loop {
            let removed = self.job_removed.notified();
            if self.queue().is_empty() {
                return;
            }
            removed.await;
        }
    }

    /// Drop all pending jobs; their callers observe `Cancelled`.
    pub fn close(&self) -> usize {
        let dropped = self.queue().clear();
        self.job_removed.notify_waiters();
        if dropped > 0 {
            info!(session_id = %self.id, dropped, "session closed with pending jobs");
        }
        dropped
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
