//! Explicitly owned registry of live sessions.
//!
//! Each entry pairs a [`Session`] with the task running its recipe.
//! The registry is held by the serving component; there is no
//! process-wide session map. A session leaves the registry when it is
//! removed, on shutdown, or once its recipe has finished and the
//! operator has acknowledged every remaining job.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::task::JoinHandle;
use tracing::{error, info, info_span, Instrument};

use super::session::Session;
use crate::{AppError, Result};

/// Future driving one session's recipe to completion.
pub type LaunchFuture = Pin<Box<dyn Future<Output = Result<()>> + Send>>;

/// Starts the recipe bound to a freshly created session.
pub type SessionLauncher = Arc<dyn Fn(Arc<Session>) -> LaunchFuture + Send + Sync>;

struct SessionEntry {
    session: Arc<Session>,
    task: JoinHandle<()>,
}

type SessionMap = Arc<Mutex<HashMap<String, SessionEntry>>>;

fn lock(
    sessions: &Mutex<HashMap<String, SessionEntry>>,
) -> MutexGuard<'_, HashMap<String, SessionEntry>> {
    sessions.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Map of `session_id` to live session and its recipe task.
pub struct SessionRegistry {
    sessions: SessionMap,
    launcher: SessionLauncher,
}

impl SessionRegistry {
    /// Create an empty registry that starts sessions with `launcher`.
    #[must_use]
    pub fn new(launcher: SessionLauncher) -> Self {
        Self {
            sessions: Arc::new(Mutex::new(HashMap::new())),
            launcher,
        }
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<String, SessionEntry>> {
        lock(&self.sessions)
    }

    /// Create a session, start its recipe, and return its identifier.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn create(&self) -> String {
        let session = Arc::new(Session::new());
        let session_id = session.id().to_owned();
        let run = (self.launcher)(Arc::clone(&session));

        let span = info_span!("session", session_id = %session_id);
        let task_session = Arc::clone(&session);
        let sessions = Arc::clone(&self.sessions);

        // Held until the entry is in place so a recipe that finishes at
        // once cannot reap before it is registered.
        let mut live = self.sessions();
        let task = tokio::spawn(
            async move {
                let session_id = task_session.id().to_owned();
                match run.await {
                    Ok(()) => info!(session_id = %session_id, "recipe finished"),
                    Err(err) => error!(session_id = %session_id, %err, "recipe failed"),
                }
                task_session.drained().await;
                if lock(&sessions).remove(&session_id).is_some() {
                    info!(session_id = %session_id, "session reaped");
                }
            }
            .instrument(span),
        );
        live.insert(session_id.clone(), SessionEntry { session, task });
        drop(live);
        info!(session_id = %session_id, "session created");
        session_id
    }

    /// Look up a live session.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` for unknown identifiers.
    pub fn get(&self, session_id: &str) -> Result<Arc<Session>> {
        self.sessions()
            .get(session_id)
            .map(|entry| Arc::clone(&entry.session))
            .ok_or_else(|| AppError::NotFound("session not found".into()))
    }

    /// Tear a session down: stop its recipe and drop its pending jobs.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` for unknown identifiers.
    pub fn remove(&self, session_id: &str) -> Result<()> {
        let entry = self
            .sessions()
            .remove(session_id)
            .ok_or_else(|| AppError::NotFound("session not found".into()))?;
        entry.task.abort();
        entry.session.close();
        info!(session_id, "session removed");
        Ok(())
    }

    /// Number of live sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions().len()
    }

    /// Whether no session is live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions().is_empty()
    }

    /// Stop every session. Used on server shutdown.
    pub fn shutdown(&self) {
        let drained: Vec<(String, SessionEntry)> = self.sessions().drain().collect();
        for (session_id, entry) in &drained {
            entry.task.abort();
            entry.session.close();
            info!(session_id = %session_id, "session stopped for shutdown");
        }
    }
}
