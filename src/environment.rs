//! Human-facing primitives recipes use to ask the operator something.
//!
//! [`WebEnvironment`] turns each primitive into a [`Job`] on a bridge
//! [`Session`] and suspends until the polling client answers it.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tracing::{debug, info};

use crate::bridge::Session;
use crate::models::{Job, JobKind};
use crate::Result;

/// Boxed future returned by [`Environment`] primitives.
pub type EnvFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Operator-facing interaction surface.
pub trait Environment: Send + Sync {
    /// Show a message. Does not wait for the operator.
    fn print(&self, message: &str, format_markdown: bool, wait_for_confirmation: bool);

    /// Ask for free text.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Cancelled`](crate::AppError::Cancelled) if the
    /// session is torn down before the operator answers.
    fn answer<'a>(&'a self, prompt: &'a str, default: &'a str, multiline: bool)
        -> EnvFuture<'a, String>;

    /// Ask the operator to pick any subset of `choices`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Cancelled`](crate::AppError::Cancelled) if the
    /// session is torn down before the operator answers.
    fn checkboxes<'a>(&'a self, prompt: &'a str, choices: &'a [String])
        -> EnvFuture<'a, Vec<String>>;

    /// Ask the operator to pick exactly one of `choices`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Cancelled`](crate::AppError::Cancelled) if the
    /// session is torn down before the operator answers.
    fn select<'a>(
        &'a self,
        prompt: &'a str,
        choices: &'a [String],
        default: Option<&'a str>,
    ) -> EnvFuture<'a, String>;

    /// Ask for the relevance of `context` to `question` in `[0, 1]`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::BadRequest`](crate::AppError::BadRequest) for a
    /// non-numeric or out-of-range score, or
    /// [`AppError::Cancelled`](crate::AppError::Cancelled) on teardown.
    fn score<'a>(
        &'a self,
        question: &'a str,
        context: &'a str,
        default: Option<f64>,
    ) -> EnvFuture<'a, f64>;
}

/// [`Environment`] backed by one bridge session.
#[derive(Debug, Clone)]
pub struct WebEnvironment {
    session: Arc<Session>,
}

impl WebEnvironment {
    /// Bind to `session`.
    #[must_use]
    pub fn new(session: Arc<Session>) -> Self {
        Self { session }
    }
}

impl Environment for WebEnvironment {
    fn print(&self, message: &str, format_markdown: bool, wait_for_confirmation: bool) {
        info!(
            session_id = %self.session.id(),
            format_markdown,
            wait_for_confirmation,
            "request print"
        );
        // Nobody awaits the ticket; the poller still acknowledges the job.
        drop(self.session.enqueue(Job::print(
            message,
            format_markdown,
            wait_for_confirmation,
        )));
    }

    fn answer<'a>(
        &'a self,
        prompt: &'a str,
        default: &'a str,
        multiline: bool,
    ) -> EnvFuture<'a, String> {
        Box::pin(async move {
            info!(session_id = %self.session.id(), multiline, "request answer");
            debug!(prompt, "answer prompt");
            let ticket = self.session.enqueue(Job::new(JobKind::Answer {
                prompt: prompt.to_owned(),
                default: default.to_owned(),
                multiline,
            }));
            let answer = ticket.wait().await?.into_text()?;
            info!(session_id = %self.session.id(), answer = %answer, "answer provided");
            Ok(answer)
        })
    }

    fn checkboxes<'a>(
        &'a self,
        prompt: &'a str,
        choices: &'a [String],
    ) -> EnvFuture<'a, Vec<String>> {
        Box::pin(async move {
            info!(session_id = %self.session.id(), ?choices, "request checkboxes");
            let ticket = self.session.enqueue(Job::new(JobKind::Checkboxes {
                prompt: prompt.to_owned(),
                choices: choices.to_vec(),
            }));
            let selection = ticket.wait().await?.into_choices();
            info!(session_id = %self.session.id(), ?selection, "checkboxes selected");
            Ok(selection)
        })
    }

    fn select<'a>(
        &'a self,
        prompt: &'a str,
        choices: &'a [String],
        default: Option<&'a str>,
    ) -> EnvFuture<'a, String> {
        Box::pin(async move {
            info!(session_id = %self.session.id(), ?choices, "request select");
            let ticket = self.session.enqueue(Job::new(JobKind::Select {
                prompt: prompt.to_owned(),
                choices: choices.to_vec(),
                default: default.map(str::to_owned),
            }));
            let raw = ticket.wait().await?.into_text()?;
            let selection = decode_selection(raw);
            info!(session_id = %self.session.id(), selection = %selection, "select returned");
            Ok(selection)
        })
    }

    fn score<'a>(
        &'a self,
        question: &'a str,
        context: &'a str,
        default: Option<f64>,
    ) -> EnvFuture<'a, f64> {
        Box::pin(async move {
            info!(session_id = %self.session.id(), ?default, "request score");
            let ticket = self.session.enqueue(Job::new(JobKind::Score {
                question: question.to_owned(),
                context: context.to_owned(),
                default,
            }));
            let score = ticket.wait().await?.into_score()?;
            info!(session_id = %self.session.id(), score, "score provided");
            Ok(score)
        })
    }
}

// Some clients send the choice JSON-encoded ("\"choice\"").
fn decode_selection(raw: String) -> String {
    serde_json::from_str::<String>(&raw).unwrap_or(raw)
}
