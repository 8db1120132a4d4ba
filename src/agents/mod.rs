//! Agents answer the questions recipes ask.
//!
//! The same recipe runs against a language model, a remote human, a
//! model-assisted human, or canned answers depending on [`Mode`].

pub mod augmented;
pub mod fake;
pub mod human;
pub mod openai;

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::apis::OpenAiClient;
use crate::environment::Environment;
use crate::mode::Mode;
use crate::{AppError, Result};

pub use augmented::AugmentedAgent;
pub use fake::FakeAgent;
pub use human::HumanAgent;
pub use openai::OpenAiAgent;

/// Boxed future returned by [`Agent`] operations.
pub type AgentFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Probability distribution over next tokens (or answers).
pub type Prediction = BTreeMap<String, f64>;

/// Outcome of a classification.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    /// Chosen label.
    pub choice: String,
    /// Relative probability of the chosen label.
    pub probability: f64,
}

/// Something that can answer, score, classify, and predict.
pub trait Agent: Send + Sync {
    /// Answer `prompt`. `default` pre-fills human input; `max_tokens`
    /// bounds model output.
    ///
    /// # Errors
    ///
    /// Propagates transport or bridge failures.
    fn answer<'a>(
        &'a self,
        prompt: &'a str,
        default: &'a str,
        multiline: bool,
        max_tokens: Option<u32>,
    ) -> AgentFuture<'a, String>;

    /// Relevance of `context` to `question` in `[0, 1]`.
    ///
    /// # Errors
    ///
    /// Propagates transport or bridge failures.
    fn relevance<'a>(
        &'a self,
        question: &'a str,
        context: &'a str,
        default: Option<f64>,
    ) -> AgentFuture<'a, f64>;

    /// Pick one of `choices` as the continuation of `prompt`.
    ///
    /// # Errors
    ///
    /// Propagates transport or bridge failures.
    fn classify<'a>(
        &'a self,
        prompt: &'a str,
        choices: &'a [String],
        default: Option<&'a str>,
    ) -> AgentFuture<'a, Classification>;

    /// Distribution over what follows `context`.
    ///
    /// # Errors
    ///
    /// Propagates transport or bridge failures.
    fn predict<'a>(&'a self, context: &'a str, default: &'a str) -> AgentFuture<'a, Prediction>;
}

/// Choose the agent for `mode`.
///
/// # Errors
///
/// Returns `AppError::Config` when the mode needs a collaborator that was
/// not supplied (an environment for human modes, a client for model modes).
pub fn agent_policy(
    mode: Mode,
    env: Option<Arc<dyn Environment>>,
    client: Option<OpenAiClient>,
) -> Result<Arc<dyn Agent>> {
    let human = || {
        env.clone()
            .map(|env| Arc::new(HumanAgent::new(env)) as Arc<dyn Agent>)
            .ok_or_else(|| AppError::Config(format!("{mode} mode needs a human environment")))
    };
    let machine = || {
        client
            .clone()
            .map(|client| Arc::new(OpenAiAgent::new(client)) as Arc<dyn Agent>)
            .ok_or_else(|| AppError::Config(format!("{mode} mode needs an openai client")))
    };

    match mode {
        Mode::Machine => machine(),
        Mode::Human => human(),
        Mode::Augmented => Ok(Arc::new(AugmentedAgent::new(human()?, machine()?))),
        Mode::Test => Ok(Arc::new(FakeAgent::new())),
    }
}
