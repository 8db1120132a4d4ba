//! Agent that forwards every question to the operator.

use std::sync::Arc;

use super::{Agent, AgentFuture, Classification, Prediction};
use crate::environment::Environment;

/// Delegates to an [`Environment`].
#[derive(Clone)]
pub struct HumanAgent {
    env: Arc<dyn Environment>,
}

impl HumanAgent {
    /// Ask questions through `env`.
    #[must_use]
    pub fn new(env: Arc<dyn Environment>) -> Self {
        Self { env }
    }
}

impl Agent for HumanAgent {
    fn answer<'a>(
        &'a self,
        prompt: &'a str,
        default: &'a str,
        multiline: bool,
        _max_tokens: Option<u32>,
    ) -> AgentFuture<'a, String> {
        self.env.answer(prompt, default, multiline)
    }

    fn relevance<'a>(
        &'a self,
        question: &'a str,
        context: &'a str,
        default: Option<f64>,
    ) -> AgentFuture<'a, f64> {
        self.env.score(question, context, default)
    }

    fn classify<'a>(
        &'a self,
        prompt: &'a str,
        choices: &'a [String],
        default: Option<&'a str>,
    ) -> AgentFuture<'a, Classification> {
        Box::pin(async move {
            let choice = self.env.select(prompt, choices, default).await?;
            Ok(Classification {
                choice,
                probability: 1.0,
            })
        })
    }

    fn predict<'a>(&'a self, context: &'a str, default: &'a str) -> AgentFuture<'a, Prediction> {
        Box::pin(async move {
            let completion = self.env.answer(context, default, false).await?;
            Ok(Prediction::from([(completion, 1.0)]))
        })
    }
}
