//! Model proposes, human decides.

use std::sync::Arc;

use super::{Agent, AgentFuture, Classification, Prediction};

/// Runs the machine agent first and offers its result to the human as
/// the default.
#[derive(Clone)]
pub struct AugmentedAgent {
    human: Arc<dyn Agent>,
    machine: Arc<dyn Agent>,
}

impl AugmentedAgent {
    /// Pair a human agent with a machine agent.
    #[must_use]
    pub fn new(human: Arc<dyn Agent>, machine: Arc<dyn Agent>) -> Self {
        Self { human, machine }
    }
}

impl Agent for AugmentedAgent {
    fn answer<'a>(
        &'a self,
        prompt: &'a str,
        default: &'a str,
        multiline: bool,
        max_tokens: Option<u32>,
    ) -> AgentFuture<'a, String> {
        Box::pin(async move {
            let proposal = self
                .machine
                .answer(prompt, default, multiline, max_tokens)
                .await?;
            self.human
                .answer(prompt, &proposal, multiline, max_tokens)
                .await
        })
    }

    fn relevance<'a>(
        &'a self,
        question: &'a str,
        context: &'a str,
        _default: Option<f64>,
    ) -> AgentFuture<'a, f64> {
        Box::pin(async move {
            let proposal = self.machine.relevance(question, context, None).await?;
            self.human.relevance(question, context, Some(proposal)).await
        })
    }

    fn classify<'a>(
        &'a self,
        prompt: &'a str,
        choices: &'a [String],
        default: Option<&'a str>,
    ) -> AgentFuture<'a, Classification> {
        Box::pin(async move {
            let proposal = self.machine.classify(prompt, choices, default).await?;
            self.human
                .classify(prompt, choices, Some(&proposal.choice))
                .await
        })
    }

    fn predict<'a>(&'a self, context: &'a str, _default: &'a str) -> AgentFuture<'a, Prediction> {
        Box::pin(async move {
            let proposal = self.machine.predict(context, "").await?;
            let most_likely = proposal
                .iter()
                .fold(None::<(&String, f64)>, |best, (token, &prob)| match best {
                    Some((_, best_prob)) if best_prob >= prob => best,
                    _ => Some((token, prob)),
                })
                .map(|(token, _)| token.clone())
                .unwrap_or_default();
            self.human.predict(context, &most_likely).await
        })
    }
}
