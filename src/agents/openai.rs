//! Agent backed by the OpenAI completion endpoint.

use tracing::warn;

use super::{Agent, AgentFuture, Classification, Prediction};
use crate::apis::openai::{CompletionRequest, CompletionResponse, OpenAiClient};
use crate::{AppError, Result};

const RELEVANCE_CHOICES: [&str; 2] = [" Yes", " No"];

/// Answers with a completion model.
#[derive(Clone)]
pub struct OpenAiAgent {
    client: OpenAiClient,
    model: String,
}

impl OpenAiAgent {
    /// Agent using the client's configured model with greedy sampling.
    #[must_use]
    pub fn new(client: OpenAiClient) -> Self {
        let model = client.model().to_owned();
        Self { client, model }
    }

    fn request(&self, prompt: &str) -> CompletionRequest {
        CompletionRequest {
            model: self.model.clone(),
            n: 1,
            ..CompletionRequest::new(prompt)
        }
    }
}

impl Agent for OpenAiAgent {
    fn answer<'a>(
        &'a self,
        prompt: &'a str,
        _default: &'a str,
        multiline: bool,
        max_tokens: Option<u32>,
    ) -> AgentFuture<'a, String> {
        Box::pin(async move {
            let mut request = self.request(prompt);
            request.stop = if multiline { None } else { Some("\n".into()) };
            if let Some(max_tokens) = max_tokens {
                request.max_tokens = max_tokens;
            }
            let response = self.client.complete(&request).await?;
            Ok(response.first_text()?.to_owned())
        })
    }

    fn relevance<'a>(
        &'a self,
        question: &'a str,
        context: &'a str,
        _default: Option<f64>,
    ) -> AgentFuture<'a, f64> {
        Box::pin(async move {
            let prompt = format!(
                "{context}\n\nQuestion: {question}\n\n\
                 Is the text above relevant to the question? Answer Yes or No.\n\nAnswer:"
            );
            let choices: Vec<String> = RELEVANCE_CHOICES.iter().map(|&c| c.to_owned()).collect();
            let classification = self.classify(&prompt, &choices, None).await?;
            Ok(if classification.choice == RELEVANCE_CHOICES[0] {
                classification.probability
            } else {
                1.0 - classification.probability
            })
        })
    }

    fn classify<'a>(
        &'a self,
        prompt: &'a str,
        choices: &'a [String],
        _default: Option<&'a str>,
    ) -> AgentFuture<'a, Classification> {
        Box::pin(async move {
            let prefix = longest_common_prefix(choices).trim_end().to_owned();
            let mut context = format!("{prompt}{prefix}");
            let default = if context.ends_with(' ') {
                context.pop();
                " "
            } else {
                ""
            };

            let prediction = self.predict(&context, default).await?;
            relative_choice(choices, &prefix, &prediction)
        })
    }

    fn predict<'a>(&'a self, context: &'a str, _default: &'a str) -> AgentFuture<'a, Prediction> {
        Box::pin(async move {
            let mut request = self.request(context);
            request.logprobs = Some(5);
            request.max_tokens = 1;
            let response = self.client.complete(&request).await?;
            extract_prediction(&response)
        })
    }
}

fn extract_prediction(response: &CompletionResponse) -> Result<Prediction> {
    let top = response
        .choices
        .first()
        .and_then(|choice| choice.logprobs.as_ref())
        .and_then(|logprobs| logprobs.top_logprobs.first())
        .ok_or_else(|| AppError::Http("completion response carries no logprobs".into()))?;
    Ok(top
        .iter()
        .map(|(token, logprob)| (token.clone(), logprob.exp()))
        .collect())
}

fn longest_common_prefix(choices: &[String]) -> &str {
    let Some(first) = choices.first() else {
        return "";
    };
    let mut end = first.len();
    for other in &choices[1..] {
        end = first
            .char_indices()
            .zip(other.chars())
            .take_while(|((_, a), b)| a == b)
            .last()
            .map_or(0, |((idx, ch), _)| idx + ch.len_utf8())
            .min(end);
    }
    &first[..end]
}

/// Renormalise `prediction` over `choices` and pick the most likely one.
fn relative_choice(
    choices: &[String],
    prefix: &str,
    prediction: &Prediction,
) -> Result<Classification> {
    let absolute: Vec<f64> = choices
        .iter()
        .map(|choice| {
            let rest = choice.get(prefix.len()..).unwrap_or_default();
            prediction
                .iter()
                .filter(|(token, _)| !token.is_empty() && rest.starts_with(token.as_str()))
                .map(|(_, prob)| prob)
                .sum()
        })
        .collect();

    let total: f64 = absolute.iter().sum();
    if total < 0.8 {
        warn!(
            unaccounted = 1.0 - total,
            prefix,
            ?prediction,
            "unaccounted probability in classify"
        );
    }
    if total <= 0.0 {
        return Err(AppError::Recipe(
            "model assigned no probability to any choice".into(),
        ));
    }

    let (best, best_prob) = absolute
        .iter()
        .enumerate()
        .fold((0, f64::MIN), |(best, best_prob), (idx, &prob)| {
            if prob > best_prob {
                (idx, prob)
            } else {
                (best, best_prob)
            }
        });

    Ok(Classification {
        choice: choices[best].clone(),
        probability: best_prob / total,
    })
}
