//! Answer a question by first answering its subquestions.

use serde::Serialize;
use tracing::info;

use super::{Recipe, RecipeContext, RecipeFuture, RecipeInput};
use crate::agents::Agent;
use crate::concurrency::map_async;
use crate::Result;

const TEST_QUESTION: &str = "What is the effect of creatine on cognition?";

/// One answered subquestion.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SubAnswer {
    /// Subquestion text.
    pub question: String,
    /// Agent's answer to it.
    pub answer: String,
}

#[derive(Debug, Serialize)]
struct AmplifiedAnswer {
    question: String,
    subquestions: Vec<SubAnswer>,
    answer: String,
}

/// Decompose, answer the parts concurrently, then answer the whole.
#[derive(Debug, Clone, Copy, Default)]
pub struct AmplifiedQa;

fn subquestion_prompt(question: &str) -> String {
    format!(
        "Decompose the following question into 2-5 subquestions that would help you answer \
         the question. Make each question stand alone, so they can be answered without the \
         context of the original question.\n\n\
         Question: \"{question}\"\n\
         Subquestions:\n-"
    )
}

fn render_background(subs: &[SubAnswer]) -> String {
    if subs.is_empty() {
        return String::new();
    }
    let rendered: Vec<String> = subs
        .iter()
        .map(|sub| format!("Q: {}\nA: {}", sub.question, sub.answer))
        .collect();
    format!(
        "Here is relevant background information:\n\n{}\n\n",
        rendered.join("\n\n")
    )
}

fn qa_prompt(question: &str, subs: &[SubAnswer]) -> String {
    format!(
        "{}Answer the following question, using the background information above where \
         helpful:\n\nQuestion: \"{question}\"\nAnswer: \"",
        render_background(subs)
    )
}

/// Subquestions listed one per line, with or without leading dashes.
fn parse_subquestions(text: &str) -> Vec<String> {
    text.lines()
        .map(|line| line.trim_matches(|c: char| c == '-' || c.is_whitespace()))
        .filter(|line| !line.is_empty())
        .map(str::to_owned)
        .collect()
}

async fn answer(agent: &dyn Agent, question: &str, subs: &[SubAnswer]) -> Result<String> {
    let prompt = qa_prompt(question, subs);
    let raw = agent.answer(&prompt, "", false, Some(100)).await?;
    Ok(raw.trim_matches(|c: char| c == '"' || c == ' ').to_owned())
}

impl Recipe for AmplifiedQa {
    fn name(&self) -> &'static str {
        "AmplifiedQA"
    }

    fn execute<'a>(&'a self, ctx: &'a RecipeContext, input: RecipeInput) -> RecipeFuture<'a> {
        Box::pin(async move {
            let question = input.question_or(ctx.mode, TEST_QUESTION)?;
            let agent = ctx.agent.as_ref();

            let listed = agent
                .answer(&subquestion_prompt(&question), "", true, Some(100))
                .await?;
            let subquestions = parse_subquestions(&listed);
            info!(count = subquestions.len(), "answering subquestions");

            let answers = map_async(subquestions.iter().cloned(), ctx.concurrency, |sub| async move {
                answer(agent, &sub, &[]).await
            })
            .await?;
            let subs: Vec<SubAnswer> = subquestions
                .into_iter()
                .zip(answers)
                .map(|(question, answer)| SubAnswer { question, answer })
                .collect();

            let final_answer = answer(agent, &question, &subs).await?;
            Ok(serde_json::to_value(AmplifiedAnswer {
                question,
                subquestions: subs,
                answer: final_answer,
            })?)
        })
    }
}
