//! Rank a document's paragraphs by how well they answer a question.

use std::cmp::Ordering;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

use serde_json::Value;
use tracing::{debug, info, warn};

use super::{paragraphs, Recipe, RecipeContext, RecipeFuture, RecipeInput};
use crate::concurrency::{estimated_comparisons, nsmallest_async};
use crate::AppError;

const TEST_QUESTION: &str = "What are the interventions?";

/// Top-`n` paragraphs by pairwise agent judgement.
#[derive(Debug, Clone, Copy)]
pub struct RankParagraphs {
    /// How many paragraphs to return.
    pub n: i64,
}

impl Default for RankParagraphs {
    fn default() -> Self {
        Self { n: 5 }
    }
}

fn compare_prompt(a: &str, b: &str, question: &str) -> String {
    format!(
        "Which of paragraphs A and B better answers the question \"{question}\"?\n\n\
         Paragraph A: {a}\n\n\
         Paragraph B: {b}\n\n\
         Question: Which of paragraphs A and B better answers the question '{question}'? \
         Answer with \"Paragraph A\" or \"Paragraph B\".\n\n\
         Answer: Paragraph"
    )
}

/// Map the agent's reply to an ordering; A first means A ranks higher.
fn parse_preference(answer: &str) -> Ordering {
    match answer.trim() {
        "A" => Ordering::Less,
        "B" => Ordering::Greater,
        other => {
            warn!(answer = other, "unrecognized comparison answer");
            Ordering::Equal
        }
    }
}

impl Recipe for RankParagraphs {
    fn name(&self) -> &'static str {
        "RankParagraphs"
    }

    fn needs_document(&self) -> bool {
        true
    }

    fn execute<'a>(&'a self, ctx: &'a RecipeContext, input: RecipeInput) -> RecipeFuture<'a> {
        Box::pin(async move {
            let question = input.question_or(ctx.mode, TEST_QUESTION)?;
            let document = input
                .document
                .ok_or_else(|| AppError::BadRequest("RankParagraphs needs a document".into()))?;
            let paragraphs = paragraphs(&document);

            let estimated = estimated_comparisons(paragraphs.len(), self.n);
            info!(paragraphs = paragraphs.len(), n = self.n, estimated, "ranking paragraphs");

            let agent = &ctx.agent;
            let question = question.as_str();
            let done = AtomicUsize::new(0);
            let done = &done;
            let ranked = nsmallest_async(self.n, &paragraphs, move |a: String, b: String| async move {
                let prompt = compare_prompt(&a, &b, question);
                let answer = agent.answer(&prompt, "", false, Some(1)).await?;
                let completed = done.fetch_add(1, AtomicOrdering::Relaxed) + 1;
                debug!(completed, estimated, "comparison finished");
                Ok(parse_preference(&answer))
            })
            .await?;

            Ok(Value::from(ranked))
        })
    }
}
