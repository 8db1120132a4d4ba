//! Recipes: multi-step question answering built from agent calls.
//!
//! A recipe is handed a [`RecipeContext`] naming the agent and the
//! concurrency it may use, so the same code runs against a model, a human
//! operator, or canned answers.

pub mod amplified_qa;
pub mod rank_paragraphs;
pub mod web;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::agents::Agent;
use crate::environment::Environment;
use crate::mode::Mode;
use crate::{AppError, Result};

pub use amplified_qa::AmplifiedQa;
pub use rank_paragraphs::RankParagraphs;
pub use web::run_web_session;

/// Boxed future returned by [`Recipe::execute`].
pub type RecipeFuture<'a> = Pin<Box<dyn Future<Output = Result<Value>> + Send + 'a>>;

/// Everything a recipe run depends on.
#[derive(Clone)]
pub struct RecipeContext {
    /// Who answers.
    pub mode: Mode,
    /// Agent chosen for `mode`.
    pub agent: Arc<dyn Agent>,
    /// Operator surface, when a human is reachable.
    pub env: Option<Arc<dyn Environment>>,
    /// Maximum calls in flight when mapping over inputs.
    pub concurrency: usize,
}

/// Inputs a recipe may consume.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecipeInput {
    /// Question to answer.
    #[serde(default)]
    pub question: Option<String>,
    /// Source text, paragraphs separated by blank lines.
    #[serde(default)]
    pub document: Option<String>,
}

impl RecipeInput {
    /// The question, or `fallback` in `test` mode.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` if no question was given outside
    /// `test` mode.
    pub fn question_or(&self, mode: Mode, fallback: &str) -> Result<String> {
        match (&self.question, mode) {
            (_, Mode::Test) => Ok(fallback.to_owned()),
            (Some(question), _) if !question.trim().is_empty() => Ok(question.clone()),
            _ => Err(AppError::BadRequest("a question is required".into())),
        }
    }
}

/// A named, runnable recipe.
pub trait Recipe: Send + Sync {
    /// Display name, also used for lookup.
    fn name(&self) -> &'static str;

    /// Whether [`RecipeInput::document`] must be supplied.
    fn needs_document(&self) -> bool {
        false
    }

    /// Run the recipe and return its JSON-serialisable result.
    ///
    /// # Errors
    ///
    /// Propagates agent, transport, and input failures.
    fn execute<'a>(&'a self, ctx: &'a RecipeContext, input: RecipeInput) -> RecipeFuture<'a>;
}

/// Every registered recipe.
#[must_use]
pub fn all_recipes() -> Vec<Arc<dyn Recipe>> {
    vec![Arc::new(AmplifiedQa), Arc::new(RankParagraphs::default())]
}

/// Names of every registered recipe.
#[must_use]
pub fn recipe_names() -> Vec<String> {
    all_recipes()
        .iter()
        .map(|recipe| recipe.name().to_owned())
        .collect()
}

/// Look a recipe up by case-insensitive name prefix.
///
/// # Errors
///
/// Returns `AppError::NotFound` listing the known names when nothing
/// matches.
pub fn find_recipe(name: &str) -> Result<Arc<dyn Recipe>> {
    let wanted = name.trim().to_lowercase();
    if !wanted.is_empty() {
        if let Some(recipe) = all_recipes()
            .into_iter()
            .find(|recipe| recipe.name().to_lowercase().starts_with(&wanted))
        {
            return Ok(recipe);
        }
    }
    Err(AppError::NotFound(format!(
        "no recipe matches {name:?}; known recipes: {}",
        recipe_names().join(", ")
    )))
}

/// Split a document into trimmed, non-empty paragraphs.
#[must_use]
pub fn paragraphs(document: &str) -> Vec<String> {
    document
        .split("\n\n")
        .map(str::trim)
        .filter(|paragraph| !paragraph.is_empty())
        .map(str::to_owned)
        .collect()
}
