//! Recipe driver for sessions created over HTTP.

use std::sync::Arc;

use serde_json::Value;
use tracing::info;

use super::{find_recipe, recipe_names, RecipeContext, RecipeInput};
use crate::agents::agent_policy;
use crate::bridge::Session;
use crate::environment::{Environment, WebEnvironment};
use crate::mode::Mode;
use crate::{GlobalConfig, Result};

/// Run one recipe for the operator polling `session`.
///
/// When `recipe` is `None` the operator picks one from a `select` job.
/// The question (and document, for recipes that need one) are asked with
/// `answer` jobs; the recipe then runs in `human` mode and its result is
/// printed back to the operator.
///
/// # Errors
///
/// Returns `AppError::NotFound` for an unknown recipe name,
/// `AppError::Cancelled` if the session is torn down mid-run, or the
/// recipe's own failure.
pub async fn run_web_session(
    session: Arc<Session>,
    config: Arc<GlobalConfig>,
    recipe: Option<String>,
) -> Result<()> {
    let env: Arc<dyn Environment> = Arc::new(WebEnvironment::new(Arc::clone(&session)));

    match drive(&session, &config, Arc::clone(&env), recipe).await {
        Ok(result) => {
            let rendered = serde_json::to_string_pretty(&result)?;
            env.print(&format!("```json\n{rendered}\n```"), true, true);
            Ok(())
        }
        Err(err) => {
            env.print(&format!("Recipe failed: {err}"), false, true);
            Err(err)
        }
    }
}

async fn drive(
    session: &Session,
    config: &GlobalConfig,
    env: Arc<dyn Environment>,
    recipe: Option<String>,
) -> Result<Value> {
    let recipe_name = match recipe {
        Some(name) => name,
        None => {
            let names = recipe_names();
            let default = names.first().map(String::as_str);
            env.select("Which recipe would you like to run?", &names, default)
                .await?
        }
    };
    let recipe = find_recipe(&recipe_name)?;
    info!(session_id = %session.id(), recipe = recipe.name(), "starting recipe");

    let question = env
        .answer("What question would you like to answer?", "", false)
        .await?;
    let document = if recipe.needs_document() {
        Some(
            env.answer(
                "Paste the document text, paragraphs separated by blank lines:",
                "",
                true,
            )
            .await?,
        )
    } else {
        None
    };

    let mode = Mode::Human;
    let ctx = RecipeContext {
        mode,
        agent: agent_policy(mode, Some(Arc::clone(&env)), None)?,
        env: Some(env),
        concurrency: mode.max_concurrency(&config.concurrency),
    };

    let input = RecipeInput {
        question: Some(question),
        document,
    };
    recipe.execute(&ctx, input).await
}
