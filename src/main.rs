#![forbid(unsafe_code)]

//! `recipe-harness` server binary.
//!
//! `serve` exposes the human-in-the-loop polling surface over HTTP and
//! starts a recipe for every session an operator creates. `run` executes
//! one recipe locally against the model (or canned answers) and prints
//! the JSON result.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use recipe_harness::agents::agent_policy;
use recipe_harness::apis::OpenAiClient;
use recipe_harness::bridge::{LaunchFuture, Session, SessionLauncher, SessionRegistry};
use recipe_harness::config::GlobalConfig;
use recipe_harness::mode::Mode;
use recipe_harness::persistence::{db, spawn_eviction_task, CacheStore};
use recipe_harness::recipes::{find_recipe, run_web_session, RecipeContext, RecipeInput};
use recipe_harness::resilience::ResilientCache;
use recipe_harness::web::{self, AppState};
use recipe_harness::{AppError, Result};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "recipe-harness", about = "Recipe orchestration server", version, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, global = true, default_value = "config.toml")]
    config: PathBuf,

    /// Log output format (text or json).
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Serve the HTTP polling surface for remote operators.
    Serve,

    /// Run one recipe locally and print its result as JSON.
    Run {
        /// Recipe name (case-insensitive prefix).
        #[arg(long)]
        recipe: String,

        /// Who answers: `machine` or `test`.
        #[arg(long, value_enum, default_value_t = Mode::Machine)]
        mode: Mode,

        /// Question to answer.
        #[arg(long)]
        question: Option<String>,

        /// File holding the document, paragraphs separated by blank lines.
        #[arg(long)]
        input: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format)?;
    info!("recipe-harness bootstrap");

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(run(args))
}

async fn run(args: Cli) -> Result<()> {
    let config = GlobalConfig::load_from_path(&args.config)?;
    match args.command {
        Command::Serve => serve(config).await,
        Command::Run {
            recipe,
            mode,
            question,
            input,
        } => run_local(config, &recipe, mode, question, input).await,
    }
}

async fn open_cache(config: &GlobalConfig) -> Result<ResilientCache> {
    let pool = Arc::new(db::connect(&config.cache_path).await?);
    info!(path = %config.cache_path.display(), "cache database connected");
    Ok(ResilientCache::new(CacheStore::new(pool), config.retry.policy()))
}

async fn serve(config: GlobalConfig) -> Result<()> {
    let cache = open_cache(&config).await?;
    let config = Arc::new(config);

    // ── Start cache eviction ────────────────────────────
    let ct = CancellationToken::new();
    let eviction_handle = spawn_eviction_task(
        cache.store().clone(),
        config.cache.eviction_policy(),
        std::time::Duration::from_secs(config.cache.prune_interval_seconds),
        ct.clone(),
    );

    // ── Build shared application state ──────────────────
    let launcher: SessionLauncher = {
        let config = Arc::clone(&config);
        Arc::new(move |session: Arc<Session>| -> LaunchFuture {
            let recipe = config.recipe.clone();
            Box::pin(run_web_session(session, Arc::clone(&config), recipe))
        })
    };
    let state = Arc::new(AppState {
        config: Arc::clone(&config),
        registry: Arc::new(SessionRegistry::new(launcher)),
    });

    // ── Start transport ─────────────────────────────────
    let http_ct = ct.clone();
    let http_handle = tokio::spawn(async move {
        if let Err(err) = web::serve_http(state, http_ct).await {
            error!(%err, "http transport failed");
        }
    });

    info!(port = config.http_port, "recipe-harness ready");

    // ── Wait for shutdown signal ────────────────────────
    shutdown_signal().await;
    info!("shutdown signal received");
    ct.cancel();

    if let Err(err) = http_handle.await {
        error!(%err, "http task panicked");
    }
    if let Some(handle) = eviction_handle {
        if let Err(err) = handle.await {
            error!(%err, "eviction task panicked");
        }
    }
    info!("recipe-harness shut down");
    Ok(())
}

async fn run_local(
    mut config: GlobalConfig,
    recipe_name: &str,
    mode: Mode,
    question: Option<String>,
    input: Option<PathBuf>,
) -> Result<()> {
    if mode.involves_human() {
        return Err(AppError::Config(format!(
            "{mode} mode needs an operator; use `serve` instead"
        )));
    }
    let recipe = find_recipe(recipe_name)?;

    let client = if mode == Mode::Machine {
        config.load_credentials().await?;
        let cache = open_cache(&config).await?;
        Some(OpenAiClient::new(&config.openai, cache)?)
    } else {
        None
    };

    let document = match input {
        Some(path) => Some(tokio::fs::read_to_string(&path).await.map_err(|err| {
            AppError::Io(format!("cannot read {}: {err}", path.display()))
        })?),
        None => None,
    };

    let ctx = RecipeContext {
        mode,
        agent: agent_policy(mode, None, client)?,
        env: None,
        concurrency: mode.max_concurrency(&config.concurrency),
    };
    info!(recipe = recipe.name(), %mode, "running recipe");
    let result = recipe
        .execute(&ctx, RecipeInput { question, document })
        .await?;

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(err) => {
                tracing::warn!(%err, "failed to register SIGTERM handler, using ctrl-c only");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = ctrl_c.await {
            tracing::error!(%err, "ctrl-c signal handler failed");
        }
    }
}

fn init_tracing(log_format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(env_filter).with_writer(std::io::stderr);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
