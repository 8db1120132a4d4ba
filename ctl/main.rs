#![forbid(unsafe_code)]

//! `recipe-harness-ctl`: terminal client for remote operators.
//!
//! Creates (or attaches to) a session on a `recipe-harness` server, then
//! polls for jobs, renders each on the terminal, reads the operator's
//! answer from stdin, and completes the job.

use std::io::Write;
use std::sync::LazyLock;

use clap::{Parser, Subcommand};
use regex::Regex;
use reqwest::StatusCode;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

use recipe_harness::models::{CompleteJobRequest, Job, JobAnswer, JobKind, SessionResponse};
use recipe_harness::{AppError, Result};

/// A relevance score: 0, 1, or a decimal between them.
static SCORE_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^(0(\.\d+)?|1(\.0+)?)$").ok());

#[derive(Debug, Parser)]
#[command(
    name = "recipe-harness-ctl",
    about = "Operator client for recipe-harness",
    version,
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Answer jobs for a session until stdin closes or the session ends.
    Poll {
        /// Server base URL.
        #[arg(long, default_value = "http://127.0.0.1:8935")]
        url: String,

        /// Attach to an existing session instead of creating one.
        #[arg(long)]
        session: Option<String>,
    },

    /// Tear a session down.
    Close {
        /// Server base URL.
        #[arg(long, default_value = "http://127.0.0.1:8935")]
        url: String,

        /// Session to delete.
        session: String,
    },
}

type Input = Lines<BufReader<Stdin>>;

fn main() {
    let args = Cli::parse();

    let outcome = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))
        .and_then(|runtime| runtime.block_on(run(args)));

    if let Err(err) = outcome {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}

async fn run(args: Cli) -> Result<()> {
    let http = reqwest::Client::new();
    match args.command {
        Command::Poll { url, session } => poll(&http, url.trim_end_matches('/'), session).await,
        Command::Close { url, session } => {
            let response = http
                .delete(format!("{}/{session}", url.trim_end_matches('/')))
                .send()
                .await?;
            if response.status() == StatusCode::NOT_FOUND {
                return Err(AppError::NotFound(format!("session {session} not found")));
            }
            response.error_for_status()?;
            println!("Session {session} closed.");
            Ok(())
        }
    }
}

async fn poll(http: &reqwest::Client, base: &str, session: Option<String>) -> Result<()> {
    let session_id = match session {
        Some(id) => id,
        None => {
            let created: SessionResponse = http
                .post(format!("{base}/session"))
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;
            created.session_id
        }
    };
    println!("Session {session_id}");

    let mut input = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let response = http.get(format!("{base}/{session_id}/job")).send().await?;
        match response.status() {
            StatusCode::NO_CONTENT => continue,
            StatusCode::NOT_FOUND => {
                println!("Session {session_id} has ended.");
                return Ok(());
            }
            _ => {}
        }
        let job: Job = response.error_for_status()?.json().await?;

        let Some(answer) = ask(&job, &mut input).await? else {
            println!("Input closed; leaving session {session_id} running.");
            return Ok(());
        };

        http.put(format!("{base}/{session_id}/job/{}", job.id))
            .json(&CompleteJobRequest { answer })
            .send()
            .await?
            .error_for_status()?;
    }
}

async fn read_line(prompt: &str, input: &mut Input) -> Result<Option<String>> {
    print!("{prompt}");
    std::io::stdout().flush()?;
    Ok(input.next_line().await?)
}

/// Collect lines until a lone `.` or end of input.
async fn read_block(input: &mut Input) -> Result<Option<String>> {
    println!("(finish with a line containing only '.')");
    let mut lines = Vec::new();
    while let Some(line) = input.next_line().await? {
        if line.trim() == "." {
            return Ok(Some(lines.join("\n")));
        }
        lines.push(line);
    }
    Ok((!lines.is_empty()).then(|| lines.join("\n")))
}

fn print_choices(choices: &[String]) {
    for (idx, choice) in choices.iter().enumerate() {
        println!("  {}) {choice}", idx + 1);
    }
}

/// Resolve a 1-based index or literal choice text.
fn pick<'a>(raw: &str, choices: &'a [String]) -> Option<&'a String> {
    let raw = raw.trim();
    raw.parse::<usize>()
        .ok()
        .and_then(|n| n.checked_sub(1))
        .and_then(|idx| choices.get(idx))
        .or_else(|| choices.iter().find(|choice| choice.as_str() == raw))
}

fn valid_score(raw: &str) -> bool {
    SCORE_PATTERN
        .as_ref()
        .is_some_and(|pattern| pattern.is_match(raw))
}

async fn ask(job: &Job, input: &mut Input) -> Result<Option<JobAnswer>> {
    match &job.kind {
        JobKind::Print {
            message,
            wait_for_confirmation,
            ..
        } => {
            println!("\n{message}\n");
            if *wait_for_confirmation && read_line("[enter to continue] ", input).await?.is_none() {
                return Ok(None);
            }
            Ok(Some(JobAnswer::Text(String::new())))
        }
        JobKind::Answer {
            prompt,
            default,
            multiline,
        } => {
            println!("\n{prompt}");
            let raw = if *multiline {
                read_block(input).await?
            } else {
                let hint = if default.is_empty() {
                    "> ".to_owned()
                } else {
                    format!("[{default}] > ")
                };
                read_line(&hint, input).await?
            };
            Ok(raw.map(|text| {
                if text.trim().is_empty() {
                    JobAnswer::Text(default.clone())
                } else {
                    JobAnswer::Text(text)
                }
            }))
        }
        JobKind::Checkboxes { prompt, choices } => {
            println!("\n{prompt}");
            print_choices(choices);
            let Some(raw) = read_line("numbers, comma separated > ", input).await? else {
                return Ok(None);
            };
            let selected = raw
                .split(',')
                .filter_map(|part| pick(part, choices))
                .cloned()
                .collect();
            Ok(Some(JobAnswer::Choices(selected)))
        }
        JobKind::Select {
            prompt,
            choices,
            default,
        } => {
            println!("\n{prompt}");
            print_choices(choices);
            loop {
                let Some(raw) = read_line("> ", input).await? else {
                    return Ok(None);
                };
                if raw.trim().is_empty() {
                    if let Some(default) = default {
                        return Ok(Some(JobAnswer::Text(default.clone())));
                    }
                }
                if let Some(choice) = pick(&raw, choices) {
                    return Ok(Some(JobAnswer::Text(choice.clone())));
                }
                println!("Please pick one of the listed choices.");
            }
        }
        JobKind::Score { default, .. } => {
            println!("\n{}", job.display_prompt());
            let hint = default.map_or_else(|| "> ".to_owned(), |score| format!("[{score}] > "));
            loop {
                let Some(raw) = read_line(&hint, input).await? else {
                    return Ok(None);
                };
                let raw = raw.trim();
                if raw.is_empty() {
                    if let Some(score) = default {
                        return Ok(Some(JobAnswer::Text(score.to_string())));
                    }
                }
                if valid_score(raw) {
                    return Ok(Some(JobAnswer::Text(raw.to_owned())));
                }
                println!("Please enter a number between 0 and 1");
            }
        }
    }
}
