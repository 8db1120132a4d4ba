//! Human-facing job model exchanged over the polling protocol.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{AppError, Result};

/// Kind-specific payload of a job.
///
/// Serialised with a `type` discriminator so the polling client can
/// dispatch on it without guessing at field shapes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobKind {
    /// Show a message; the poller acknowledges it to advance the queue.
    Print {
        /// Text to display.
        message: String,
        /// Render the message as markdown.
        #[serde(default)]
        format_markdown: bool,
        /// Operator should confirm before moving on.
        #[serde(default)]
        wait_for_confirmation: bool,
    },
    /// Free-text answer.
    Answer {
        /// Question shown to the operator.
        prompt: String,
        /// Pre-filled answer.
        #[serde(default)]
        default: String,
        /// Allow multi-line input.
        #[serde(default)]
        multiline: bool,
    },
    /// Pick any subset of the choices.
    Checkboxes {
        /// Question shown to the operator.
        prompt: String,
        /// Available choices.
        choices: Vec<String>,
    },
    /// Pick exactly one of the choices.
    Select {
        /// Question shown to the operator.
        prompt: String,
        /// Available choices.
        choices: Vec<String>,
        /// Pre-selected choice.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        default: Option<String>,
    },
    /// Score the relevance of a context to a question in [0, 1].
    Score {
        /// Question being scored against.
        question: String,
        /// Context being scored.
        context: String,
        /// Suggested score.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        default: Option<f64>,
    },
}

impl JobKind {
    /// Wire name of the kind.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Print { .. } => "print",
            Self::Answer { .. } => "answer",
            Self::Checkboxes { .. } => "checkboxes",
            Self::Select { .. } => "select",
            Self::Score { .. } => "score",
        }
    }
}

/// A unit of work for the remote operator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Job {
    /// Globally unique identifier, fixed at creation.
    pub id: String,
    /// Kind-specific payload.
    #[serde(flatten)]
    pub kind: JobKind,
}

impl Job {
    /// Construct a job with a fresh identifier.
    #[must_use]
    pub fn new(kind: JobKind) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind,
        }
    }

    /// Convenience constructor for a print job.
    #[must_use]
    pub fn print(message: impl Into<String>, format_markdown: bool, wait_for_confirmation: bool) -> Self {
        Self::new(JobKind::Print {
            message: message.into(),
            format_markdown,
            wait_for_confirmation,
        })
    }

    /// Prompt text as it should be shown to the operator.
    #[must_use]
    pub fn display_prompt(&self) -> String {
        match &self.kind {
            JobKind::Print { message, .. } => message.clone(),
            JobKind::Answer { prompt, .. }
            | JobKind::Checkboxes { prompt, .. }
            | JobKind::Select { prompt, .. } => prompt.clone(),
            JobKind::Score {
                question, context, ..
            } => format!("Score the relevance of Context:\n{context}\n\nto Question: {question}"),
        }
    }
}

/// Operator answer delivered through `PUT complete-job`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum JobAnswer {
    /// Single text value (answers, selections, scores, acknowledgements).
    Text(String),
    /// Multiple values (checkbox selections).
    Choices(Vec<String>),
}

impl JobAnswer {
    /// Interpret the answer as free text.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` if a list was supplied.
    pub fn into_text(self) -> Result<String> {
        match self {
            Self::Text(text) => Ok(text),
            Self::Choices(_) => Err(AppError::BadRequest(
                "expected a text answer, got a list".into(),
            )),
        }
    }

    /// Interpret the answer as a set of selected choices.
    ///
    /// A single string is accepted as a one-element selection, or as a
    /// JSON-encoded list when it parses as one.
    #[must_use]
    pub fn into_choices(self) -> Vec<String> {
        match self {
            Self::Choices(choices) => choices,
            Self::Text(text) => serde_json::from_str::<Vec<String>>(&text)
                .unwrap_or_else(|_| if text.is_empty() { Vec::new() } else { vec![text] }),
        }
    }

    /// Interpret the answer as a relevance score in [0, 1].
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` if the value is not a number or
    /// falls outside the unit interval.
    pub fn into_score(self) -> Result<f64> {
        let text = self.into_text()?;
        let score: f64 = text
            .trim()
            .parse()
            .map_err(|_| AppError::BadRequest(format!("score is not a number: {text}")))?;
        if (0.0..=1.0).contains(&score) {
            Ok(score)
        } else {
            Err(AppError::BadRequest(format!(
                "score must be between 0 and 1, got {score}"
            )))
        }
    }
}

/// Body of `PUT /{session_id}/job/{job_id}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CompleteJobRequest {
    /// Operator answer.
    pub answer: JobAnswer,
}
