//! Domain model module declarations.

use serde::{Deserialize, Serialize};

pub mod job;

pub use job::{CompleteJobRequest, Job, JobAnswer, JobKind};

/// Response body for `POST /session`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionResponse {
    /// Identifier used to address the session in later calls.
    pub session_id: String,
}

/// Generic informational or error response body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessageResponse {
    /// Human-readable message.
    pub message: String,
}

impl MessageResponse {
    /// Build a message response.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
