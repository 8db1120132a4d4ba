//! Who answers a recipe's questions.
//!
//! `Mode` is used as the `--mode` CLI flag value and decides which
//! [`Agent`](crate::agents::Agent) a recipe runs with and how many calls
//! it may have in flight.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::config::ConcurrencyConfig;

/// Agent selection for a recipe run.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Language model only. Default mode.
    #[default]
    Machine,
    /// Remote human operator only.
    Human,
    /// Model proposes, human confirms.
    Augmented,
    /// Deterministic canned answers.
    Test,
}

impl Mode {
    /// Wire name of the mode.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Machine => "machine",
            Self::Human => "human",
            Self::Augmented => "augmented",
            Self::Test => "test",
        }
    }

    /// Whether a human is in the loop.
    #[must_use]
    pub fn involves_human(self) -> bool {
        matches!(self, Self::Human | Self::Augmented)
    }

    /// Concurrency limit for mapping over inputs in this mode.
    #[must_use]
    pub fn max_concurrency(self, limits: &ConcurrencyConfig) -> usize {
        if self.involves_human() {
            limits.human_limit
        } else {
            limits.machine_limit
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
