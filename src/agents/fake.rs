//! Deterministic stand-in agent for `test` mode.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use super::{Agent, AgentFuture, Classification, Prediction};

const WORDS: [&str; 16] = [
    "paper", "study", "effect", "result", "sample", "control", "trial", "measure", "dose",
    "group", "outcome", "method", "review", "signal", "cohort", "baseline",
];

struct FakeState {
    rng: StdRng,
    script: VecDeque<String>,
}

/// Seeded pseudo-random agent, optionally replaying scripted answers first.
pub struct FakeAgent {
    state: Mutex<FakeState>,
}

impl FakeAgent {
    /// Agent seeded with zero and no script.
    #[must_use]
    pub fn new() -> Self {
        Self::scripted(Vec::<String>::new())
    }

    /// Agent that answers `answer` and `classify` calls from `script`, in
    /// order, before falling back to generated text.
    #[must_use]
    pub fn scripted<I, S>(script: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            state: Mutex::new(FakeState {
                rng: StdRng::seed_from_u64(0),
                script: script.into_iter().map(Into::into).collect(),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn sentence(rng: &mut StdRng) -> String {
        let len = rng.gen_range(3..8);
        let words: Vec<&str> = (0..len)
            .filter_map(|_| WORDS.choose(rng).copied())
            .collect();
        let mut sentence = words.join(" ");
        if let Some(first) = sentence.get_mut(0..1) {
            first.make_ascii_uppercase();
        }
        sentence.push('.');
        sentence
    }
}

impl Default for FakeAgent {
    fn default() -> Self {
        Self::new()
    }
}

impl Agent for FakeAgent {
    fn answer<'a>(
        &'a self,
        _prompt: &'a str,
        _default: &'a str,
        _multiline: bool,
        _max_tokens: Option<u32>,
    ) -> AgentFuture<'a, String> {
        let mut state = self.state();
        let answer = match state.script.pop_front() {
            Some(scripted) => scripted,
            None => Self::sentence(&mut state.rng),
        };
        Box::pin(async move { Ok(answer) })
    }

    fn relevance<'a>(
        &'a self,
        _question: &'a str,
        _context: &'a str,
        _default: Option<f64>,
    ) -> AgentFuture<'a, f64> {
        let score: f64 = self.state().rng.gen();
        Box::pin(async move { Ok(score) })
    }

    fn classify<'a>(
        &'a self,
        _prompt: &'a str,
        choices: &'a [String],
        _default: Option<&'a str>,
    ) -> AgentFuture<'a, Classification> {
        let mut state = self.state();
        let scripted = state
            .script
            .front()
            .filter(|answer| choices.contains(answer))
            .cloned();
        let choice = match scripted {
            Some(choice) => {
                state.script.pop_front();
                choice
            }
            None => choices.choose(&mut state.rng).cloned().unwrap_or_default(),
        };
        let probability: f64 = state.rng.gen();
        Box::pin(async move {
            Ok(Classification {
                choice,
                probability,
            })
        })
    }

    fn predict<'a>(&'a self, _context: &'a str, default: &'a str) -> AgentFuture<'a, Prediction> {
        let mut state = self.state();
        let mut prediction = Prediction::new();
        if !default.is_empty() {
            let prob = state.rng.gen();
            prediction.insert(default.to_owned(), prob);
        }
        let count = state.rng.gen_range(1..=5);
        for _ in 0..count {
            if let Some(word) = WORDS.choose(&mut state.rng) {
                let prob = state.rng.gen();
                prediction.insert((*word).to_owned(), prob);
            }
        }
        Box::pin(async move { Ok(prediction) })
    }
}
