//! Remote model APIs.

pub mod openai;

pub use openai::{CompletionRequest, CompletionResponse, OpenAiClient};
