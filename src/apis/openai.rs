//! OpenAI completion transport.
//!
//! Every completion goes through the [`ResilientCache`]: identical requests
//! are served from disk, concurrent duplicates share one HTTP call, and
//! transient failures are retried with backoff. Models whose name contains
//! "alpha" must also pass a proactive token bucket.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::config::OpenAiConfig;
use crate::resilience::{CallArgs, RateLimiter, ResilientCache};
use crate::{AppError, Result};

/// Operation name completions are cached under.
pub const COMPLETE_OPERATION: &str = "openai.complete";

/// Parameters of one completion request.
///
/// `cache_id` is not sent; it only distinguishes otherwise identical
/// requests so repeated sampling is not collapsed by the cache.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompletionRequest {
    /// Prompt text.
    pub prompt: String,
    /// Stop sequence.
    pub stop: Option<String>,
    /// Nucleus sampling mass.
    pub top_p: f64,
    /// Sampling temperature.
    pub temperature: f64,
    /// Model identifier.
    pub model: String,
    /// Token budget of the completion.
    pub max_tokens: u32,
    /// Number of top log-probabilities to return per token.
    pub logprobs: Option<u32>,
    /// Number of completions.
    pub n: u32,
    /// Cache discriminator for repeated sampling.
    pub cache_id: u32,
}

impl CompletionRequest {
    /// Request with the default sampling parameters.
    #[must_use]
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            stop: Some("\n".into()),
            top_p: 1.0,
            temperature: 0.0,
            model: "text-davinci-002".into(),
            max_tokens: 256,
            logprobs: None,
            n: 1,
            cache_id: 0,
        }
    }

    fn body(&self) -> Result<Value> {
        let mut body = serde_json::to_value(self)?;
        if let Some(fields) = body.as_object_mut() {
            fields.remove("cache_id");
        }
        Ok(body)
    }
}

/// Token log-probabilities attached to a choice.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Logprobs {
    /// For each generated token, its most likely alternatives.
    #[serde(default)]
    pub top_logprobs: Vec<BTreeMap<String, f64>>,
}

/// One generated completion.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompletionChoice {
    /// Generated text.
    pub text: String,
    /// Log-probabilities, when requested.
    #[serde(default)]
    pub logprobs: Option<Logprobs>,
}

/// Completion endpoint response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompletionResponse {
    /// Generated completions.
    pub choices: Vec<CompletionChoice>,
}

impl CompletionResponse {
    /// Text of the first choice, trimmed.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Http` if the response has no choices.
    pub fn first_text(&self) -> Result<&str> {
        self.choices
            .first()
            .map(|choice| choice.text.trim())
            .ok_or_else(|| AppError::Http("no choices in completion response".into()))
    }
}

struct Transport {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    org_id: Option<String>,
    model: String,
    alpha_limiter: RateLimiter,
}

impl Transport {
    async fn post_once(&self, endpoint: &str, body: &Value) -> Result<Value> {
        let is_alpha = body
            .get("model")
            .and_then(Value::as_str)
            .is_some_and(|model| model.to_lowercase().contains("alpha"));
        if is_alpha {
            self.alpha_limiter.try_acquire()?;
        }

        let url = format!("{}/{}", self.base_url.trim_end_matches('/'), endpoint);
        let mut request = self.http.post(&url).bearer_auth(&self.api_key).json(body);
        if let Some(org_id) = &self.org_id {
            request = request.header("OpenAI-Organization", org_id);
        }

        let response = request.send().await?;
        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(AppError::RateLimited(format!("{endpoint} returned 429")));
        }
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(AppError::Remote(status.as_u16(), detail));
        }

        debug!(endpoint, status = status.as_u16(), "openai request succeeded");
        Ok(response.json().await?)
    }
}

/// Client for the OpenAI HTTP API.
#[derive(Clone)]
pub struct OpenAiClient {
    transport: Arc<Transport>,
    cache: ResilientCache,
}

impl OpenAiClient {
    /// Build a client from endpoint settings.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the API key is missing or the HTTP
    /// client cannot be built.
    pub fn new(config: &OpenAiConfig, cache: ResilientCache) -> Result<Self> {
        if config.api_key.is_empty() {
            return Err(AppError::Config("openai api key is not loaded".into()));
        }
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()
            .map_err(|err| AppError::Config(format!("failed to build http client: {err}")))?;

        Ok(Self {
            transport: Arc::new(Transport {
                http,
                base_url: config.base_url.clone(),
                api_key: config.api_key.clone(),
                org_id: config.org_id.clone(),
                model: config.model.clone(),
                alpha_limiter: RateLimiter::new(
                    "openai.alpha",
                    config.alpha_rate_capacity,
                    Duration::from_secs(config.alpha_rate_period_seconds),
                ),
            }),
            cache,
        })
    }

    /// Completion model agents built on this client should request.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.transport.model
    }

    /// POST `body` to `endpoint`, retrying transient failures. Not cached.
    ///
    /// # Errors
    ///
    /// Returns `AppError::RateLimited`, `AppError::Timeout` or
    /// `AppError::Remote` once retries are exhausted, or any
    /// non-retryable failure immediately.
    pub async fn post(&self, endpoint: &str, body: &Value) -> Result<Value> {
        let operation = format!("openai.post.{endpoint}");
        self.cache
            .retry_policy()
            .retry(&operation, || self.transport.post_once(endpoint, body))
            .await
    }

    /// Request a completion, served from the cache when possible.
    ///
    /// # Errors
    ///
    /// Same as [`OpenAiClient::post`], plus `AppError::Db` if the cache
    /// lookup fails.
    pub async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse> {
        let args = CallArgs::from_fields(request)?;
        let body = request.body()?;
        let transport = Arc::clone(&self.transport);

        self.cache
            .call(COMPLETE_OPERATION, &args, move || {
                let transport = Arc::clone(&transport);
                let body = body.clone();
                async move {
                    let value = transport.post_once("completions", &body).await?;
                    Ok::<CompletionResponse, AppError>(serde_json::from_value(value)?)
                }
            })
            .await
    }
}
