//! Integration tests for the OpenAI transport against a local mock
//! completions endpoint.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use recipe_harness::agents::{Agent, OpenAiAgent};
use recipe_harness::apis::openai::{CompletionRequest, OpenAiClient};
use recipe_harness::config::OpenAiConfig;
use recipe_harness::persistence::{db, CacheStore};
use recipe_harness::resilience::{ResilientCache, RetryPolicy};
use recipe_harness::AppError;
use serde_json::{json, Value};

#[derive(Default)]
struct MockOpenAi {
    hits: AtomicUsize,
    failures: Mutex<VecDeque<StatusCode>>,
    bodies: Mutex<Vec<Value>>,
}

async fn completions(State(mock): State<Arc<MockOpenAi>>, Json(body): Json<Value>) -> Response {
    mock.hits.fetch_add(1, Ordering::SeqCst);
    mock.bodies.lock().unwrap().push(body.clone());

    if let Some(status) = mock.failures.lock().unwrap().pop_front() {
        return (status, Json(json!({"error": {"message": "scripted failure"}}))).into_response();
    }

    if body.get("logprobs").is_some_and(|lp| !lp.is_null()) {
        return Json(json!({
            "choices": [{
                "text": " Yes",
                "logprobs": {"top_logprobs": [{" Yes": 0.6_f64.ln(), " No": 0.2_f64.ln()}]}
            }]
        }))
        .into_response();
    }

    let prompt = body["prompt"].as_str().unwrap_or_default();
    Json(json!({"choices": [{"text": format!(" echo: {prompt}\n")}]})).into_response()
}

async fn spawn_mock(mock: Arc<MockOpenAi>) -> String {
    let app = Router::new()
        .route("/v1/completions", post(completions))
        .with_state(mock);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind mock");
    let port = listener.local_addr().expect("addr").port();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://127.0.0.1:{port}/v1")
}

async fn client(base_url: String, alpha_capacity: u32) -> OpenAiClient {
    client_with(OpenAiConfig {
        base_url,
        api_key: "sk-test".into(),
        alpha_rate_capacity: alpha_capacity,
        alpha_rate_period_seconds: 60,
        ..OpenAiConfig::default()
    })
    .await
}

async fn client_with(config: OpenAiConfig) -> OpenAiClient {
    let pool = db::connect_memory().await.expect("db");
    let cache = ResilientCache::new(
        CacheStore::new(Arc::new(pool)),
        RetryPolicy::new(Some(3), Duration::from_millis(1), Duration::from_millis(5)),
    );
    OpenAiClient::new(&config, cache).expect("client")
}

#[tokio::test]
async fn identical_completions_hit_the_network_once() {
    let mock = Arc::new(MockOpenAi::default());
    let client = client(spawn_mock(Arc::clone(&mock)).await, 1).await;

    let request = CompletionRequest::new("What do you say?");
    let first = client.complete(&request).await.expect("first");
    let second = client.complete(&request).await.expect("second");
    assert_eq!(first, second);
    assert_eq!(first.first_text().expect("text"), "echo: What do you say?");
    assert_eq!(mock.hits.load(Ordering::SeqCst), 1);

    client
        .complete(&CompletionRequest::new("New args"))
        .await
        .expect("third");
    assert_eq!(mock.hits.load(Ordering::SeqCst), 2);

    let sent = mock.bodies.lock().unwrap()[0].clone();
    assert!(sent.get("cache_id").is_none());
    assert_eq!(sent["model"], "text-davinci-002");
}

#[tokio::test]
async fn cache_id_forces_a_fresh_sample() {
    let mock = Arc::new(MockOpenAi::default());
    let client = client(spawn_mock(Arc::clone(&mock)).await, 1).await;

    let mut request = CompletionRequest::new("sample");
    client.complete(&request).await.expect("first");
    request.cache_id = 1;
    client.complete(&request).await.expect("second");
    assert_eq!(mock.hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn remote_rate_limit_is_retried() {
    let mock = Arc::new(MockOpenAi::default());
    mock.failures
        .lock()
        .unwrap()
        .extend([StatusCode::TOO_MANY_REQUESTS, StatusCode::SERVICE_UNAVAILABLE]);
    let client = client(spawn_mock(Arc::clone(&mock)).await, 1).await;

    let response = client
        .complete(&CompletionRequest::new("retry me"))
        .await
        .expect("succeeds on third attempt");
    assert_eq!(response.first_text().expect("text"), "echo: retry me");
    assert_eq!(mock.hits.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn client_errors_are_not_retried_or_cached() {
    let mock = Arc::new(MockOpenAi::default());
    mock.failures.lock().unwrap().push_back(StatusCode::BAD_REQUEST);
    let client = client(spawn_mock(Arc::clone(&mock)).await, 1).await;

    let request = CompletionRequest::new("bad");
    let err = client.complete(&request).await.expect_err("400");
    assert!(matches!(err, AppError::Remote(400, _)));
    assert_eq!(mock.hits.load(Ordering::SeqCst), 1);

    // The failure was not stored, so the next call reaches the server.
    client.complete(&request).await.expect("second try");
    assert_eq!(mock.hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn alpha_models_pass_the_token_bucket() {
    let mock = Arc::new(MockOpenAi::default());
    let client = client(spawn_mock(Arc::clone(&mock)).await, 1).await;

    let mut request = CompletionRequest::new("one");
    request.model = "code-alpha-001".into();
    client.complete(&request).await.expect("first alpha call");

    request.prompt = "two".into();
    let err = client
        .complete(&request)
        .await
        .expect_err("bucket empty for a minute");
    assert!(matches!(err, AppError::RateLimited(_)));
    assert_eq!(mock.hits.load(Ordering::SeqCst), 1, "rejected calls never reach the server");
}

#[tokio::test]
async fn missing_api_key_is_rejected() {
    let pool = db::connect_memory().await.expect("db");
    let cache = ResilientCache::new(CacheStore::new(Arc::new(pool)), RetryPolicy::default());
    let result = OpenAiClient::new(&OpenAiConfig::default(), cache);
    assert!(matches!(result, Err(AppError::Config(_))));
}

#[tokio::test]
async fn agent_relevance_renormalises_yes_no() {
    let mock = Arc::new(MockOpenAi::default());
    let agent = OpenAiAgent::new(client(spawn_mock(Arc::clone(&mock)).await, 1).await);

    let score = agent
        .relevance("Is creatine useful?", "Creatine helps memory.", None)
        .await
        .expect("relevance");
    assert!((score - 0.75).abs() < 1e-9, "0.6 / (0.6 + 0.2), got {score}");

    let sent = mock.bodies.lock().unwrap()[0].clone();
    assert_eq!(sent["max_tokens"], 1);
    assert_eq!(sent["logprobs"], 5);
}

#[tokio::test]
async fn agent_answer_trims_completion() {
    let mock = Arc::new(MockOpenAi::default());
    let agent = OpenAiAgent::new(client(spawn_mock(Arc::clone(&mock)).await, 1).await);

    let answer = agent
        .answer("Say hi", "", true, Some(16))
        .await
        .expect("answer");
    assert_eq!(answer, "echo: Say hi");
    let sent = mock.bodies.lock().unwrap()[0].clone();
    assert_eq!(sent["stop"], Value::Null);
    assert_eq!(sent["max_tokens"], 16);
}

#[tokio::test]
async fn raw_post_retries_transient_statuses() {
    let mock = Arc::new(MockOpenAi::default());
    mock.failures
        .lock()
        .unwrap()
        .extend([StatusCode::TOO_MANY_REQUESTS, StatusCode::SERVICE_UNAVAILABLE]);
    let client = client(spawn_mock(Arc::clone(&mock)).await, 1).await;

    let body = json!({"prompt": "raw", "model": "text-davinci-002"});
    let value = client.post("completions", &body).await.expect("third attempt");
    assert_eq!(value["choices"][0]["text"], " echo: raw\n");
    assert_eq!(mock.hits.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn raw_post_returns_client_errors_after_one_request() {
    let mock = Arc::new(MockOpenAi::default());
    mock.failures.lock().unwrap().push_back(StatusCode::BAD_REQUEST);
    let client = client(spawn_mock(Arc::clone(&mock)).await, 1).await;

    let body = json!({"prompt": "bad", "model": "text-davinci-002"});
    let err = client.post("completions", &body).await.expect_err("400");
    assert!(matches!(err, AppError::Remote(400, _)));
    assert_eq!(mock.hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn raw_post_is_not_cached() {
    let mock = Arc::new(MockOpenAi::default());
    let client = client(spawn_mock(Arc::clone(&mock)).await, 1).await;

    let body = json!({"prompt": "again", "model": "text-davinci-002"});
    let first = client.post("completions", &body).await.expect("first");
    let second = client.post("completions", &body).await.expect("second");
    assert_eq!(first, second);
    assert_eq!(mock.hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn agent_requests_the_configured_model() {
    let mock = Arc::new(MockOpenAi::default());
    let client = client_with(OpenAiConfig {
        base_url: spawn_mock(Arc::clone(&mock)).await,
        api_key: "sk-test".into(),
        model: "davinci-custom".into(),
        ..OpenAiConfig::default()
    })
    .await;
    assert_eq!(client.model(), "davinci-custom");

    OpenAiAgent::new(client)
        .answer("Which model?", "", false, None)
        .await
        .expect("answer");
    let sent = mock.bodies.lock().unwrap()[0].clone();
    assert_eq!(sent["model"], "davinci-custom");
}
