//! Integration tests for the polling HTTP surface.

use std::sync::Arc;
use std::time::{Duration, Instant};

use recipe_harness::bridge::{LaunchFuture, Session, SessionLauncher};
use recipe_harness::models::{Job, JobKind};
use reqwest::StatusCode;
use serde_json::{json, Value};

use super::test_helpers::{create_session, idle_launcher, spawn_server, test_config, test_state};

/// Recipe that asks two questions up front, then waits on both.
fn two_question_launcher() -> SessionLauncher {
    Arc::new(|session: Arc<Session>| -> LaunchFuture {
        Box::pin(async move {
            let ask = |prompt: &str| {
                Job::new(JobKind::Answer {
                    prompt: prompt.into(),
                    default: String::new(),
                    multiline: false,
                })
            };
            let first = session.enqueue(ask("first?"));
            let second = session.enqueue(ask("second?"));
            first.wait().await?;
            second.wait().await?;
            Ok(())
        })
    })
}

#[tokio::test]
async fn health_and_root() {
    let server = spawn_server(test_state(test_config(), idle_launcher())).await;

    let resp = reqwest::get(format!("{}/health", server.base_url))
        .await
        .expect("GET /health");
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.text().await.expect("body"), "ok");

    let root: Value = reqwest::get(format!("{}/", server.base_url))
        .await
        .expect("GET /")
        .json()
        .await
        .expect("json");
    assert_eq!(root, json!({}));
}

#[tokio::test]
async fn empty_queue_poll_returns_204_after_window() {
    let server = spawn_server(test_state(test_config(), idle_launcher())).await;
    let http = reqwest::Client::new();
    let session_id = create_session(&http, &server.base_url).await;

    let started = Instant::now();
    let resp = http
        .get(format!("{}/{session_id}/job", server.base_url))
        .send()
        .await
        .expect("GET job");
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    assert!(started.elapsed() >= Duration::from_millis(900));
}

#[tokio::test]
async fn unknown_session_is_404() {
    let server = spawn_server(test_state(test_config(), idle_launcher())).await;
    let http = reqwest::Client::new();

    let resp = http
        .get(format!("{}/missing/job", server.base_url))
        .send()
        .await
        .expect("GET job");
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = http
        .put(format!("{}/missing/job/j1", server.base_url))
        .json(&json!({"answer": "x"}))
        .send()
        .await
        .expect("PUT job");
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn jobs_complete_in_order_over_http() {
    let server = spawn_server(test_state(test_config(), two_question_launcher())).await;
    let http = reqwest::Client::new();
    let session_id = create_session(&http, &server.base_url).await;
    let job_url = format!("{}/{session_id}/job", server.base_url);

    let first: Value = http
        .get(&job_url)
        .send()
        .await
        .expect("GET job")
        .json()
        .await
        .expect("job json");
    assert_eq!(first["type"], "answer");
    assert_eq!(first["prompt"], "first?");

    // A fresh id that is not the head is rejected with 409.
    let resp = http
        .put(format!("{job_url}/not-the-head"))
        .json(&json!({"answer": "x"}))
        .send()
        .await
        .expect("PUT wrong job");
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let first_id = first["id"].as_str().expect("id");
    let resp = http
        .put(format!("{job_url}/{first_id}"))
        .json(&json!({"answer": "one"}))
        .send()
        .await
        .expect("PUT first");
    assert_eq!(resp.status(), StatusCode::OK);

    let second: Value = http
        .get(&job_url)
        .send()
        .await
        .expect("GET job")
        .json()
        .await
        .expect("job json");
    assert_eq!(second["prompt"], "second?");

    // Completing the already-answered job again is a conflict.
    let resp = http
        .put(format!("{job_url}/{first_id}"))
        .json(&json!({"answer": "again"}))
        .send()
        .await
        .expect("PUT stale");
    assert_eq!(resp.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn malformed_completion_body_is_rejected() {
    let server = spawn_server(test_state(test_config(), two_question_launcher())).await;
    let http = reqwest::Client::new();
    let session_id = create_session(&http, &server.base_url).await;

    let resp = http
        .put(format!("{}/{session_id}/job/any", server.base_url))
        .json(&json!({"wrong": true}))
        .send()
        .await
        .expect("PUT");
    assert!(resp.status().is_client_error());
}

#[tokio::test]
async fn delete_session_then_404() {
    let server = spawn_server(test_state(test_config(), two_question_launcher())).await;
    let http = reqwest::Client::new();
    let session_id = create_session(&http, &server.base_url).await;
    assert_eq!(server.state.registry.len(), 1);

    let resp = http
        .delete(format!("{}/{session_id}", server.base_url))
        .send()
        .await
        .expect("DELETE");
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(server.state.registry.is_empty());

    let resp = http
        .get(format!("{}/{session_id}/job", server.base_url))
        .send()
        .await
        .expect("GET job");
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn shutdown_stops_live_sessions() {
    let server = spawn_server(test_state(test_config(), idle_launcher())).await;
    let http = reqwest::Client::new();
    create_session(&http, &server.base_url).await;
    assert_eq!(server.state.registry.len(), 1);

    server.ct.cancel();
    for _ in 0..50 {
        if server.state.registry.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(server.state.registry.is_empty());
}
