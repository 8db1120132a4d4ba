//! Shared test helpers for HTTP-level integration tests.
//!
//! Provides reusable construction of `GlobalConfig`, `AppState` and a
//! running server on an ephemeral port so individual test modules can
//! focus on behaviour rather than boilerplate.

use std::sync::Arc;

use recipe_harness::bridge::{LaunchFuture, Session, SessionLauncher, SessionRegistry};
use recipe_harness::config::GlobalConfig;
use recipe_harness::web::{serve_listener, AppState};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

/// Minimal config with a one-second poll window.
pub fn test_config() -> GlobalConfig {
    GlobalConfig::from_toml_str(
        r#"
http_port = 0

[bridge]
poll_timeout_seconds = 1

[retry]
max_attempts = 3
min_wait_ms = 1
max_wait_seconds = 1
"#,
    )
    .expect("valid test config")
}

/// Launcher whose recipe never asks anything and never finishes.
pub fn idle_launcher() -> SessionLauncher {
    Arc::new(|_session: Arc<Session>| -> LaunchFuture {
        Box::pin(std::future::pending())
    })
}

/// Build shared state around `launcher`.
pub fn test_state(config: GlobalConfig, launcher: SessionLauncher) -> Arc<AppState> {
    Arc::new(AppState {
        config: Arc::new(config),
        registry: Arc::new(SessionRegistry::new(launcher)),
    })
}

/// Running server handle. Cancel `ct` to shut it down.
pub struct TestServer {
    pub base_url: String,
    pub state: Arc<AppState>,
    pub ct: CancellationToken,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.ct.cancel();
    }
}

/// Serve `state` on an ephemeral port.
pub async fn spawn_server(state: Arc<AppState>) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral");
    let port = listener.local_addr().expect("local addr").port();
    let ct = CancellationToken::new();

    let server_state = Arc::clone(&state);
    let server_ct = ct.clone();
    tokio::spawn(async move {
        let _ = serve_listener(listener, server_state, server_ct).await;
    });

    TestServer {
        base_url: format!("http://127.0.0.1:{port}"),
        state,
        ct,
    }
}

/// Create a session over HTTP and return its identifier.
pub async fn create_session(http: &reqwest::Client, base_url: &str) -> String {
    let body: serde_json::Value = http
        .post(format!("{base_url}/session"))
        .send()
        .await
        .expect("POST /session")
        .json()
        .await
        .expect("json body");
    body["session_id"]
        .as_str()
        .expect("session_id string")
        .to_owned()
}
