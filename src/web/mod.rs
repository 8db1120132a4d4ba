//! HTTP polling surface for remote operators.
//!
//! Operators create a session, then loop `GET /{session_id}/job` and
//! `PUT /{session_id}/job/{job_id}` until the recipe is done. A poll on
//! an empty queue waits up to the configured timeout and answers 204.

pub mod handlers;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::bridge::SessionRegistry;
use crate::models::MessageResponse;
use crate::{AppError, GlobalConfig, Result};

/// State shared by every request handler.
pub struct AppState {
    /// Loaded configuration.
    pub config: Arc<GlobalConfig>,
    /// Live sessions.
    pub registry: Arc<SessionRegistry>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Consistency(_) => StatusCode::CONFLICT,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Cancelled(_) => StatusCode::GONE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let message = match self {
            Self::NotFound(message)
            | Self::Consistency(message)
            | Self::BadRequest(message)
            | Self::Cancelled(message) => message,
            other => other.to_string(),
        };
        (status, Json(MessageResponse::new(message))).into_response()
    }
}

/// Build the router with permissive CORS.
#[must_use]
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route("/session", post(handlers::create_session))
        .route("/{session_id}", axum::routing::delete(handlers::delete_session))
        .route("/{session_id}/job", get(handlers::next_job))
        .route("/{session_id}/job/{job_id}", put(handlers::complete_job))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serve on `config.http_port` until `ct` is cancelled.
///
/// # Errors
///
/// Returns `AppError::Config` if the server fails to bind.
pub async fn serve_http(state: Arc<AppState>, ct: CancellationToken) -> Result<()> {
    let bind = SocketAddr::from(([127, 0, 0, 1], state.config.http_port));
    let listener = TcpListener::bind(bind)
        .await
        .map_err(|err| AppError::Config(format!("failed to bind HTTP on {bind}: {err}")))?;
    serve_listener(listener, state, ct).await
}

/// Serve on an already-bound listener until `ct` is cancelled.
///
/// Live sessions are stopped once the server has drained.
///
/// # Errors
///
/// Returns `AppError::Io` if the server fails while running.
pub async fn serve_listener(
    listener: TcpListener,
    state: Arc<AppState>,
    ct: CancellationToken,
) -> Result<()> {
    let local = listener.local_addr()?;
    info!(%local, "starting HTTP polling surface");

    let registry = Arc::clone(&state.registry);
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { ct.cancelled().await })
        .await?;

    registry.shutdown();
    info!("HTTP polling surface shut down");
    Ok(())
}
