//! Request handlers for the polling protocol.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};

use super::AppState;
use crate::models::{CompleteJobRequest, MessageResponse, SessionResponse};
use crate::Result;

/// `GET /`
pub async fn root() -> Json<Value> {
    Json(json!({}))
}

/// `GET /health`: liveness probe.
pub async fn health() -> &'static str {
    "ok"
}

/// `POST /session`: create a session and start its recipe.
pub async fn create_session(State(state): State<Arc<AppState>>) -> Json<SessionResponse> {
    Json(SessionResponse {
        session_id: state.registry.create(),
    })
}

/// `GET /{session_id}/job`: the head job, or 204 once the poll window
/// passes without one.
///
/// # Errors
///
/// Returns 404 for an unknown session.
pub async fn next_job(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Response> {
    let session = state.registry.get(&session_id)?;
    Ok(match session.next_job(state.config.poll_timeout()).await {
        Some(job) => Json(job).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    })
}

/// `PUT /{session_id}/job/{job_id}`: complete the head job.
///
/// # Errors
///
/// Returns 404 for an unknown session and 409 when `job_id` is not the
/// head of the queue.
pub async fn complete_job(
    State(state): State<Arc<AppState>>,
    Path((session_id, job_id)): Path<(String, String)>,
    Json(body): Json<CompleteJobRequest>,
) -> Result<Json<MessageResponse>> {
    let session = state.registry.get(&session_id)?;
    session.complete_job(&job_id, body.answer)?;
    Ok(Json(MessageResponse::new("job completed")))
}

/// `DELETE /{session_id}`: stop the recipe and drop pending jobs.
///
/// # Errors
///
/// Returns 404 for an unknown session.
pub async fn delete_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<MessageResponse>> {
    state.registry.remove(&session_id)?;
    Ok(Json(MessageResponse::new("session deleted")))
}
