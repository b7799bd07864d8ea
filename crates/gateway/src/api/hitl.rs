//! HITL side-channel endpoints (§4.2, §6.1): the SSE transport has no
//! inbound frame, so a client driving a run over SSE answers a `REQUEST`
//! event here instead of over the stream itself.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RespondBody {
    pub request_id: Uuid,
    pub payload: Value,
}

pub async fn respond(
    State(state): State<AppState>,
    Path(run_id): Path<Uuid>,
    Json(body): Json<RespondBody>,
) -> Result<StatusCode, (StatusCode, Json<serde_json::Value>)> {
    state
        .session_manager
        .submit_response(&run_id, body.request_id, body.payload)
        .map(|_| StatusCode::NO_CONTENT)
        .map_err(|e| {
            (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({ "code": e.code(), "message": e.display_message() })),
            )
        })
}

#[derive(Debug, Deserialize)]
pub struct PendingQuery {
    pub run_id: Option<Uuid>,
}

pub async fn list_pending(State(state): State<AppState>, Query(query): Query<PendingQuery>) -> Json<serde_json::Value> {
    let pending = state.session_manager.pending_requests(query.run_id.as_ref());
    Json(serde_json::json!({ "pending": pending }))
}
