//! Client-facing transports (§6.1): WebSocket (bidirectional, including
//! HITL responses and cancellation) and SSE (server-to-client, task
//! submission over a plain HTTP POST).

pub mod mapper;
pub mod sse;
pub mod ws;

use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/ws", get(ws::handler))
        .route("/v1/tasks", post(sse::submit_task))
        .route("/v1/runs/:id/stream", get(sse::stream_run))
}
