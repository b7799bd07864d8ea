//! Admin introspection over recent runs, grounded on the teacher's
//! `api::runs::{list_runs, get_run}`.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListRunsQuery {
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    50
}

pub async fn list_runs(State(state): State<AppState>, Query(query): Query<ListRunsQuery>) -> Json<serde_json::Value> {
    let runs = state.session_manager.runs().list_recent(query.limit);
    Json(serde_json::json!({ "runs": runs }))
}

pub async fn get_run(State(state): State<AppState>, Path(run_id): Path<Uuid>) -> Result<Json<serde_json::Value>, StatusCode> {
    let run = state.session_manager.get_run(&run_id).ok_or(StatusCode::NOT_FOUND)?;
    Ok(Json(serde_json::to_value(run).unwrap_or_default()))
}

pub async fn cancel_run(State(state): State<AppState>, Path(run_id): Path<Uuid>) -> StatusCode {
    if state.session_manager.cancel(&run_id) {
        StatusCode::ACCEPTED
    } else {
        StatusCode::NOT_FOUND
    }
}
