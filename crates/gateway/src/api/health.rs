//! Liveness/readiness probes, grounded on the teacher's `api::health` pair.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use conductor_domain::config::ConfigSeverity;

use crate::state::AppState;

/// `GET /healthz` — the process is up and serving requests.
pub async fn healthz() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// `GET /readyz` — the loaded config has no `Error`-severity issues. A
/// `Warning`-only config (e.g. no reasoner artifact configured, running in
/// fast-path-only mode) is still considered ready.
pub async fn readyz(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    let issues = state.config.validate();
    let errors: Vec<String> = issues
        .iter()
        .filter(|issue| issue.severity == ConfigSeverity::Error)
        .map(|issue| issue.to_string())
        .collect();

    if errors.is_empty() {
        (StatusCode::OK, Json(serde_json::json!({ "status": "ready" })))
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(serde_json::json!({ "status": "not_ready", "errors": errors })))
    }
}
