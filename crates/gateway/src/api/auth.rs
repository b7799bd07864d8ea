//! Admin-token middleware, grounded on the teacher's `api::auth::require_api_token`:
//! constant-time comparison of a SHA-256 digest, `None` hash means auth is
//! disabled (dev mode).

use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::state::AppState;

fn unauthorized(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({ "code": "unauthorized", "message": message })),
    )
        .into_response()
}

pub async fn require_admin_token(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let Some(expected) = &state.admin_token_hash else {
        return next.run(req).await;
    };

    let provided = req
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    let Some(token) = provided else {
        return unauthorized("missing bearer token");
    };

    let digest = Sha256::digest(token.as_bytes());
    if digest.as_slice().ct_eq(expected.as_slice()).into() {
        next.run(req).await
    } else {
        unauthorized("invalid token")
    }
}
