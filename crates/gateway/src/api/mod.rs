//! Admin/introspection REST surface, grounded on the teacher's `api::mod`
//! router split: a `public` router (health checks, no auth) merged with a
//! `protected` router gated by the admin-token middleware.

pub mod auth;
pub mod health;
pub mod hitl;
pub mod runs;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

pub fn router(state: AppState) -> Router<AppState> {
    let public = Router::new()
        .route("/healthz", get(health::healthz))
        .route("/readyz", get(health::readyz));

    let protected = Router::new()
        .route("/v1/runs", get(runs::list_runs))
        .route("/v1/runs/:id", get(runs::get_run))
        .route("/v1/runs/:id/cancel", post(runs::cancel_run))
        .route("/v1/runs/:id/respond", post(hitl::respond))
        .route("/v1/hitl/pending", get(hitl::list_pending))
        .route_layer(middleware::from_fn_with_state(state, auth::require_admin_token));

    public.merge(protected)
}
