//! SSE transport companion to the WebSocket (§6.1): a client that can't
//! hold a socket open submits a task over HTTP and reads the run back as a
//! server-sent-event stream. HITL is request-only here — a `REQUEST` event
//! is emitted same as on the WS transport, and the client answers it
//! through `POST /v1/runs/:id/respond` (`api::hitl`), not over this stream.
//!
//! Grounded on the teacher's `api::runs::run_events_sse` /
//! `make_run_event_stream`: subscribe to the run's broadcast channel inside
//! an `async_stream::stream!` loop, translate `Lagged` into a visible
//! warning event instead of silently dropping it, and stop after the first
//! terminal event.

use std::convert::Infallible;
use std::pin::Pin;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::{Json, http::StatusCode};
use futures_util::Stream;
use serde::Deserialize;
use tokio::sync::broadcast::error::RecvError;
use uuid::Uuid;

use crate::run_task::spawn_run;
use crate::state::AppState;
use crate::transport::mapper::to_json_string;

#[derive(Debug, Deserialize)]
pub struct SubmitTaskBody {
    pub message: String,
    pub conversation_id: Option<Uuid>,
}

/// `POST /v1/tasks` — start a run and return its id immediately. The
/// companion stream is opened separately against the returned id, mirroring
/// the teacher's create-then-subscribe split (a single endpoint that both
/// created and streamed would drop every event emitted before the client
/// established its SSE connection).
pub async fn submit_task(State(state): State<AppState>, Json(body): Json<SubmitTaskBody>) -> impl IntoResponse {
    let (run, cancel) = state.session_manager.create(&body.message, body.conversation_id);
    let run_id = run.run_id;
    spawn_run(state.clone(), run_id, body.message, body.conversation_id, cancel);
    (StatusCode::ACCEPTED, Json(serde_json::json!({ "runId": run_id })))
}

/// `GET /v1/runs/:id/stream` — subscribe to a run already created by
/// `submit_task`. Returns `404` if the run is unknown, and replays nothing:
/// a client that connects after events were already dropped because no one
/// was subscribed sees only what's emitted from here on, same limitation as
/// the WS transport has for a reconnecting client.
type BoxedEventStream = Pin<Box<dyn Stream<Item = Result<Event, Infallible>> + Send>>;

pub async fn stream_run(
    State(state): State<AppState>,
    Path(run_id): Path<Uuid>,
) -> Result<Sse<BoxedEventStream>, StatusCode> {
    let run = state.session_manager.get_run(&run_id).ok_or(StatusCode::NOT_FOUND)?;

    if run.status.is_terminal() {
        let snapshot = run.final_result.clone().unwrap_or_default();
        let event = Event::default().event("workflow_output").data(snapshot);
        let stream = async_stream::stream! { yield Ok(event); };
        let boxed: BoxedEventStream = Box::pin(stream);
        return Ok(Sse::new(boxed).keep_alive(KeepAlive::default()));
    }

    let rx = state.run_events.subscribe(&run_id).ok_or(StatusCode::NOT_FOUND)?;

    let stream = async_stream::stream! {
        let mut rx = rx;
        loop {
            match rx.recv().await {
                Ok(event) => {
                    let name = crate::transport::mapper::sse_event_name(&event);
                    let terminal = event.is_terminal();
                    yield Ok(Event::default().event(name).data(to_json_string(&event)));
                    if terminal {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    yield Ok(Event::default().event("warning").data(format!("{{\"skipped\":{skipped}}}")));
                }
                Err(RecvError::Closed) => break,
            }
        }
    };

    let boxed: BoxedEventStream = Box::pin(stream);
    Ok(Sse::new(boxed).keep_alive(KeepAlive::new().interval(Duration::from_secs(15))))
}
