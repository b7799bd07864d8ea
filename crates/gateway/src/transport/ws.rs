//! WebSocket transport (§6.1). Grounded on the teacher's `nodes::ws::node_ws`
//! handler shape — upgrade, split sink/stream, a writer task draining an
//! outbound `mpsc` channel, a reader loop dispatching inbound frames — with
//! the teacher's node-hello handshake replaced by the client protocol's
//! `{type:"task"|"response"|"resume"|"ping"|"cancel"}` frames.

use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::run_task::spawn_run;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", deny_unknown_fields)]
enum InboundFrame {
    Task {
        message: String,
        conversation_id: Option<Uuid>,
        #[serde(default)]
        reasoning_effort: Option<String>,
        #[serde(default)]
        enable_checkpointing: Option<bool>,
    },
    Response {
        request_id: Uuid,
        payload: Value,
    },
    Resume {
        checkpoint_id: String,
    },
    Ping,
    Cancel,
}

fn protocol_error(code: &str, message: &str) -> Value {
    json!({
        "type": "ERROR",
        "timestamp": chrono::Utc::now(),
        "category": "terminal",
        "uiHint": Value::Null,
        "code": code,
        "message": message,
        "phase": Value::Null,
    })
}

pub async fn handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let origin = headers
        .get(axum::http::header::ORIGIN)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    if !origin.is_empty() && !state.config.server.cors.is_allowed(origin, state.config.server.dev_mode) {
        return (StatusCode::FORBIDDEN, "origin not allowed").into_response();
    }

    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut ws_sink, mut ws_stream) = socket.split();
    let (out_tx, mut out_rx) = mpsc::channel::<Message>(256);

    let writer = tokio::spawn(async move {
        while let Some(msg) = out_rx.recv().await {
            if ws_sink.send(msg).await.is_err() {
                break;
            }
        }
    });

    if out_tx.send(Message::Text(json!({"type": "connected"}).to_string())).await.is_err() {
        writer.abort();
        return;
    }

    let mut active: Option<(Uuid, CancellationToken)> = None;
    let mut forward: Option<tokio::task::JoinHandle<()>> = None;

    while let Some(Ok(msg)) = ws_stream.next().await {
        let text = match msg {
            Message::Text(text) => text,
            Message::Close(_) => break,
            Message::Ping(_) | Message::Pong(_) | Message::Binary(_) => continue,
        };

        let frame: InboundFrame = match serde_json::from_str(&text) {
            Ok(frame) => frame,
            Err(e) => {
                let _ = out_tx.send(Message::Text(protocol_error("invalid_input", &e.to_string()).to_string())).await;
                continue;
            }
        };

        match frame {
            InboundFrame::Ping => {
                let _ = out_tx.send(Message::Text(json!({"type": "pong"}).to_string())).await;
            }

            InboundFrame::Task { message, conversation_id, .. } => {
                if let Some(task) = forward.take() {
                    task.abort();
                }
                let (run, cancel) = state.session_manager.create(&message, conversation_id);
                let run_id = run.run_id;
                spawn_run(state.clone(), run_id, message, conversation_id, cancel.clone());
                active = Some((run_id, cancel));
                forward = Some(spawn_forwarder(&state, run_id, out_tx.clone()));
            }

            InboundFrame::Resume { checkpoint_id } => {
                if let Some(task) = forward.take() {
                    task.abort();
                }
                match state.session_manager.resume(&checkpoint_id) {
                    Ok((checkpoint, cancel)) => {
                        // `Supervisor::run` has no mid-pipeline resume entry point;
                        // the best available bridge restarts the full pipeline
                        // under the checkpointed run id and task text.
                        let run_id: Uuid = match checkpoint.run_id.parse() {
                            Ok(id) => id,
                            Err(_) => {
                                let _ = out_tx
                                    .send(Message::Text(
                                        protocol_error("invalid_input", "checkpoint run id is not a valid uuid").to_string(),
                                    ))
                                    .await;
                                continue;
                            }
                        };
                        spawn_run(state.clone(), run_id, checkpoint.task_text.clone(), checkpoint.conversation_id, cancel.clone());
                        active = Some((run_id, cancel));
                        forward = Some(spawn_forwarder(&state, run_id, out_tx.clone()));
                    }
                    Err(e) => {
                        let _ = out_tx.send(Message::Text(protocol_error(e.code(), &e.display_message()).to_string())).await;
                    }
                }
            }

            InboundFrame::Cancel => {
                if let Some((run_id, _)) = &active {
                    state.session_manager.cancel(run_id);
                }
            }

            InboundFrame::Response { request_id, payload } => {
                if let Some((run_id, _)) = &active {
                    if let Err(e) = state.session_manager.submit_response(run_id, request_id, payload) {
                        let _ = out_tx.send(Message::Text(protocol_error(e.code(), &e.display_message()).to_string())).await;
                    }
                }
            }
        }
    }

    if let Some((run_id, cancel)) = active.take() {
        cancel.cancel();
        state.session_manager.cancel(&run_id);
    }
    if let Some(task) = forward.take() {
        task.abort();
    }
    writer.abort();
}

/// Subscribe to a run's broadcast channel and forward every event to the
/// connection's outbound writer until a terminal event is sent. Opening the
/// channel happens inside `spawn_run` before this is called, so subscribing
/// here never races the run's first emitted event.
fn spawn_forwarder(state: &AppState, run_id: Uuid, out_tx: mpsc::Sender<Message>) -> tokio::task::JoinHandle<()> {
    let mut rx = match state.run_events.subscribe(&run_id) {
        Some(rx) => rx,
        None => return tokio::spawn(async {}),
    };

    tokio::spawn(async move {
        loop {
            match tokio::time::timeout(Duration::from_secs(600), rx.recv()).await {
                Ok(Ok(event)) => {
                    let terminal = event.is_terminal();
                    let frame = crate::transport::mapper::to_json_string(&event);
                    if out_tx.send(Message::Text(frame)).await.is_err() || terminal {
                        break;
                    }
                }
                Ok(Err(tokio::sync::broadcast::error::RecvError::Lagged(_))) => continue,
                Ok(Err(tokio::sync::broadcast::error::RecvError::Closed)) => break,
                Err(_) => break,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_frame_parses_camel_case_fields() {
        let raw = json!({
            "type": "task",
            "message": "hello",
            "conversationId": Value::Null,
            "reasoningEffort": "low",
        });
        let frame: InboundFrame = serde_json::from_value(raw).unwrap();
        match frame {
            InboundFrame::Task { message, reasoning_effort, .. } => {
                assert_eq!(message, "hello");
                assert_eq!(reasoning_effort.as_deref(), Some("low"));
            }
            _ => panic!("expected Task variant"),
        }
    }

    #[test]
    fn resume_frame_requires_checkpoint_id() {
        let raw = json!({"type": "resume", "checkpointId": "abc123"});
        let frame: InboundFrame = serde_json::from_value(raw).unwrap();
        assert!(matches!(frame, InboundFrame::Resume { checkpoint_id } if checkpoint_id == "abc123"));
    }

    #[test]
    fn unknown_type_fails_to_parse() {
        let raw = json!({"type": "not_a_real_type"});
        assert!(serde_json::from_value::<InboundFrame>(raw).is_err());
    }

    /// §4.1 "message and checkpointId are mutually exclusive at session
    /// start": a `task` frame has no `checkpointId` field, so one carrying
    /// both is rejected outright by `deny_unknown_fields` rather than
    /// silently dropping the extra field.
    #[test]
    fn task_frame_with_checkpoint_id_is_rejected() {
        let raw = json!({
            "type": "task",
            "message": "hello",
            "checkpointId": "abc123",
        });
        assert!(serde_json::from_value::<InboundFrame>(raw).is_err());
    }
}
