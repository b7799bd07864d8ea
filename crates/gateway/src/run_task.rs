//! Bridges `Supervisor::run`'s synchronous `emit` callback into the async
//! world: spawns the run on its own task, fans every `StreamEvent` out
//! through the run's broadcast channel, and records terminal bookkeeping
//! on `SessionManager` once the run completes.

use std::sync::Arc;

use conductor_domain::event::StreamEvent;
use conductor_domain::run::RunStatus;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::state::AppState;

tokio::task_local! {
    /// The run a tool invocation is executing under. Scoped around the
    /// single `Supervisor::run` call per spawned task; read by
    /// `tools::ApprovalTool` to correlate a HITL request with its run
    /// without threading `run_id` through `conductor_tools::Invoker`,
    /// whose signature (built independently of sessions) has no run
    /// context parameter.
    pub static CURRENT_RUN_ID: Uuid;
}

/// Create the run's fan-out channel and spawn it. Returns immediately;
/// the caller should `state.run_events.subscribe(&run_id)` before this
/// returns control to an await point that could race the spawn — in
/// practice this function already opens the channel before spawning, so
/// subscribing any time after this call returns is race-free.
pub fn spawn_run(
    state: AppState,
    run_id: Uuid,
    task_text: String,
    conversation_id: Option<Uuid>,
    cancel: CancellationToken,
) {
    let tx = state.run_events.create(run_id, 256);

    tokio::spawn(CURRENT_RUN_ID.scope(run_id, async move {
        let terminal: Arc<Mutex<Option<(RunStatus, Option<String>, Option<String>)>>> =
            Arc::new(Mutex::new(None));
        let terminal_for_emit = terminal.clone();
        let emit_tx = tx.clone();

        let emit = move |event: StreamEvent| {
            if let Some(outcome) = terminal_outcome(&event) {
                *terminal_for_emit.lock() = Some(outcome);
            }
            let _ = emit_tx.send(event);
        };

        state.supervisor.run(run_id, &task_text, conversation_id, cancel, &emit).await;

        let (status, final_result, error) =
            terminal.lock().take().unwrap_or((RunStatus::Failed, None, Some("run produced no terminal event".into())));
        state.session_manager.finish(&run_id, status, final_result, error);
        state.run_events.remove(&run_id);
    }));
}

/// Map a terminal `StreamEvent` to the `(RunStatus, final_result, error)`
/// `SessionManager::finish` records. A cancelled run surfaces as
/// `StreamEvent::Error{code: "cancelled", ..}` (the supervisor has no
/// separate cancellation event), so it's distinguished here from a real
/// failure by `code` rather than collapsed into `RunStatus::Failed`.
fn terminal_outcome(event: &StreamEvent) -> Option<(RunStatus, Option<String>, Option<String>)> {
    match event {
        StreamEvent::WorkflowOutput { result, .. } => Some((RunStatus::Succeeded, Some(result.clone()), None)),
        StreamEvent::Error { code, message, .. } => {
            let status = if code == "cancelled" { RunStatus::Cancelled } else { RunStatus::Failed };
            Some((status, None, Some(message.clone())))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use conductor_domain::event::EventCategory;

    #[test]
    fn workflow_output_maps_to_succeeded() {
        let event = StreamEvent::WorkflowOutput {
            timestamp: Utc::now(),
            category: EventCategory::Terminal,
            ui_hint: None,
            result: "done".into(),
            quality: None,
            run_id: Uuid::new_v4(),
            durations: serde_json::json!({}),
        };
        let (status, result, error) = terminal_outcome(&event).unwrap();
        assert_eq!(status, RunStatus::Succeeded);
        assert_eq!(result.as_deref(), Some("done"));
        assert!(error.is_none());
    }

    #[test]
    fn cancelled_error_code_maps_to_cancelled_not_failed() {
        let event = StreamEvent::Error {
            timestamp: Utc::now(),
            category: EventCategory::Terminal,
            ui_hint: None,
            code: "cancelled".into(),
            message: "run cancelled".into(),
            phase: None,
        };
        let (status, result, error) = terminal_outcome(&event).unwrap();
        assert_eq!(status, RunStatus::Cancelled);
        assert!(result.is_none());
        assert_eq!(error.as_deref(), Some("run cancelled"));
    }

    #[test]
    fn other_error_code_maps_to_failed() {
        let event = StreamEvent::Error {
            timestamp: Utc::now(),
            category: EventCategory::Terminal,
            ui_hint: None,
            code: "tool_error".into(),
            message: "boom".into(),
            phase: None,
        };
        let (status, _, _) = terminal_outcome(&event).unwrap();
        assert_eq!(status, RunStatus::Failed);
    }

    #[test]
    fn non_terminal_event_has_no_outcome() {
        let event = StreamEvent::AgentDelta {
            timestamp: Utc::now(),
            category: EventCategory::Agent,
            ui_hint: None,
            agent_id: "writer".into(),
            delta: "...".into(),
            accumulated: "...".into(),
            agent_accumulated: "...".into(),
        };
        assert!(terminal_outcome(&event).is_none());
    }
}
