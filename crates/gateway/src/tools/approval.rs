//! `request_approval` — a HITL-capable tool. Bridges the plain
//! `conductor_tools::Invoker::invoke(&self, input)` call into
//! `conductor_sessions::SessionManager::request_hitl`, suspending the
//! calling agent turn until the client resolves the request over the
//! HITL side-channel (§8 scenario 6).
//!
//! `Invoker::invoke` carries no run context, so the current run id is
//! read from the `run_task::CURRENT_RUN_ID` task-local rather than
//! threaded through the tool's input — the tool-call loop in
//! `conductor_agents::AgentRunner::run` never spawns a new task between
//! `Supervisor::run` and this call, so the task-local set by
//! `run_task::spawn_run` is still in scope here.

use std::time::Duration;

use chrono::Utc;
use conductor_domain::error::{Error, Result};
use conductor_domain::event::{EventCategory, StreamEvent};
use conductor_tools::Invoker;
use serde_json::Value;

use crate::run_task::CURRENT_RUN_ID;
use crate::state::RunEventRegistry;
use conductor_sessions::SessionManager;

pub struct ApprovalTool {
    session_manager: std::sync::Arc<SessionManager>,
    events: RunEventRegistry,
    timeout: Duration,
}

impl ApprovalTool {
    pub fn new(session_manager: std::sync::Arc<SessionManager>, events: RunEventRegistry, timeout: Duration) -> Self {
        Self { session_manager, events, timeout }
    }
}

#[async_trait::async_trait]
impl Invoker for ApprovalTool {
    async fn invoke(&self, input: Value) -> Result<Value> {
        let run_id = CURRENT_RUN_ID.try_with(|id| *id).map_err(|_| Error::ToolError {
            tool_name: "request_approval".into(),
            reason: "request_approval called outside an active run".into(),
        })?;

        let kind = input.get("kind").and_then(|v| v.as_str()).unwrap_or("confirm").to_string();
        let payload = input.get("payload").cloned().unwrap_or(Value::Null);

        let (info, rx) = self.session_manager.request_hitl(&run_id, &kind, payload);

        self.events.emit(
            &run_id,
            StreamEvent::Request {
                timestamp: Utc::now(),
                category: EventCategory::Request,
                ui_hint: None,
                request_id: info.id,
                kind: info.kind.clone(),
                payload: info.payload.clone(),
            },
        );

        match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(decision)) => Ok(decision.payload),
            Ok(Err(_)) => Err(Error::ToolError {
                tool_name: "request_approval".into(),
                reason: "hitl channel closed before a response arrived".into(),
            }),
            Err(_) => Err(Error::Timeout(format!("hitl request {} timed out", info.id))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conductor_domain::run::RunStore;
    use std::sync::Arc;

    fn manager() -> (Arc<SessionManager>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let manager = Arc::new(SessionManager::new(RunStore::new(), Duration::from_secs(30), dir.path()));
        (manager, dir)
    }

    /// §8 scenario 6: a tool requests human approval mid-run, the client
    /// answers over `submit_response`, and the suspended `invoke` future
    /// resolves with the client's payload — without ever threading the run
    /// id through `Invoker::invoke`'s signature.
    #[tokio::test]
    async fn approval_round_trip_resumes_with_client_payload() {
        let (manager, _dir) = manager();
        let (run, _token) = manager.create("needs a human yes/no", None);
        let events = RunEventRegistry::new();
        events.create(run.run_id, 8);
        let mut rx = events.subscribe(&run.run_id).unwrap();

        let tool = ApprovalTool::new(manager.clone(), events.clone(), Duration::from_secs(5));

        let manager_for_responder = manager.clone();
        let run_id = run.run_id;
        let responder = tokio::spawn(async move {
            // wait for the REQUEST event the tool emits, then answer it
            let event = rx.recv().await.unwrap();
            let request_id = match event {
                StreamEvent::Request { request_id, .. } => request_id,
                other => panic!("expected a Request event, got {other:?}"),
            };
            manager_for_responder
                .submit_response(&run_id, request_id, serde_json::json!({"approved": true}))
                .unwrap();
        });

        let invoke = CURRENT_RUN_ID.scope(run.run_id, tool.invoke(serde_json::json!({"kind": "confirm", "payload": {"q": "proceed?"}})));
        let result = invoke.await.unwrap();
        responder.await.unwrap();

        assert_eq!(result["approved"], true);
        assert_eq!(manager.get_run(&run.run_id).unwrap().status, conductor_domain::run::RunStatus::Running);
    }

    #[tokio::test]
    async fn invoke_outside_a_run_is_a_tool_error() {
        let (manager, _dir) = manager();
        let events = RunEventRegistry::new();
        let tool = ApprovalTool::new(manager, events, Duration::from_millis(50));

        let err = tool.invoke(serde_json::json!({})).await.unwrap_err();
        assert!(matches!(err, Error::ToolError { .. }));
    }

    #[tokio::test]
    async fn unanswered_request_times_out() {
        let (manager, _dir) = manager();
        let (run, _token) = manager.create("needs a human yes/no", None);
        let events = RunEventRegistry::new();
        events.create(run.run_id, 8);

        let tool = ApprovalTool::new(manager, events, Duration::from_millis(50));
        let err = CURRENT_RUN_ID
            .scope(run.run_id, tool.invoke(serde_json::json!({})))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Timeout(_)));
    }
}
