//! Session Manager (§4.2) — owns the per-run object graph: cancel signal,
//! HITL pending map, and the checkpoint binder. Grounded on the teacher's
//! `runtime::mod`/`state::AppState`, which hold the same three
//! collections (`CancelMap`, `ApprovalStore`, run storage) as shared,
//! process-wide state behind `Arc`.

use std::path::PathBuf;
use std::time::Duration;

use conductor_domain::error::{Error, Result};
use conductor_domain::run::{Run, RunStatus, RunStore};
use conductor_domain::trace::TraceEvent;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::cancel::CancelMap;
use crate::checkpoint::{Checkpoint, CheckpointStore};
use crate::hitl::{HitlStore, PendingRequest, RequestInfo};

pub struct SessionManager {
    runs: RunStore,
    cancel: CancelMap,
    hitl: HitlStore,
    checkpoints: CheckpointStore,
}

impl SessionManager {
    pub fn new(runs: RunStore, hitl_timeout: Duration, checkpoint_dir: impl Into<PathBuf>) -> Self {
        Self {
            runs,
            cancel: CancelMap::new(),
            hitl: HitlStore::new(hitl_timeout),
            checkpoints: CheckpointStore::new(checkpoint_dir),
        }
    }

    /// Start a new run: creates the `Run` record (status `Pending`) and
    /// registers its cancellation token. §4.1 "message and checkpointId
    /// are mutually exclusive at session start" is enforced by the
    /// gateway's start-frame parsing, not here — by the time `create` is
    /// called, the caller has already chosen "new run" over "resume".
    pub fn create(&self, task_text: &str, conversation_id: Option<Uuid>) -> (Run, CancellationToken) {
        let run = Run::new(task_text, conversation_id);
        let token = self.cancel.register(&run.run_id.to_string());
        self.runs.insert(run.clone());
        (run, token)
    }

    /// Request cancellation of a run. Returns `true` if the run was
    /// found and running.
    pub fn cancel(&self, run_id: &Uuid) -> bool {
        let cancelled = self.cancel.cancel(&run_id.to_string());
        if cancelled {
            TraceEvent::RunCancelled { run_id: run_id.to_string() }.emit();
        }
        cancelled
    }

    /// Finalize a run's terminal bookkeeping: update its stored record
    /// and release its cancellation token.
    pub fn finish(&self, run_id: &Uuid, status: RunStatus, final_result: Option<String>, error: Option<String>) {
        self.runs.update(run_id, |run| {
            run.finish(status);
            run.final_result = final_result;
            run.error = error;
        });
        self.cancel.remove(&run_id.to_string());
        TraceEvent::RunTerminal { run_id: run_id.to_string(), status: format!("{status:?}") }.emit();
    }

    pub fn cancel_token(&self, run_id: &Uuid) -> Option<CancellationToken> {
        self.cancel.token(&run_id.to_string())
    }

    pub fn get_run(&self, run_id: &Uuid) -> Option<Run> {
        self.runs.get(run_id)
    }

    pub fn runs(&self) -> &RunStore {
        &self.runs
    }

    /// Register a new pending HITL request and flip the run to
    /// `needs_response`.
    pub fn request_hitl(&self, run_id: &Uuid, kind: &str, payload: serde_json::Value) -> (RequestInfo, tokio::sync::oneshot::Receiver<crate::hitl::HitlDecision>) {
        let (tx, rx) = tokio::sync::oneshot::channel();
        let request = PendingRequest {
            id: Uuid::new_v4(),
            run_id: run_id.to_string(),
            kind: kind.to_string(),
            payload,
            created_at: chrono::Utc::now(),
            respond: tx,
        };
        let info = self.hitl.insert(request);
        self.runs.update(run_id, |run| run.status = RunStatus::NeedsResponse);
        TraceEvent::HitlRequested { run_id: run_id.to_string(), request_id: info.id.to_string(), kind: kind.to_string() }.emit();
        (info, rx)
    }

    /// §4.2 `submitResponse(runId, requestId, payload)`.
    pub fn submit_response(&self, run_id: &Uuid, request_id: Uuid, payload: serde_json::Value) -> Result<()> {
        self.hitl.resolve(&run_id.to_string(), request_id, payload)?;
        self.runs.update(run_id, |run| {
            if run.status == RunStatus::NeedsResponse {
                run.status = RunStatus::Running;
            }
        });
        TraceEvent::HitlResolved { run_id: run_id.to_string(), request_id: request_id.to_string() }.emit();
        Ok(())
    }

    pub fn pending_requests(&self, run_id: Option<&Uuid>) -> Vec<RequestInfo> {
        self.hitl.list_pending(run_id.map(Uuid::to_string).as_deref())
    }

    /// Capture a checkpoint and bind it to the run's record.
    pub fn checkpoint(&self, checkpoint: &Checkpoint) -> Result<String> {
        let id = self.checkpoints.save(checkpoint)?;
        if let Ok(run_id) = checkpoint.run_id.parse::<Uuid>() {
            self.runs.update(&run_id, |run| run.checkpoint_ref = Some(id.clone()));
        }
        Ok(id)
    }

    /// §4.2 `resume(runId, checkpointId)` — binds an existing checkpoint
    /// for resumption and re-arms a fresh cancellation token for the run
    /// named inside it.
    pub fn resume(&self, checkpoint_id: &str) -> Result<(Checkpoint, CancellationToken)> {
        let checkpoint = self.checkpoints.load(checkpoint_id)?;
        let run_id: Uuid = checkpoint
            .run_id
            .parse()
            .map_err(|_| Error::Internal { correlation_id: checkpoint.run_id.clone(), message: "checkpoint run id is not a valid UUID".into() })?;
        let token = self.cancel.register(&checkpoint.run_id);
        self.runs.update(&run_id, |run| run.status = RunStatus::Running);
        Ok((checkpoint, token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> (SessionManager, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let manager = SessionManager::new(RunStore::new(), Duration::from_secs(60), dir.path());
        (manager, dir)
    }

    #[test]
    fn create_registers_run_and_cancel_token() {
        let (manager, _dir) = manager();
        let (run, token) = manager.create("do a thing", None);
        assert!(!token.is_cancelled());
        assert!(manager.get_run(&run.run_id).is_some());
        assert_eq!(manager.cancel_token(&run.run_id).unwrap().is_cancelled(), false);
    }

    #[test]
    fn cancel_signals_the_run_token() {
        let (manager, _dir) = manager();
        let (run, token) = manager.create("do a thing", None);
        assert!(manager.cancel(&run.run_id));
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn request_hitl_then_submit_response_resolves_and_flips_status() {
        let (manager, _dir) = manager();
        let (run, _token) = manager.create("needs human input", None);
        let (info, rx) = manager.request_hitl(&run.run_id, "confirm", serde_json::json!({"q": "ok?"}));
        assert_eq!(manager.get_run(&run.run_id).unwrap().status, RunStatus::NeedsResponse);

        manager.submit_response(&run.run_id, info.id, serde_json::json!({"approve": true})).unwrap();
        let decision = rx.await.unwrap();
        assert_eq!(decision.payload["approve"], true);
        assert_eq!(manager.get_run(&run.run_id).unwrap().status, RunStatus::Running);
    }

    #[test]
    fn submit_response_unknown_request_is_unknown_request_error() {
        let (manager, _dir) = manager();
        let (run, _token) = manager.create("task", None);
        let err = manager.submit_response(&run.run_id, Uuid::new_v4(), serde_json::json!({})).unwrap_err();
        assert!(matches!(err, Error::UnknownRequest(_)));
    }

    #[test]
    fn checkpoint_then_resume_rearms_cancellation() {
        let (manager, _dir) = manager();
        let (run, token) = manager.create("long task", None);
        token.cancel();
        manager.finish(&run.run_id, RunStatus::NeedsResponse, None, None);

        let checkpoint = Checkpoint {
            run_id: run.run_id.to_string(),
            task_text: "long task".into(),
            conversation_id: None,
            routing_decision: None,
            completed_outputs: Default::default(),
            pending_request: None,
            created_at: chrono::Utc::now(),
        };
        let checkpoint_id = manager.checkpoint(&checkpoint).unwrap();
        assert_eq!(manager.get_run(&run.run_id).unwrap().checkpoint_ref.as_deref(), Some(checkpoint_id.as_str()));

        let (loaded, new_token) = manager.resume(&checkpoint_id).unwrap();
        assert_eq!(loaded.task_text, "long task");
        assert!(!new_token.is_cancelled());
        assert_eq!(manager.get_run(&run.run_id).unwrap().status, RunStatus::Running);
    }
}
