//! HITL request/response correlation (§4.2, §4.8 "HITL protocol").
//!
//! Generalized from the teacher's `runtime::approval::ApprovalStore` (which
//! gated only dangerous exec commands behind a fixed approve/deny decision)
//! to an arbitrary `{kind, payload}` request answered by an arbitrary JSON
//! payload, matching `REQUEST{requestId, kind, payload}` / `{type=response,
//! requestId, payload}` in the spec's event/client-frame model.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use conductor_domain::error::{Error, Result};
use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::oneshot;
use uuid::Uuid;

/// The human's (or automated approver's) response to a pending request.
#[derive(Debug, Clone)]
pub struct HitlDecision {
    pub payload: serde_json::Value,
}

/// A pending HITL request awaiting a client response.
pub struct PendingRequest {
    pub id: Uuid,
    pub run_id: String,
    pub kind: String,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub respond: oneshot::Sender<HitlDecision>,
}

/// Serializable snapshot of a pending request, for the `REQUEST` stream
/// event and admin introspection.
#[derive(Debug, Clone, Serialize)]
pub struct RequestInfo {
    pub id: Uuid,
    pub run_id: String,
    pub kind: String,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl From<&PendingRequest> for RequestInfo {
    fn from(p: &PendingRequest) -> Self {
        Self { id: p.id, run_id: p.run_id.clone(), kind: p.kind.clone(), payload: p.payload.clone(), created_at: p.created_at }
    }
}

/// Thread-safe store of in-flight HITL requests, one `oneshot` per request
/// unblocking the suspended agent/tool call that raised it.
pub struct HitlStore {
    pending: RwLock<HashMap<Uuid, PendingRequest>>,
    timeout: Duration,
}

impl HitlStore {
    pub fn new(timeout: Duration) -> Self {
        Self { pending: RwLock::new(HashMap::new()), timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Register a new pending request. Returns the serializable snapshot
    /// to carry in the `REQUEST` stream event.
    pub fn insert(&self, request: PendingRequest) -> RequestInfo {
        let info = RequestInfo::from(&request);
        self.pending.write().insert(request.id, request);
        info
    }

    /// Resolve a pending request scoped to `run_id`. Returns
    /// `Error::UnknownRequest` if no matching pending request exists —
    /// this never affects the run otherwise (§7 error taxonomy).
    pub fn resolve(&self, run_id: &str, request_id: Uuid, payload: serde_json::Value) -> Result<()> {
        let mut pending = self.pending.write();
        let Some(request) = pending.get(&request_id) else {
            return Err(Error::UnknownRequest(request_id.to_string()));
        };
        if request.run_id != run_id {
            return Err(Error::UnknownRequest(request_id.to_string()));
        }
        let request = pending.remove(&request_id).expect("checked above");
        let _ = request.respond.send(HitlDecision { payload });
        Ok(())
    }

    /// Drop an expired request without resolving it (the waiting agent
    /// turn observes the closed channel and treats it as a failure).
    pub fn remove_expired(&self, request_id: &Uuid) {
        self.pending.write().remove(request_id);
    }

    pub fn list_pending(&self, run_id: Option<&str>) -> Vec<RequestInfo> {
        self.pending
            .read()
            .values()
            .filter(|p| run_id.map(|r| p.run_id == r).unwrap_or(true))
            .map(RequestInfo::from)
            .collect()
    }
}
