//! Gateway application state (grounded on the teacher's `gateway::state::AppState`:
//! one `#[derive(Clone)]` struct of `Arc<...>` fields, grouped by concern).

use std::collections::HashMap;
use std::sync::Arc;

use conductor_domain::config::Config;
use conductor_domain::event::StreamEvent;
use conductor_sessions::SessionManager;
use conductor_supervisor::Supervisor;
use parking_lot::RwLock;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::reasoner_null::NullReasoner;

/// Per-run fan-out of the `Supervisor::run` synchronous `emit` callback
/// into the async WS/SSE consumers (§6.1). One broadcast channel per
/// in-flight run; created when the run is spawned, dropped once it
/// terminates. Supplements the already-built crates, which have no
/// broadcast mechanism of their own (`conductor_domain::run::RunStore`
/// is a plain snapshot store).
#[derive(Clone, Default)]
pub struct RunEventRegistry {
    senders: Arc<RwLock<HashMap<Uuid, broadcast::Sender<StreamEvent>>>>,
}

impl RunEventRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a fan-out channel for `run_id`. Called once, before the run
    /// is spawned, so subscribers racing the spawn never miss it.
    pub fn create(&self, run_id: Uuid, capacity: usize) -> broadcast::Sender<StreamEvent> {
        let (tx, _rx) = broadcast::channel(capacity);
        self.senders.write().insert(run_id, tx.clone());
        tx
    }

    pub fn subscribe(&self, run_id: &Uuid) -> Option<broadcast::Receiver<StreamEvent>> {
        self.senders.read().get(run_id).map(|tx| tx.subscribe())
    }

    /// Emit an out-of-band event into a run's stream (used by tools that
    /// need to surface a `REQUEST` mid-turn, outside the supervisor's own
    /// `emit` callback).
    pub fn emit(&self, run_id: &Uuid, event: StreamEvent) {
        if let Some(tx) = self.senders.read().get(run_id) {
            let _ = tx.send(event);
        }
    }

    pub fn remove(&self, run_id: &Uuid) {
        self.senders.write().remove(run_id);
    }
}

/// The monomorphic Supervisor type this gateway drives. No reasoner
/// artifact loader is in scope, so `ReasonerFacade::new(None, ...)` is
/// always constructed with a concrete-but-unreachable `NullReasoner` —
/// every call the façade would make into it is already short-circuited
/// by the `inner.is_none()` fallback path.
pub type AppSupervisor = Supervisor<NullReasoner>;

#[derive(Clone)]
pub struct AppState {
    // ── Core services ────────────────────────────────────────────
    pub config: Arc<Config>,
    pub supervisor: Arc<AppSupervisor>,

    // ── Session / run lifecycle ──────────────────────────────────
    pub session_manager: Arc<SessionManager>,
    pub run_events: RunEventRegistry,

    // ── Security ──────────────────────────────────────────────────
    /// SHA-256 digest of the configured admin bearer token, compared in
    /// constant time (teacher's `api::auth::require_api_token` idiom).
    /// `None` means admin auth is disabled (dev mode).
    pub admin_token_hash: Option<Vec<u8>>,
}
