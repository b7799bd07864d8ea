//! Structured trace events emitted across all conductor crates.

use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    PhaseStarted {
        run_id: String,
        phase: String,
    },
    PhaseCompleted {
        run_id: String,
        phase: String,
        duration_ms: u64,
    },
    ReasonerAssertionFailed {
        run_id: String,
        phase: String,
        reason: String,
        retry_attempted: bool,
    },
    ReasonerFallbackUsed {
        run_id: String,
        phase: String,
        reason: String,
    },
    RoutingCacheHit {
        run_id: String,
        fingerprint: String,
    },
    RoutingCacheMiss {
        run_id: String,
        fingerprint: String,
    },
    ModeDowngraded {
        run_id: String,
        from: String,
        to: String,
        reason: String,
    },
    FastPathTaken {
        run_id: String,
    },
    ToolInvoked {
        run_id: String,
        agent_id: String,
        tool_name: String,
        duration_ms: u64,
        is_error: bool,
    },
    HitlRequested {
        run_id: String,
        request_id: String,
        kind: String,
    },
    HitlResolved {
        run_id: String,
        request_id: String,
    },
    RunCancelled {
        run_id: String,
    },
    RunTerminal {
        run_id: String,
        status: String,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "conductor_event");
    }
}
