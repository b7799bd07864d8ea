pub mod analysis;
pub mod execution;
pub mod progress;
pub mod quality;
pub mod routing;

use chrono::Utc;
use conductor_domain::event::{EventCategory, OrchestratorKind, PhaseStatus, StreamEvent};

/// Build an `ORCHESTRATOR_MESSAGE` frame for a given phase (§4.1, §6.2).
pub(crate) fn orchestrator_message(
    kind: OrchestratorKind,
    status: Option<PhaseStatus>,
    data: Option<serde_json::Value>,
) -> StreamEvent {
    StreamEvent::OrchestratorMessage {
        timestamp: Utc::now(),
        category: EventCategory::Reasoning,
        ui_hint: None,
        kind,
        status,
        data,
    }
}
