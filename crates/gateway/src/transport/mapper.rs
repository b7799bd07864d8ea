//! Event Mapper — turns a `StreamEvent` into the wire shapes each
//! transport needs. Kept as a small dispatch table rather than the obvious
//! one giant `match` duplicated in `ws.rs` and `sse.rs`.

use conductor_domain::event::StreamEvent;

/// The SSE `event:` field name for a given `StreamEvent` variant. WS
/// frames carry the same information inline via serde's `#[serde(tag =
/// "type")]` on `StreamEvent` itself, so only SSE needs this separately.
pub fn sse_event_name(event: &StreamEvent) -> &'static str {
    match event {
        StreamEvent::WorkflowStatus { .. } => "workflow_status",
        StreamEvent::OrchestratorMessage { .. } => "orchestrator_message",
        StreamEvent::ReasoningCompleted { .. } => "reasoning_completed",
        StreamEvent::AgentStarted { .. } => "agent_started",
        StreamEvent::AgentCompleted { .. } => "agent_completed",
        StreamEvent::AgentDelta { .. } => "agent_delta",
        StreamEvent::ToolCall { .. } => "tool_call",
        StreamEvent::Quality { .. } => "quality",
        StreamEvent::Request { .. } => "request",
        StreamEvent::WorkflowOutput { .. } => "workflow_output",
        StreamEvent::Error { .. } => "error",
    }
}

/// Serialize a `StreamEvent` to its wire JSON string. Both transports
/// share this — the WS frame body and the SSE `data:` payload are
/// byte-identical.
pub fn to_json_string(event: &StreamEvent) -> String {
    serde_json::to_string(event).unwrap_or_else(|_| {
        serde_json::json!({
            "type": "ERROR",
            "code": "internal",
            "message": "failed to serialize event",
        })
        .to_string()
    })
}
