//! StreamEvent — the closed tagged union emitted per run (§6.2).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::reasoning::QualityVerdict;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventCategory {
    Lifecycle,
    Reasoning,
    Agent,
    Tool,
    Quality,
    Request,
    Terminal,
}

/// Optional UI routing hint, carried through without interpretation.
pub type UiHint = Option<String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WorkflowState {
    InProgress,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrchestratorKind {
    Analysis,
    Routing,
    Progress,
    Quality,
    Request,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhaseStatus {
    Started,
    Completed,
    Fallback,
    Cached,
}

/// Every event carries `{type, timestamp, category, uiHint?}` plus
/// type-specific fields (§6.2). The common envelope fields are flattened
/// into each variant rather than wrapped, matching the teacher's
/// single-level `#[serde(tag = "type")]` convention in `stream.rs`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum StreamEvent {
    #[serde(rename = "WORKFLOW_STATUS")]
    WorkflowStatus {
        timestamp: DateTime<Utc>,
        category: EventCategory,
        ui_hint: UiHint,
        state: WorkflowState,
        workflow_id: Uuid,
        message: String,
    },

    #[serde(rename = "ORCHESTRATOR_MESSAGE")]
    OrchestratorMessage {
        timestamp: DateTime<Utc>,
        category: EventCategory,
        ui_hint: UiHint,
        kind: OrchestratorKind,
        status: Option<PhaseStatus>,
        data: Option<serde_json::Value>,
    },

    #[serde(rename = "REASONING_COMPLETED")]
    ReasoningCompleted {
        timestamp: DateTime<Utc>,
        category: EventCategory,
        ui_hint: UiHint,
        reasoning: String,
        agent_id: Option<String>,
    },

    #[serde(rename = "AGENT_STARTED")]
    AgentStarted {
        timestamp: DateTime<Utc>,
        category: EventCategory,
        ui_hint: UiHint,
        agent_id: String,
        subtask: String,
        duration: Option<u64>,
    },

    #[serde(rename = "AGENT_COMPLETED")]
    AgentCompleted {
        timestamp: DateTime<Utc>,
        category: EventCategory,
        ui_hint: UiHint,
        agent_id: String,
        subtask: String,
        duration: Option<u64>,
    },

    #[serde(rename = "AGENT_DELTA")]
    AgentDelta {
        timestamp: DateTime<Utc>,
        category: EventCategory,
        ui_hint: UiHint,
        agent_id: String,
        delta: String,
        accumulated: String,
        agent_accumulated: String,
    },

    #[serde(rename = "TOOL_CALL")]
    ToolCall {
        timestamp: DateTime<Utc>,
        category: EventCategory,
        ui_hint: UiHint,
        agent_id: String,
        tool_name: String,
        input: serde_json::Value,
        output_summary: String,
        duration_ms: u64,
    },

    #[serde(rename = "QUALITY")]
    Quality {
        timestamp: DateTime<Utc>,
        category: EventCategory,
        ui_hint: UiHint,
        #[serde(flatten)]
        verdict: QualityVerdict,
    },

    #[serde(rename = "REQUEST")]
    Request {
        timestamp: DateTime<Utc>,
        category: EventCategory,
        ui_hint: UiHint,
        request_id: Uuid,
        kind: String,
        payload: serde_json::Value,
    },

    #[serde(rename = "WORKFLOW_OUTPUT")]
    WorkflowOutput {
        timestamp: DateTime<Utc>,
        category: EventCategory,
        ui_hint: UiHint,
        result: String,
        quality: Option<QualityVerdict>,
        run_id: Uuid,
        durations: serde_json::Value,
    },

    #[serde(rename = "ERROR")]
    Error {
        timestamp: DateTime<Utc>,
        category: EventCategory,
        ui_hint: UiHint,
        code: String,
        message: String,
        phase: Option<String>,
    },
}

impl StreamEvent {
    /// Terminal events are `WORKFLOW_OUTPUT` and `ERROR` (§4.1, §6.2).
    /// Exactly one is emitted per run, and nothing follows it.
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::WorkflowOutput { .. } | StreamEvent::Error { .. })
    }

    pub fn category(&self) -> EventCategory {
        match self {
            StreamEvent::WorkflowStatus { category, .. }
            | StreamEvent::OrchestratorMessage { category, .. }
            | StreamEvent::ReasoningCompleted { category, .. }
            | StreamEvent::AgentStarted { category, .. }
            | StreamEvent::AgentCompleted { category, .. }
            | StreamEvent::AgentDelta { category, .. }
            | StreamEvent::ToolCall { category, .. }
            | StreamEvent::Quality { category, .. }
            | StreamEvent::Request { category, .. }
            | StreamEvent::WorkflowOutput { category, .. }
            | StreamEvent::Error { category, .. } => *category,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workflow_output_and_error_are_terminal() {
        let out = StreamEvent::WorkflowOutput {
            timestamp: Utc::now(),
            category: EventCategory::Terminal,
            ui_hint: None,
            result: "ok".into(),
            quality: None,
            run_id: Uuid::new_v4(),
            durations: serde_json::json!({}),
        };
        assert!(out.is_terminal());

        let err = StreamEvent::Error {
            timestamp: Utc::now(),
            category: EventCategory::Terminal,
            ui_hint: None,
            code: "internal".into(),
            message: "boom".into(),
            phase: None,
        };
        assert!(err.is_terminal());
    }

    #[test]
    fn agent_delta_is_not_terminal() {
        let delta = StreamEvent::AgentDelta {
            timestamp: Utc::now(),
            category: EventCategory::Agent,
            ui_hint: None,
            agent_id: "writer".into(),
            delta: "hi".into(),
            accumulated: "hi".into(),
            agent_accumulated: "hi".into(),
        };
        assert!(!delta.is_terminal());
    }

    #[test]
    fn serializes_with_tag_field() {
        let err = StreamEvent::Error {
            timestamp: Utc::now(),
            category: EventCategory::Terminal,
            ui_hint: None,
            code: "timeout".into(),
            message: "ran out of time".into(),
            phase: Some("execution".into()),
        };
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["type"], "ERROR");
        assert_eq!(json["code"], "timeout");
    }
}
