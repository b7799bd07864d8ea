//! ToolDescriptor and tool invocation types (§3, §4.5).

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Relative cost hint used by routing and scheduling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LatencyHint {
    Low,
    Medium,
    High,
}

/// Static description of a registered tool, minus its invoker (the invoker
/// lives behind `conductor_tools::registry::Invoker`, not in the domain
/// model, matching the teacher's separation of descriptor vs. provider).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    #[serde(default)]
    pub aliases: BTreeSet<String>,
    pub capabilities: BTreeSet<String>,
    pub latency_hint: LatencyHint,
    pub result_ttl_ms: Option<u64>,
    pub schema_ref: String,
}

/// The minimal shape the Reasoner sees for routing (§4.5 `describe()`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSummary {
    pub name: String,
    pub capabilities: BTreeSet<String>,
    pub latency_hint: LatencyHint,
    pub result_ttl_ms: Option<u64>,
}

impl From<&ToolDescriptor> for ToolSummary {
    fn from(d: &ToolDescriptor) -> Self {
        Self {
            name: d.name.clone(),
            capabilities: d.capabilities.clone(),
            latency_hint: d.latency_hint,
            result_ttl_ms: d.result_ttl_ms,
        }
    }
}

/// A single tool invocation made by an agent during a turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub tool_name: String,
    pub input: serde_json::Value,
    pub output_summary: String,
    pub duration_ms: u64,
    pub error: Option<String>,
}
