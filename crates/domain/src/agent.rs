//! AgentDescriptor — a named LLM-backed role (§3).

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Static description of an agent, loaded once from configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentDescriptor {
    pub name: String,
    pub model: String,
    pub temperature: f32,
    pub system_prompt: String,
    pub tools: BTreeSet<String>,
    pub timeout_ms: u64,
    pub max_tokens: Option<u32>,
    pub reasoning_effort: Option<String>,
}

impl AgentDescriptor {
    pub fn has_tool(&self, tool_name: &str) -> bool {
        self.tools.contains(tool_name)
    }
}
