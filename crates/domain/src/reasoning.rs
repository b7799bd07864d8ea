//! Reasoner input/output types — the typed boundary validated by the
//! Reasoner Façade (§3, §4.3).

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Simple,
    Medium,
    Complex,
}

/// Output of `Reasoner::analyze_task`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskAnalysis {
    pub complexity: Complexity,
    #[serde(default)]
    pub required_capabilities: BTreeSet<String>,
    #[serde(default)]
    pub recommended_tools: BTreeSet<String>,
    pub needs_web_search: bool,
    pub search_query: Option<String>,
    pub notes: Option<String>,
}

/// The execution topology chosen by routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    Delegated,
    Sequential,
    Parallel,
    Handoff,
    Discussion,
}

pub const ALLOWED_MODES: [ExecutionMode; 5] = [
    ExecutionMode::Delegated,
    ExecutionMode::Sequential,
    ExecutionMode::Parallel,
    ExecutionMode::Handoff,
    ExecutionMode::Discussion,
];

/// Output of `Reasoner::route_task`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingDecision {
    pub mode: ExecutionMode,
    pub assigned: Vec<String>,
    /// Aligned 1:1 with `assigned` (spec §3: "subtasks: list aligned with assigned").
    pub subtasks: Vec<String>,
    pub tool_requirements: BTreeMap<String, BTreeSet<String>>,
    pub confidence: f32,
}

impl RoutingDecision {
    /// Structural validation independent of runtime context (agent/tool
    /// universe membership is checked by the façade, which has that
    /// context). See §3 RoutingDecision invariants.
    pub fn validate_shape(&self, max_parallel_agents: usize) -> Result<()> {
        if self.assigned.is_empty() {
            return Err(Error::ReasonerAssertionFailed(
                "routing decision has empty `assigned` list".into(),
            ));
        }
        if self.assigned.len() != self.subtasks.len() {
            return Err(Error::ReasonerAssertionFailed(
                "routing `subtasks` must align 1:1 with `assigned`".into(),
            ));
        }
        if self.mode == ExecutionMode::Delegated && self.assigned.len() != 1 {
            return Err(Error::ReasonerAssertionFailed(
                "mode=delegated requires exactly one assigned agent".into(),
            ));
        }
        if self.assigned.len() > max_parallel_agents {
            return Err(Error::ReasonerAssertionFailed(format!(
                "assigned count {} exceeds maxParallelAgents {}",
                self.assigned.len(),
                max_parallel_agents
            )));
        }
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(Error::ReasonerAssertionFailed(
                "confidence must be within [0,1]".into(),
            ));
        }
        Ok(())
    }

    /// Normalization rule from §4.1 Routing phase: delegated with >1 agent
    /// is rewritten to parallel rather than rejected outright.
    pub fn normalize_mode(&mut self) {
        if self.mode == ExecutionMode::Delegated && self.assigned.len() > 1 {
            self.mode = ExecutionMode::Parallel;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressStatus {
    Complete,
    Refine,
    Continue,
}

/// Output of `Reasoner::evaluate_progress`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressVerdict {
    pub status: ProgressStatus,
    #[serde(default)]
    pub missing: Vec<String>,
    pub next_focus: Option<String>,
}

/// Output of `Reasoner::assess_quality`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityVerdict {
    pub score: f32,
    #[serde(default)]
    pub missing: Vec<String>,
    pub feedback: String,
    #[serde(default)]
    pub dimensions: BTreeMap<String, f32>,
}

impl QualityVerdict {
    pub fn fallback() -> Self {
        Self {
            score: 6.0,
            missing: Vec::new(),
            feedback: "fallback scoring".into(),
            dimensions: BTreeMap::new(),
        }
    }
}
