//! Execution Strategies (§4.4) — Delegated, Sequential, Parallel. Each
//! strategy consumes a `RoutingDecision`'s `{assigned, subtasks,
//! toolRequirements}` and drives the Agent Runner per-agent, returning a
//! deterministic `ExecutionResult`.
//!
//! `handoff` and `discussion` are part of the closed `ExecutionMode` set
//! the Reasoner may emit, but neither has a distinct runtime strategy here;
//! both are normalized to `sequential` at the dispatch boundary in
//! [`execute`] (see `SPEC_FULL.md` §4.4).

mod delegated;
mod parallel;
mod sequential;

pub use delegated::run_delegated;
pub use parallel::run_parallel;
pub use sequential::run_sequential;

use std::collections::HashMap;

use conductor_agents::{AgentRegistry, AgentRunner, AgentTurnEvent, PerAgentResult};
use conductor_domain::error::Result;
use conductor_domain::reasoning::{ExecutionMode, RoutingDecision};
use conductor_domain::task::Message;
use tokio_util::sync::CancellationToken;

/// Shared inputs every strategy needs to run its assigned agents.
pub struct ExecutionContext<'a> {
    pub runner: &'a AgentRunner,
    pub registry: &'a AgentRegistry,
    pub decision: &'a RoutingDecision,
    pub history: &'a [Message],
    pub cancel: &'a CancellationToken,
    pub default_agent: &'a str,
    /// The original task text, used as a subtask fallback when the
    /// routing decision assigned no per-agent subtasks.
    pub task_text: &'a str,
}

/// The outcome of a single agent within a strategy run; `error` is set
/// instead of `result` when the agent's turn failed (Parallel's partial
/// failure policy; Sequential/Delegated propagate the error instead).
pub struct PerAgentOutcome {
    pub agent_name: String,
    pub result: Option<PerAgentResult>,
    pub error: Option<String>,
}

/// Result of running a strategy (§4.4's `ExecutionResult`).
pub struct ExecutionResult {
    /// The order agents were assigned in, preserved verbatim from the
    /// `RoutingDecision` — synthesis and event framing both follow this
    /// order, never wall-clock completion order.
    pub agent_order: Vec<String>,
    pub outputs: HashMap<String, String>,
    pub per_agent: HashMap<String, PerAgentResult>,
    pub synthesized_output: String,
    /// Agents that failed and were excluded from synthesis (Parallel only).
    pub missing: Vec<String>,
}

impl ExecutionResult {
    fn from_outcomes(agent_order: Vec<String>, outcomes: Vec<PerAgentOutcome>, synthesized_output: String) -> Self {
        let mut outputs = HashMap::with_capacity(outcomes.len());
        let mut per_agent = HashMap::with_capacity(outcomes.len());
        let mut missing = Vec::new();
        for outcome in outcomes {
            match outcome.result {
                Some(result) => {
                    outputs.insert(outcome.agent_name.clone(), result.output.clone());
                    per_agent.insert(outcome.agent_name, result);
                }
                None => missing.push(outcome.agent_name),
            }
        }
        Self { agent_order, outputs, per_agent, synthesized_output, missing }
    }
}

/// An agent's event during a strategy run, tagged with the emitting agent
/// so the caller can frame `AGENT_STARTED`/`AGENT_DELTA`/`AGENT_COMPLETED`
/// correctly even when agents run concurrently (Parallel mode).
pub type StrategyEvent = (String, AgentTurnEvent);

/// Look up the agent's descriptor and effective (policy-narrowed) tool
/// set, then run its turn, tagging emitted events with the agent's name.
pub(crate) async fn run_agent_turn(
    ctx: &ExecutionContext<'_>,
    agent_name: &str,
    subtask: &str,
    history: &[Message],
    on_event: &(dyn Fn(StrategyEvent) + Send + Sync),
) -> Result<PerAgentResult> {
    let descriptor = ctx.registry.get(agent_name).ok_or_else(|| {
        conductor_domain::error::Error::AgentFailure {
            agent_name: agent_name.to_string(),
            message: "agent not found in registry".into(),
        }
    })?;
    let allowed_tools = ctx.registry.allowed_tools(agent_name);
    ctx.runner
        .run(descriptor, subtask, history, &allowed_tools, ctx.cancel, |event| {
            on_event((agent_name.to_string(), event))
        })
        .await
}

/// Dispatch by normalized execution mode. `Handoff` and `Discussion`
/// fall through to `Sequential` — see module docs.
pub async fn execute(
    ctx: &ExecutionContext<'_>,
    on_event: &(dyn Fn(StrategyEvent) + Send + Sync),
) -> Result<ExecutionResult> {
    match ctx.decision.mode {
        ExecutionMode::Delegated => run_delegated(ctx, on_event).await,
        ExecutionMode::Parallel => run_parallel(ctx, on_event).await,
        ExecutionMode::Sequential | ExecutionMode::Handoff | ExecutionMode::Discussion => {
            run_sequential(ctx, on_event).await
        }
    }
}
