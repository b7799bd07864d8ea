//! Routing phase (§4.1 step 2): fingerprint, consult the Routing Cache,
//! call the reasoner on miss, normalize the decision, and ensure a
//! web-search-capable agent is assigned for time-sensitive tasks.

use std::collections::BTreeSet;
use std::time::Duration;

use conductor_agents::AgentRegistry;
use conductor_cache::{fingerprint, RoutingCache};
use conductor_domain::event::{OrchestratorKind, PhaseStatus, StreamEvent};
use conductor_domain::reasoning::{RoutingDecision, TaskAnalysis};
use conductor_domain::trace::TraceEvent;
use conductor_reasoner::{fallback::is_time_sensitive, Reasoner, ReasonerFacade};
use conductor_tools::ToolRegistry;

use super::orchestrator_message;

#[allow(clippy::too_many_arguments)]
pub async fn run<R: Reasoner>(
    reasoner: &ReasonerFacade<R>,
    cache: &RoutingCache,
    run_id: &str,
    task_text: &str,
    analysis: &TaskAnalysis,
    agent_registry: &AgentRegistry,
    tool_registry: &ToolRegistry,
    max_parallel_agents: usize,
    recent_year_threshold: u32,
    cache_ttl_ms: u64,
    routing_config_version: &str,
    emit: &(dyn Fn(StreamEvent) + Send + Sync),
) -> RoutingDecision {
    emit(orchestrator_message(OrchestratorKind::Routing, Some(PhaseStatus::Started), None));

    let available_agents: Vec<String> = agent_registry.list().into_iter().map(String::from).collect();
    let tool_universe = tool_registry.tool_names();
    let configured_agents: BTreeSet<String> = available_agents.iter().cloned().collect();
    let registry_tools: BTreeSet<String> = tool_universe.iter().cloned().collect();

    let fp = fingerprint(task_text, &tool_universe, reasoner.version(), routing_config_version);

    let mut decision = if let Some(cached) = cache.get(&fp) {
        TraceEvent::RoutingCacheHit { run_id: run_id.to_string(), fingerprint: fp.clone() }.emit();
        emit(orchestrator_message(
            OrchestratorKind::Routing,
            Some(PhaseStatus::Cached),
            serde_json::to_value(&cached).ok(),
        ));
        cached
    } else {
        TraceEvent::RoutingCacheMiss { run_id: run_id.to_string(), fingerprint: fp.clone() }.emit();
        let (decision, used_fallback) = reasoner
            .route_task(
                run_id,
                task_text,
                analysis,
                &available_agents,
                &tool_universe,
                &configured_agents,
                max_parallel_agents,
                |agent_name| agent_registry.allowed_tools(agent_name).into_iter().collect(),
                &registry_tools,
            )
            .await;
        cache.put(fp, decision.clone(), Duration::from_millis(cache_ttl_ms));
        let status = if used_fallback { PhaseStatus::Fallback } else { PhaseStatus::Completed };
        emit(orchestrator_message(OrchestratorKind::Routing, Some(status), serde_json::to_value(&decision).ok()));
        decision
    };

    ensure_web_search_agent(&mut decision, task_text, recent_year_threshold, agent_registry, tool_registry);
    let mode_before = decision.mode;
    decision.normalize_mode();
    if decision.mode != mode_before {
        TraceEvent::ModeDowngraded {
            run_id: run_id.to_string(),
            from: format!("{mode_before:?}"),
            to: format!("{:?}", decision.mode),
            reason: "more than one agent assigned to a delegated-mode decision".into(),
        }
        .emit();
    }

    decision
}

/// §4.1 Routing normalization: if the task is time-sensitive and a
/// web-search-capable tool is available, make sure some assigned agent
/// can reach it and that its subtask says so.
fn ensure_web_search_agent(
    decision: &mut RoutingDecision,
    task_text: &str,
    recent_year_threshold: u32,
    agent_registry: &AgentRegistry,
    tool_registry: &ToolRegistry,
) {
    if !is_time_sensitive(task_text, recent_year_threshold) {
        return;
    }
    let web_search_tools = tool_registry.by_capability("web_search");
    let Some(search_tool) = web_search_tools.first() else {
        return;
    };

    let already_assigned = decision
        .assigned
        .iter()
        .any(|agent| agent_registry.allowed_tools(agent).iter().any(|t| t == search_tool));
    if already_assigned {
        return;
    }

    let Some(capable_agent) = decision
        .assigned
        .iter()
        .chain(agent_registry.list())
        .find(|agent| agent_registry.allowed_tools(agent).iter().any(|t| t == search_tool))
        .cloned()
    else {
        return;
    };

    if !decision.assigned.iter().any(|a| a == &capable_agent) {
        decision.assigned.push(capable_agent.clone());
        decision.subtasks.push(format!("search for up-to-date information using {search_tool}"));
    } else if let Some(idx) = decision.assigned.iter().position(|a| a == &capable_agent) {
        if let Some(subtask) = decision.subtasks.get_mut(idx) {
            if !subtask.contains(search_tool) {
                subtask.push_str(&format!(" (use {search_tool} for current information)"));
            }
        }
    }
}
