//! Execution phase (§4.1 step 3): drives `conductor_strategies::execute`,
//! synthesizing `AGENT_STARTED`/`AGENT_COMPLETED` framing around its
//! `{Delta, ToolCall}` event stream (the strategies crate never emits
//! lifecycle framing itself, see `conductor_strategies` module docs).

use std::collections::HashSet;
use std::time::Instant;

use chrono::Utc;
use conductor_agents::AgentTurnEvent;
use conductor_domain::event::{EventCategory, StreamEvent};
use conductor_domain::trace::TraceEvent;
use conductor_strategies::{execute, ExecutionContext, ExecutionResult, StrategyEvent};
use conductor_domain::error::Result;
use parking_lot::Mutex;

/// Subtask text for each assigned agent, aligned 1:1 with `decision.assigned`.
fn subtask_for<'a>(ctx: &'a ExecutionContext<'_>, agent_name: &str) -> &'a str {
    ctx.decision
        .assigned
        .iter()
        .position(|a| a == agent_name)
        .and_then(|i| ctx.decision.subtasks.get(i))
        .map(String::as_str)
        .unwrap_or(ctx.task_text)
}

pub async fn run(
    run_id: &str,
    ctx: &ExecutionContext<'_>,
    emit: &(dyn Fn(StreamEvent) + Send + Sync),
) -> Result<ExecutionResult> {
    let started_agents: Mutex<HashSet<String>> = Mutex::new(HashSet::new());
    let start_times: Mutex<std::collections::HashMap<String, Instant>> = Mutex::new(std::collections::HashMap::new());
    let accumulated: Mutex<std::collections::HashMap<String, String>> = Mutex::new(std::collections::HashMap::new());

    let on_strategy_event = |event: StrategyEvent| {
        let (agent_name, turn_event) = event;

        let mut started = started_agents.lock();
        if started.insert(agent_name.clone()) {
            start_times.lock().insert(agent_name.clone(), Instant::now());
            emit(StreamEvent::AgentStarted {
                timestamp: Utc::now(),
                category: EventCategory::Agent,
                ui_hint: None,
                agent_id: agent_name.clone(),
                subtask: subtask_for(ctx, &agent_name).to_string(),
                duration: None,
            });
        }
        drop(started);

        match turn_event {
            AgentTurnEvent::Delta(delta) => {
                let mut acc = accumulated.lock();
                let entry = acc.entry(agent_name.clone()).or_default();
                entry.push_str(&delta);
                let agent_accumulated = entry.clone();
                let total_accumulated: String =
                    ctx.decision.assigned.iter().filter_map(|a| acc.get(a)).cloned().collect::<Vec<_>>().join("\n");
                emit(StreamEvent::AgentDelta {
                    timestamp: Utc::now(),
                    category: EventCategory::Agent,
                    ui_hint: None,
                    agent_id: agent_name,
                    delta,
                    accumulated: total_accumulated,
                    agent_accumulated,
                });
            }
            AgentTurnEvent::ToolCall(call) => {
                TraceEvent::ToolInvoked {
                    run_id: run_id.to_string(),
                    agent_id: agent_name.clone(),
                    tool_name: call.tool_name.clone(),
                    duration_ms: call.duration_ms,
                    is_error: call.error.is_some(),
                }
                .emit();
                emit(StreamEvent::ToolCall {
                    timestamp: Utc::now(),
                    category: EventCategory::Tool,
                    ui_hint: None,
                    agent_id: agent_name,
                    tool_name: call.tool_name,
                    input: call.input,
                    output_summary: call.output_summary,
                    duration_ms: call.duration_ms,
                });
            }
        }
    };

    let result = execute(ctx, &on_strategy_event).await?;

    for agent_name in &result.agent_order {
        let duration = result.per_agent.get(agent_name).map(|r| r.duration_ms);
        emit(StreamEvent::AgentCompleted {
            timestamp: Utc::now(),
            category: EventCategory::Agent,
            ui_hint: None,
            agent_id: agent_name.clone(),
            subtask: subtask_for(ctx, agent_name).to_string(),
            duration,
        });
    }

    // Agents that received an AGENT_STARTED but aren't in `agent_order` (the
    // Parallel-mode synthesis turn run by `ctx.default_agent`, never one of
    // `decision.assigned` unless it happens to coincide) still need a
    // matching AGENT_COMPLETED — every STARTED must be framed by exactly one
    // COMPLETED.
    let ordered: HashSet<&String> = result.agent_order.iter().collect();
    let starts = start_times.lock();
    for agent_name in started_agents.lock().iter() {
        if ordered.contains(agent_name) {
            continue;
        }
        let duration = starts.get(agent_name).map(|start| start.elapsed().as_millis() as u64);
        emit(StreamEvent::AgentCompleted {
            timestamp: Utc::now(),
            category: EventCategory::Agent,
            ui_hint: None,
            agent_id: agent_name.clone(),
            subtask: subtask_for(ctx, agent_name).to_string(),
            duration,
        });
    }

    Ok(result)
}
