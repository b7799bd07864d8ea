//! Parallel strategy (§4.4): run all assigned agents concurrently, then
//! synthesize their outputs in `agentOrder` — never completion order —
//! via a lightweight synthesis turn run by the default agent (`writer`).

use futures_util::future::join_all;

use conductor_domain::error::{Error, Result};

use crate::{run_agent_turn, ExecutionContext, ExecutionResult, PerAgentOutcome, StrategyEvent};

pub async fn run_parallel(
    ctx: &ExecutionContext<'_>,
    on_event: &(dyn Fn(StrategyEvent) + Send + Sync),
) -> Result<ExecutionResult> {
    let futures = ctx.decision.assigned.iter().enumerate().map(|(i, agent_name)| {
        let subtask = ctx.decision.subtasks.get(i).cloned().unwrap_or_else(|| ctx.task_text.to_string());
        async move {
            let result = run_agent_turn(ctx, agent_name, &subtask, ctx.history, on_event).await;
            (agent_name.clone(), result)
        }
    });

    // join_all resolves in input order regardless of which future actually
    // completes first; that is what keeps synthesis deterministic by
    // `agentOrder` rather than wall-clock completion (§5).
    let results = join_all(futures).await;

    let mut outcomes = Vec::with_capacity(results.len());
    for (agent_name, result) in results {
        match result {
            Ok(r) => outcomes.push(PerAgentOutcome { agent_name, result: Some(r), error: None }),
            Err(e) => {
                tracing::warn!(agent = %agent_name, error = %e, "agent failed in parallel group");
                outcomes.push(PerAgentOutcome { agent_name, result: None, error: Some(e.to_string()) })
            }
        }
    }

    if outcomes.iter().all(|o| o.result.is_none()) {
        return Err(Error::AgentFailure {
            agent_name: ctx.decision.assigned.join(","),
            message: "all agents in the parallel group failed".into(),
        });
    }

    let synthesized_output = synthesize(ctx, &outcomes, on_event).await?;
    Ok(ExecutionResult::from_outcomes(ctx.decision.assigned.clone(), outcomes, synthesized_output))
}

async fn synthesize(
    ctx: &ExecutionContext<'_>,
    outcomes: &[PerAgentOutcome],
    on_event: &(dyn Fn(StrategyEvent) + Send + Sync),
) -> Result<String> {
    let mut sections = Vec::new();
    let mut missing = Vec::new();
    for outcome in outcomes {
        match &outcome.result {
            Some(result) => sections.push(format!("## {}\n\n{}", outcome.agent_name, result.output)),
            None => missing.push(outcome.agent_name.clone()),
        }
    }

    let mut subtask = format!(
        "Combine the following independent agent outputs into a single coherent response to: {}\n\n{}",
        ctx.task_text,
        sections.join("\n\n")
    );
    if !missing.is_empty() {
        subtask.push_str(&format!(
            "\n\nNote: the following agents produced no output and must be listed as missing: {}",
            missing.join(", ")
        ));
    }

    let result = run_agent_turn(ctx, ctx.default_agent, &subtask, &[], on_event).await?;
    Ok(result.output)
}
