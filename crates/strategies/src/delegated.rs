//! Delegated strategy (§4.4): run `assigned[0]` once.

use conductor_domain::error::Result;

use crate::{run_agent_turn, ExecutionContext, ExecutionResult, PerAgentOutcome, StrategyEvent};

pub async fn run_delegated(
    ctx: &ExecutionContext<'_>,
    on_event: &(dyn Fn(StrategyEvent) + Send + Sync),
) -> Result<ExecutionResult> {
    let agent_name = ctx
        .decision
        .assigned
        .first()
        .cloned()
        .unwrap_or_else(|| ctx.default_agent.to_string());
    let subtask = ctx.decision.subtasks.first().cloned().unwrap_or_else(|| ctx.task_text.to_string());

    let result = run_agent_turn(ctx, &agent_name, &subtask, ctx.history, on_event).await?;
    let synthesized_output = result.output.clone();
    let outcome = PerAgentOutcome { agent_name: agent_name.clone(), result: Some(result), error: None };

    Ok(ExecutionResult::from_outcomes(vec![agent_name], vec![outcome], synthesized_output))
}
