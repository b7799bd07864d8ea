//! Sequential strategy (§4.4): iterate `assigned` in order, each agent
//! receiving prior agents' outputs as additional context. Cancellation is
//! observed between agents; any agent failure aborts the sequence.

use conductor_domain::error::Result;
use conductor_domain::task::{Message, Role};

use crate::{run_agent_turn, ExecutionContext, ExecutionResult, PerAgentOutcome, StrategyEvent};

pub async fn run_sequential(
    ctx: &ExecutionContext<'_>,
    on_event: &(dyn Fn(StrategyEvent) + Send + Sync),
) -> Result<ExecutionResult> {
    let mut context_messages: Vec<Message> = ctx.history.to_vec();
    let mut outcomes = Vec::with_capacity(ctx.decision.assigned.len());
    let mut last_output = String::new();

    for (i, agent_name) in ctx.decision.assigned.iter().enumerate() {
        if ctx.cancel.is_cancelled() {
            return Err(conductor_domain::error::Error::Cancelled);
        }

        let subtask = ctx.decision.subtasks.get(i).cloned().unwrap_or_else(|| ctx.task_text.to_string());
        let result = run_agent_turn(ctx, agent_name, &subtask, &context_messages, on_event).await?;

        context_messages.push(Message::new(Role::Assistant, result.output.clone()).with_agent(agent_name.clone()));
        last_output = result.output.clone();
        outcomes.push(PerAgentOutcome { agent_name: agent_name.clone(), result: Some(result), error: None });
    }

    Ok(ExecutionResult::from_outcomes(ctx.decision.assigned.clone(), outcomes, last_output))
}
