//! Analysis phase (§4.1 step 1).

use conductor_domain::event::{OrchestratorKind, PhaseStatus, StreamEvent};
use conductor_domain::reasoning::TaskAnalysis;
use conductor_reasoner::{Reasoner, ReasonerFacade};

use super::orchestrator_message;

pub async fn run<R: Reasoner>(
    reasoner: &ReasonerFacade<R>,
    run_id: &str,
    task_text: &str,
    tool_universe: &[String],
    emit: &(dyn Fn(StreamEvent) + Send + Sync),
) -> TaskAnalysis {
    emit(orchestrator_message(OrchestratorKind::Analysis, Some(PhaseStatus::Started), None));

    let (analysis, used_fallback) = reasoner.analyze_task(run_id, task_text, tool_universe).await;

    let status = if used_fallback { PhaseStatus::Fallback } else { PhaseStatus::Completed };
    let data = serde_json::to_value(&analysis).ok();
    emit(orchestrator_message(OrchestratorKind::Analysis, Some(status), data));

    analysis
}
