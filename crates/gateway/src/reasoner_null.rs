//! `NullReasoner` — the concrete [`Reasoner`] type parameter used whenever
//! no reasoner artifact is configured. `ReasonerFacade<R>` already treats
//! `inner: None` as "no reasoner backend"; this type only exists so
//! `Supervisor<R>`/`AppState` have a concrete `R` to monomorphize over —
//! every method is unreachable in practice because the façade never calls
//! into `inner` when it is `None`.

use conductor_domain::error::{Error, Result};
use conductor_domain::reasoning::{ProgressVerdict, QualityVerdict, RoutingDecision, TaskAnalysis};
use conductor_reasoner::Reasoner;

#[derive(Debug, Clone, Copy, Default)]
pub struct NullReasoner;

#[async_trait::async_trait]
impl Reasoner for NullReasoner {
    async fn analyze_task(&self, _task_text: &str, _tool_universe: &[String]) -> Result<TaskAnalysis> {
        Err(Error::ReasonerUnavailable("no reasoner artifact configured".into()))
    }

    async fn route_task(
        &self,
        _task_text: &str,
        _analysis: &TaskAnalysis,
        _available_agents: &[String],
        _tool_universe: &[String],
    ) -> Result<RoutingDecision> {
        Err(Error::ReasonerUnavailable("no reasoner artifact configured".into()))
    }

    async fn evaluate_progress(
        &self,
        _task_text: &str,
        _outputs: &[(String, String)],
    ) -> Result<ProgressVerdict> {
        Err(Error::ReasonerUnavailable("no reasoner artifact configured".into()))
    }

    async fn assess_quality(&self, _task_text: &str, _final_output: &str) -> Result<QualityVerdict> {
        Err(Error::ReasonerUnavailable("no reasoner artifact configured".into()))
    }

    fn version(&self) -> &str {
        "null"
    }
}
