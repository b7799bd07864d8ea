//! Progress phase (§4.1 step 4): ask the reasoner whether the assembled
//! per-agent outputs satisfy the task, driving the refinement loop.
//!
//! Progress verdicts are loop-control only — no `ORCHESTRATOR_MESSAGE` is
//! emitted for this phase, since `missing`/`next_focus` are consumed
//! internally by the state machine rather than surfaced to the caller.

use conductor_domain::reasoning::ProgressVerdict;
use conductor_reasoner::{Reasoner, ReasonerFacade};

pub async fn run<R: Reasoner>(
    reasoner: &ReasonerFacade<R>,
    run_id: &str,
    task_text: &str,
    outputs: &[(String, String)],
) -> ProgressVerdict {
    reasoner.evaluate_progress(run_id, task_text, outputs).await
}
