//! Quality phase (§4.1 step 5): score the final synthesized output and
//! emit the `QUALITY` event. The reasoning trace (when one is available)
//! is surfaced as `REASONING_COMPLETED` ahead of it.

use chrono::Utc;
use conductor_domain::event::{EventCategory, StreamEvent};
use conductor_domain::reasoning::QualityVerdict;
use conductor_reasoner::{Reasoner, ReasonerFacade};

pub async fn run<R: Reasoner>(
    reasoner: &ReasonerFacade<R>,
    run_id: &str,
    task_text: &str,
    final_output: &str,
    reasoning_trace: Option<String>,
    emit: &(dyn Fn(StreamEvent) + Send + Sync),
) -> QualityVerdict {
    if let Some(reasoning) = reasoning_trace {
        emit(StreamEvent::ReasoningCompleted {
            timestamp: Utc::now(),
            category: EventCategory::Reasoning,
            ui_hint: None,
            reasoning,
            agent_id: None,
        });
    }

    let verdict = reasoner.assess_quality(run_id, task_text, final_output).await;

    emit(StreamEvent::Quality {
        timestamp: Utc::now(),
        category: EventCategory::Quality,
        ui_hint: None,
        verdict: verdict.clone(),
    });

    verdict
}
