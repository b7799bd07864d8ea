//! Reasoner Façade (§4.3) — typed boundary around the external
//! structured-reasoning collaborator, with assertions and fallback.

use std::collections::BTreeSet;

use conductor_domain::error::Result;
use conductor_domain::reasoning::{ProgressVerdict, QualityVerdict, RoutingDecision, TaskAnalysis};
use conductor_domain::trace::TraceEvent;

use crate::fallback;

/// The four typed operations the external reasoner provides. Concrete
/// implementations wrap the pre-compiled reasoner artifact; this crate
/// never loads or trains one (§1 Non-goals).
#[async_trait::async_trait]
pub trait Reasoner: Send + Sync {
    async fn analyze_task(&self, task_text: &str, tool_universe: &[String]) -> Result<TaskAnalysis>;

    async fn route_task(
        &self,
        task_text: &str,
        analysis: &TaskAnalysis,
        available_agents: &[String],
        tool_universe: &[String],
    ) -> Result<RoutingDecision>;

    async fn evaluate_progress(&self, task_text: &str, outputs: &[(String, String)]) -> Result<ProgressVerdict>;

    async fn assess_quality(&self, task_text: &str, final_output: &str) -> Result<QualityVerdict>;

    /// Opaque version identifier; changing it invalidates the Routing Cache.
    fn version(&self) -> &str;
}

/// Hard assertions enforced on a `RoutingDecision` before it is trusted
/// (§4.3). Agent-set/tool-registry membership checks that require runtime
/// context are parameterized in.
pub fn assert_routing_decision(
    decision: &RoutingDecision,
    configured_agents: &BTreeSet<String>,
    max_parallel_agents: usize,
    agent_tools: impl Fn(&str) -> BTreeSet<String>,
    registry_tools: &BTreeSet<String>,
) -> Result<()> {
    decision.validate_shape(max_parallel_agents)?;

    for agent in &decision.assigned {
        if !configured_agents.contains(agent) {
            return Err(conductor_domain::error::Error::ReasonerAssertionFailed(format!(
                "assigned agent '{agent}' is not a configured agent"
            )));
        }
    }

    for (agent, required) in &decision.tool_requirements {
        let declared = agent_tools(agent);
        for tool in required {
            if !declared.contains(tool) && !registry_tools.contains(tool) {
                return Err(conductor_domain::error::Error::ReasonerAssertionFailed(format!(
                    "agent '{agent}' requires tool '{tool}' which is neither declared nor registered"
                )));
            }
        }
    }

    Ok(())
}

/// Wraps a `Reasoner`, applying one retry on assertion failure and falling
/// back to heuristics when the reasoner is unavailable or still invalid
/// after the retry.
pub struct ReasonerFacade<R: Reasoner> {
    inner: Option<R>,
    recent_year_threshold: u32,
    default_agent: String,
    researcher_agent: Option<String>,
    writer_agent: Option<String>,
}

impl<R: Reasoner> ReasonerFacade<R> {
    pub fn new(
        inner: Option<R>,
        recent_year_threshold: u32,
        default_agent: String,
        researcher_agent: Option<String>,
        writer_agent: Option<String>,
    ) -> Self {
        Self {
            inner,
            recent_year_threshold,
            default_agent,
            researcher_agent,
            writer_agent,
        }
    }

    pub fn version(&self) -> &str {
        self.inner.as_ref().map(Reasoner::version).unwrap_or("fallback")
    }

    /// §4.1 Analysis phase: call the reasoner, fall back to heuristics on
    /// unavailability. Analysis has no assertions to retry against (§4.3
    /// lists assertions only for routing), so a single failed call falls
    /// straight back to heuristics.
    pub async fn analyze_task(&self, run_id: &str, task_text: &str, tool_universe: &[String]) -> (TaskAnalysis, bool) {
        let Some(reasoner) = &self.inner else {
            return (fallback::fallback_analysis(task_text, self.recent_year_threshold), true);
        };
        match reasoner.analyze_task(task_text, tool_universe).await {
            Ok(analysis) => (analysis, false),
            Err(e) => {
                TraceEvent::ReasonerFallbackUsed {
                    run_id: run_id.to_string(),
                    phase: "analysis".into(),
                    reason: e.to_string(),
                }
                .emit();
                (fallback::fallback_analysis(task_text, self.recent_year_threshold), true)
            }
        }
    }

    /// §4.1/§4.3 Routing phase: call the reasoner, apply assertions, retry
    /// once on failure, then fall back to heuristics.
    #[allow(clippy::too_many_arguments)]
    pub async fn route_task(
        &self,
        run_id: &str,
        task_text: &str,
        analysis: &TaskAnalysis,
        available_agents: &[String],
        tool_universe: &[String],
        configured_agents: &BTreeSet<String>,
        max_parallel_agents: usize,
        agent_tools: impl Fn(&str) -> BTreeSet<String>,
        registry_tools: &BTreeSet<String>,
    ) -> (RoutingDecision, bool) {
        let Some(reasoner) = &self.inner else {
            return (
                fallback::fallback_routing(
                    task_text,
                    self.recent_year_threshold,
                    &self.default_agent,
                    self.researcher_agent.as_deref(),
                    self.writer_agent.as_deref(),
                ),
                true,
            );
        };

        for attempt in 0..2 {
            match reasoner.route_task(task_text, analysis, available_agents, tool_universe).await {
                Ok(decision) => {
                    match assert_routing_decision(
                        &decision,
                        configured_agents,
                        max_parallel_agents,
                        &agent_tools,
                        registry_tools,
                    ) {
                        Ok(()) => return (decision, false),
                        Err(e) => {
                            TraceEvent::ReasonerAssertionFailed {
                                run_id: run_id.to_string(),
                                phase: "routing".into(),
                                reason: e.to_string(),
                                retry_attempted: attempt == 0,
                            }
                            .emit();
                        }
                    }
                }
                Err(e) => {
                    TraceEvent::ReasonerFallbackUsed {
                        run_id: run_id.to_string(),
                        phase: "routing".into(),
                        reason: e.to_string(),
                    }
                    .emit();
                    break;
                }
            }
        }

        (
            fallback::fallback_routing(
                task_text,
                self.recent_year_threshold,
                &self.default_agent,
                self.researcher_agent.as_deref(),
                self.writer_agent.as_deref(),
            ),
            true,
        )
    }

    pub async fn evaluate_progress(&self, run_id: &str, task_text: &str, outputs: &[(String, String)]) -> ProgressVerdict {
        let Some(reasoner) = &self.inner else {
            return ProgressVerdict {
                status: conductor_domain::reasoning::ProgressStatus::Complete,
                missing: Vec::new(),
                next_focus: None,
            };
        };
        match reasoner.evaluate_progress(task_text, outputs).await {
            Ok(v) => v,
            Err(e) => {
                TraceEvent::ReasonerFallbackUsed {
                    run_id: run_id.to_string(),
                    phase: "progress".into(),
                    reason: e.to_string(),
                }
                .emit();
                ProgressVerdict {
                    status: conductor_domain::reasoning::ProgressStatus::Complete,
                    missing: Vec::new(),
                    next_focus: None,
                }
            }
        }
    }

    pub async fn assess_quality(&self, run_id: &str, task_text: &str, final_output: &str) -> QualityVerdict {
        let Some(reasoner) = &self.inner else {
            return fallback::fallback_quality();
        };
        match reasoner.assess_quality(task_text, final_output).await {
            Ok(v) => v,
            Err(e) => {
                TraceEvent::ReasonerFallbackUsed {
                    run_id: run_id.to_string(),
                    phase: "quality".into(),
                    reason: e.to_string(),
                }
                .emit();
                fallback::fallback_quality()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conductor_domain::reasoning::{Complexity, ExecutionMode};
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct AlwaysFailsAssertions(AtomicUsize);

    #[async_trait::async_trait]
    impl Reasoner for AlwaysFailsAssertions {
        async fn analyze_task(&self, _task_text: &str, _tool_universe: &[String]) -> Result<TaskAnalysis> {
            Ok(TaskAnalysis {
                complexity: Complexity::Simple,
                required_capabilities: Default::default(),
                recommended_tools: Default::default(),
                needs_web_search: false,
                search_query: None,
                notes: None,
            })
        }

        async fn route_task(
            &self,
            task_text: &str,
            _analysis: &TaskAnalysis,
            _available_agents: &[String],
            _tool_universe: &[String],
        ) -> Result<RoutingDecision> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(RoutingDecision {
                mode: ExecutionMode::Delegated,
                assigned: vec!["ghost_agent".into()],
                subtasks: vec![task_text.to_string()],
                tool_requirements: BTreeMap::new(),
                confidence: 0.9,
            })
        }

        async fn evaluate_progress(&self, _task_text: &str, _outputs: &[(String, String)]) -> Result<ProgressVerdict> {
            unreachable!()
        }

        async fn assess_quality(&self, _task_text: &str, _final_output: &str) -> Result<QualityVerdict> {
            unreachable!()
        }

        fn version(&self) -> &str {
            "v-test"
        }
    }

    #[tokio::test]
    async fn routing_falls_back_after_one_retry_on_persistent_assertion_failure() {
        let reasoner = AlwaysFailsAssertions(AtomicUsize::new(0));
        let facade = ReasonerFacade::new(Some(reasoner), 2024, "writer".into(), None, None);
        let configured_agents: BTreeSet<String> = ["writer".into()].into_iter().collect();
        let analysis = fallback::fallback_analysis("hi", 2024);

        let (decision, used_fallback) = facade
            .route_task(
                "run1",
                "hi",
                &analysis,
                &["writer".into()],
                &[],
                &configured_agents,
                4,
                |_| BTreeSet::new(),
                &BTreeSet::new(),
            )
            .await;

        assert!(used_fallback);
        assert_eq!(decision.assigned, vec!["writer".to_string()]);
        // exactly one retry: the reasoner is called twice before falling back
        assert_eq!(facade.inner.as_ref().unwrap().0.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn no_reasoner_configured_uses_fallback_immediately() {
        let facade: ReasonerFacade<AlwaysFailsAssertions> =
            ReasonerFacade::new(None, 2024, "writer".into(), None, None);
        let (analysis, used_fallback) = facade.analyze_task("run1", "hi", &[]).await;
        assert!(used_fallback);
        assert_eq!(analysis.complexity, Complexity::Medium);
    }
}
