//! Supervisor State Machine (§4.1): fast-path gate plus the five-phase
//! Analysis→Routing→Execution→Progress→Quality pipeline, terminating in
//! exactly one `WORKFLOW_OUTPUT` or `ERROR` event.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use conductor_agents::{AgentRegistry, AgentRunner, AgentTurnEvent};
use conductor_cache::RoutingCache;
use conductor_domain::config::SupervisorConfig;
use conductor_domain::error::{Error, Result};
use conductor_domain::event::{EventCategory, StreamEvent, WorkflowState};
use conductor_domain::reasoning::{ProgressStatus, ProgressVerdict, QualityVerdict, RoutingDecision};
use conductor_domain::task::{Message, Role};
use conductor_domain::trace::TraceEvent;
use conductor_memory::{ConversationStore, HistorySink, RunRecord};
use conductor_reasoner::{Reasoner, ReasonerFacade};
use conductor_strategies::ExecutionContext;
use conductor_tools::ToolRegistry;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::fastpath;
use crate::phases;

pub struct Supervisor<R: Reasoner> {
    reasoner: ReasonerFacade<R>,
    cache: RoutingCache,
    agent_registry: AgentRegistry,
    tool_registry: Arc<ToolRegistry>,
    agent_runner: AgentRunner,
    conversation_store: Arc<dyn ConversationStore>,
    history_sink: Arc<dyn HistorySink>,
    config: SupervisorConfig,
    history_turns: usize,
    enable_refinement: bool,
    routing_config_version: String,
    routing_cache_ttl_ms: u64,
}

impl<R: Reasoner> Supervisor<R> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        reasoner: ReasonerFacade<R>,
        cache: RoutingCache,
        agent_registry: AgentRegistry,
        tool_registry: Arc<ToolRegistry>,
        agent_runner: AgentRunner,
        conversation_store: Arc<dyn ConversationStore>,
        history_sink: Arc<dyn HistorySink>,
        config: SupervisorConfig,
        history_turns: usize,
        enable_refinement: bool,
        routing_config_version: String,
        routing_cache_ttl_ms: u64,
    ) -> Self {
        Self {
            reasoner,
            cache,
            agent_registry,
            tool_registry,
            agent_runner,
            conversation_store,
            history_sink,
            config,
            history_turns,
            enable_refinement,
            routing_config_version,
            routing_cache_ttl_ms,
        }
    }

    /// Drive a single run to completion, emitting the full event stream
    /// through `emit`. Exactly one of `WORKFLOW_OUTPUT`/`ERROR` is emitted
    /// last; nothing follows it.
    pub async fn run(
        &self,
        run_id: Uuid,
        task_text: &str,
        conversation_id: Option<Uuid>,
        cancel: CancellationToken,
        emit: &(dyn Fn(StreamEvent) + Send + Sync),
    ) {
        let run_timeout = Duration::from_millis(self.config.run_timeout_ms);
        let outcome = tokio::time::timeout(
            run_timeout,
            self.run_inner(run_id, task_text, conversation_id, &cancel, emit),
        )
        .await;

        let result = match outcome {
            Ok(inner) => inner,
            Err(_) => Err(Error::Timeout(format!("run exceeded {}ms", self.config.run_timeout_ms))),
        };

        if let Err(e) = result {
            emit(StreamEvent::Error {
                timestamp: Utc::now(),
                category: EventCategory::Terminal,
                ui_hint: None,
                code: e.code().to_string(),
                message: e.display_message(),
                phase: None,
            });
        }
    }

    async fn run_inner(
        &self,
        run_id: Uuid,
        task_text: &str,
        conversation_id: Option<Uuid>,
        cancel: &CancellationToken,
        emit: &(dyn Fn(StreamEvent) + Send + Sync),
    ) -> Result<()> {
        let started = Instant::now();
        let run_id_str = run_id.to_string();

        if task_text.trim().chars().count() > self.config.max_task_length {
            return Err(Error::InvalidInput(format!(
                "task text exceeds maximum length of {} characters",
                self.config.max_task_length
            )));
        }

        let conversation = self.conversation_store.resolve_or_create(conversation_id);
        let history = self.conversation_store.recent_messages(conversation.id, self.history_turns);
        self.conversation_store.append(conversation.id, Message::new(Role::User, task_text.to_string()));

        emit(StreamEvent::WorkflowStatus {
            timestamp: Utc::now(),
            category: EventCategory::Lifecycle,
            ui_hint: None,
            state: WorkflowState::InProgress,
            workflow_id: run_id,
            message: "run started".into(),
        });

        let task_with_history = conductor_memory::build_task_with_history(&history, task_text);

        if fastpath::is_fast_path_eligible(task_text, &conversation) {
            TraceEvent::FastPathTaken { run_id: run_id_str.clone() }.emit();
            let (output, duration_ms) = self.run_fast_path(&task_with_history, &history, cancel, emit).await?;
            self.conversation_store.append(
                conversation.id,
                Message::new(Role::Assistant, output.clone()).with_agent(self.config.default_agent.clone()),
            );
            self.emit_terminal(run_id, &output, None, started.elapsed().as_millis() as u64, duration_ms, emit);
            self.history_sink.append(RunRecord {
                run_id,
                task: task_text.to_string(),
                routing: None,
                quality: None,
                duration_ms: started.elapsed().as_millis() as u64,
                completed_at: Utc::now(),
            });
            return Ok(());
        }

        let tool_universe = self.tool_registry.tool_names();
        TraceEvent::PhaseStarted { run_id: run_id_str.clone(), phase: "analysis".into() }.emit();
        let phase_started = Instant::now();
        let analysis = phases::analysis::run(&self.reasoner, &run_id_str, &task_with_history, &tool_universe, emit).await;
        TraceEvent::PhaseCompleted {
            run_id: run_id_str.clone(),
            phase: "analysis".into(),
            duration_ms: phase_started.elapsed().as_millis() as u64,
        }
        .emit();

        let mut round = 0u32;
        let mut refinement_rounds_used = 0u32;
        TraceEvent::PhaseStarted { run_id: run_id_str.clone(), phase: "routing".into() }.emit();
        let phase_started = Instant::now();
        let mut decision = phases::routing::run(
            &self.reasoner,
            &self.cache,
            &run_id_str,
            &task_with_history,
            &analysis,
            &self.agent_registry,
            &self.tool_registry,
            self.config.max_parallel_agents,
            self.config.recent_year_threshold,
            self.routing_cache_ttl_ms,
            &self.routing_config_version,
            emit,
        )
        .await;
        TraceEvent::PhaseCompleted {
            run_id: run_id_str.clone(),
            phase: "routing".into(),
            duration_ms: phase_started.elapsed().as_millis() as u64,
        }
        .emit();
        round += 1;

        let final_result = loop {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            let ctx = ExecutionContext {
                runner: &self.agent_runner,
                registry: &self.agent_registry,
                decision: &decision,
                history: &history,
                cancel,
                default_agent: &self.config.default_agent,
                task_text: &task_with_history,
            };
            TraceEvent::PhaseStarted { run_id: run_id_str.clone(), phase: "execution".into() }.emit();
            let phase_started = Instant::now();
            let exec_result = tokio::time::timeout(
                Duration::from_millis(self.config.agent_timeout_ms.max(1) * decision.assigned.len() as u64),
                phases::execution::run(&run_id_str, &ctx, emit),
            )
            .await
            .map_err(|_| Error::Timeout("execution phase exceeded agent timeout budget".into()))??;
            TraceEvent::PhaseCompleted {
                run_id: run_id_str.clone(),
                phase: "execution".into(),
                duration_ms: phase_started.elapsed().as_millis() as u64,
            }
            .emit();

            let outputs: Vec<(String, String)> = decision
                .assigned
                .iter()
                .map(|agent| (agent.clone(), exec_result.outputs.get(agent).cloned().unwrap_or_default()))
                .collect();

            let progress = phases::progress::run(&self.reasoner, &run_id_str, &task_with_history, &outputs).await;

            match progress.status {
                ProgressStatus::Complete => break exec_result,
                ProgressStatus::Refine
                    if self.enable_refinement
                        && refinement_rounds_used < self.config.max_refinement_rounds
                        && round < self.config.max_rounds =>
                {
                    refinement_rounds_used += 1;
                    round += 1;
                    decision = refine_decision(&decision, &progress);
                    continue;
                }
                ProgressStatus::Continue if round < self.config.max_rounds => {
                    round += 1;
                    TraceEvent::PhaseStarted { run_id: run_id_str.clone(), phase: "routing".into() }.emit();
                    let phase_started = Instant::now();
                    decision = phases::routing::run(
                        &self.reasoner,
                        &self.cache,
                        &run_id_str,
                        &task_with_history,
                        &analysis,
                        &self.agent_registry,
                        &self.tool_registry,
                        self.config.max_parallel_agents,
                        self.config.recent_year_threshold,
                        self.routing_cache_ttl_ms,
                        &self.routing_config_version,
                        emit,
                    )
                    .await;
                    TraceEvent::PhaseCompleted {
                        run_id: run_id_str.clone(),
                        phase: "routing".into(),
                        duration_ms: phase_started.elapsed().as_millis() as u64,
                    }
                    .emit();
                    continue;
                }
                _ => break exec_result,
            }
        };

        TraceEvent::PhaseStarted { run_id: run_id_str.clone(), phase: "quality".into() }.emit();
        let phase_started = Instant::now();
        let quality = phases::quality::run(
            &self.reasoner,
            &run_id_str,
            &task_with_history,
            &final_result.synthesized_output,
            None,
            emit,
        )
        .await;
        TraceEvent::PhaseCompleted {
            run_id: run_id_str.clone(),
            phase: "quality".into(),
            duration_ms: phase_started.elapsed().as_millis() as u64,
        }
        .emit();

        self.conversation_store.append(
            conversation.id,
            Message::new(Role::Assistant, final_result.synthesized_output.clone()),
        );

        self.emit_terminal(
            run_id,
            &final_result.synthesized_output,
            Some(quality.clone()),
            started.elapsed().as_millis() as u64,
            0,
            emit,
        );

        self.history_sink.append(RunRecord {
            run_id,
            task: task_text.to_string(),
            routing: Some(decision),
            quality: Some(quality),
            duration_ms: started.elapsed().as_millis() as u64,
            completed_at: Utc::now(),
        });

        Ok(())
    }

    async fn run_fast_path(
        &self,
        task_with_history: &str,
        history: &[Message],
        cancel: &CancellationToken,
        emit: &(dyn Fn(StreamEvent) + Send + Sync),
    ) -> Result<(String, u64)> {
        let agent_name = &self.config.default_agent;
        let descriptor = self.agent_registry.get(agent_name).ok_or_else(|| Error::AgentFailure {
            agent_name: agent_name.clone(),
            message: "default agent not found in registry".into(),
        })?;
        let allowed_tools = self.agent_registry.allowed_tools(agent_name);

        emit(StreamEvent::AgentStarted {
            timestamp: Utc::now(),
            category: EventCategory::Agent,
            ui_hint: None,
            agent_id: agent_name.clone(),
            subtask: task_with_history.to_string(),
            duration: None,
        });

        let mut accumulated = String::new();
        let result = self
            .agent_runner
            .run(descriptor, task_with_history, history, &allowed_tools, cancel, |event| match event {
                AgentTurnEvent::Delta(delta) => {
                    accumulated.push_str(&delta);
                    emit(StreamEvent::AgentDelta {
                        timestamp: Utc::now(),
                        category: EventCategory::Agent,
                        ui_hint: None,
                        agent_id: agent_name.clone(),
                        delta,
                        accumulated: accumulated.clone(),
                        agent_accumulated: accumulated.clone(),
                    });
                }
                AgentTurnEvent::ToolCall(call) => {
                    emit(StreamEvent::ToolCall {
                        timestamp: Utc::now(),
                        category: EventCategory::Tool,
                        ui_hint: None,
                        agent_id: agent_name.clone(),
                        tool_name: call.tool_name,
                        input: call.input,
                        output_summary: call.output_summary,
                        duration_ms: call.duration_ms,
                    });
                }
            })
            .await?;

        emit(StreamEvent::AgentCompleted {
            timestamp: Utc::now(),
            category: EventCategory::Agent,
            ui_hint: None,
            agent_id: agent_name.clone(),
            subtask: task_with_history.to_string(),
            duration: Some(result.duration_ms),
        });

        Ok((result.output, result.duration_ms))
    }

    fn emit_terminal(
        &self,
        run_id: Uuid,
        result: &str,
        quality: Option<QualityVerdict>,
        total_ms: u64,
        agent_ms: u64,
        emit: &(dyn Fn(StreamEvent) + Send + Sync),
    ) {
        emit(StreamEvent::WorkflowOutput {
            timestamp: Utc::now(),
            category: EventCategory::Terminal,
            ui_hint: None,
            result: result.to_string(),
            quality,
            run_id,
            durations: serde_json::json!({ "totalMs": total_ms, "agentMs": agent_ms }),
        });
    }
}

/// §4.1 Progress "refine" transition: keep the same assigned agents and
/// mode, but fold the reasoner's `missing`/`nextFocus` into each agent's
/// subtask so the next Execution round addresses the gap.
fn refine_decision(decision: &RoutingDecision, progress: &ProgressVerdict) -> RoutingDecision {
    let mut refined = decision.clone();
    let focus = progress
        .next_focus
        .clone()
        .unwrap_or_else(|| format!("address missing items: {}", progress.missing.join(", ")));
    for subtask in &mut refined.subtasks {
        subtask.push_str(&format!("\n\nRefinement needed: {focus}"));
    }
    refined
}

#[cfg(test)]
mod tests {
    use super::*;
    use conductor_domain::agent::AgentDescriptor;
    use conductor_domain::config::agents::{AgentConfig, ToolPolicy};
    use conductor_domain::reasoning::{Complexity, ExecutionMode, TaskAnalysis};
    use conductor_memory::InMemoryConversationStore;
    use conductor_memory::InMemoryHistorySink;
    use conductor_agents::LlmStreamEvent;
    use parking_lot::Mutex;
    use std::collections::{BTreeMap, BTreeSet, HashMap};
    use tokio::sync::mpsc;

    fn descriptor(name: &str) -> AgentDescriptor {
        AgentDescriptor {
            name: name.to_string(),
            model: "gpt-4.1".into(),
            temperature: 0.2,
            system_prompt: format!("you are {name}"),
            tools: BTreeSet::new(),
            timeout_ms: 30_000,
            max_tokens: None,
            reasoning_effort: None,
        }
    }

    fn agent_registry() -> AgentRegistry {
        let mut agents = HashMap::new();
        for name in ["writer", "researcher"] {
            agents.insert(
                name.to_string(),
                AgentConfig { descriptor: descriptor(name), tool_policy: ToolPolicy::default() },
            );
        }
        AgentRegistry::from_config(&agents).unwrap()
    }

    struct ScriptedReasoner;

    #[async_trait::async_trait]
    impl Reasoner for ScriptedReasoner {
        async fn analyze_task(
            &self,
            _task_text: &str,
            _tool_universe: &[String],
        ) -> Result<TaskAnalysis> {
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
            Ok(RoutingDecision {
                mode: ExecutionMode::Delegated,
                assigned: vec!["writer".into()],
                subtasks: vec![task_text.to_string()],
                tool_requirements: BTreeMap::new(),
                confidence: 0.9,
            })
        }

        async fn evaluate_progress(
            &self,
            _task_text: &str,
            _outputs: &[(String, String)],
        ) -> Result<ProgressVerdict> {
            Ok(ProgressVerdict { status: ProgressStatus::Complete, missing: Vec::new(), next_focus: None })
        }

        async fn assess_quality(&self, _task_text: &str, _final_output: &str) -> Result<QualityVerdict> {
            Ok(QualityVerdict { score: 9.0, missing: Vec::new(), feedback: "good".into(), dimensions: BTreeMap::new() })
        }

        fn version(&self) -> &str {
            "v1"
        }
    }

    struct ScriptClient;
    #[async_trait::async_trait]
    impl conductor_agents::LlmClient for ScriptClient {
        async fn stream_turn(
            &self,
            _agent: &AgentDescriptor,
            _messages: &[Message],
            _tools: &[conductor_domain::tool::ToolDescriptor],
        ) -> Result<mpsc::Receiver<Result<LlmStreamEvent>>> {
            let (tx, rx) = mpsc::channel(8);
            tokio::spawn(async move {
                let _ = tx.send(Ok(LlmStreamEvent::Delta("hello there".to_string()))).await;
                let _ = tx.send(Ok(LlmStreamEvent::Done)).await;
            });
            Ok(rx)
        }
    }

    fn build_supervisor() -> Supervisor<ScriptedReasoner> {
        let reasoner = ReasonerFacade::new(Some(ScriptedReasoner), 2024, "writer".into(), None, None);
        Supervisor::new(
            reasoner,
            RoutingCache::new(100),
            agent_registry(),
            Arc::new(ToolRegistry::new()),
            AgentRunner::new(Arc::new(ScriptClient), Arc::new(ToolRegistry::new())),
            Arc::new(InMemoryConversationStore::new()),
            Arc::new(InMemoryHistorySink::new()),
            SupervisorConfig::default(),
            10,
            false,
            "c1".into(),
            600_000,
        )
    }

    #[tokio::test]
    async fn greeting_uses_fast_path_and_terminates_once() {
        let supervisor = build_supervisor();
        let events = Arc::new(Mutex::new(Vec::new()));
        let events_clone = events.clone();
        supervisor
            .run(Uuid::new_v4(), "hi", None, CancellationToken::new(), &move |e| events_clone.lock().push(e))
            .await;

        let events = events.lock();
        let terminal_count = events.iter().filter(|e| e.is_terminal()).count();
        assert_eq!(terminal_count, 1);
        assert!(matches!(events.last(), Some(StreamEvent::WorkflowOutput { .. })));
        // fast path skips routing/quality entirely
        assert!(!events.iter().any(|e| matches!(e, StreamEvent::Quality { .. })));
    }

    #[tokio::test]
    async fn full_task_runs_all_five_phases_and_terminates_once() {
        let supervisor = build_supervisor();
        let events = Arc::new(Mutex::new(Vec::new()));
        let events_clone = events.clone();
        supervisor
            .run(
                Uuid::new_v4(),
                "write a five-paragraph essay about the history of bridges",
                None,
                CancellationToken::new(),
                &move |e| events_clone.lock().push(e),
            )
            .await;

        let events = events.lock();
        assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);
        assert!(events.iter().any(|e| matches!(e, StreamEvent::Quality { .. })));
        assert!(matches!(events.last(), Some(StreamEvent::WorkflowOutput { result, .. }) if result == "hello there"));
    }

    #[tokio::test]
    async fn second_turn_with_prior_assistant_message_does_not_use_fast_path() {
        let conversation_store = InMemoryConversationStore::new();
        let conversation = conversation_store.resolve_or_create(None);
        conversation_store.append(conversation.id, Message::new(Role::User, "hi"));
        conversation_store.append(conversation.id, Message::new(Role::Assistant, "hello!"));

        let supervisor = Supervisor::new(
            ReasonerFacade::new(Some(ScriptedReasoner), 2024, "writer".into(), None, None),
            RoutingCache::new(100),
            agent_registry(),
            Arc::new(ToolRegistry::new()),
            AgentRunner::new(Arc::new(ScriptClient), Arc::new(ToolRegistry::new())),
            Arc::new(conversation_store),
            Arc::new(InMemoryHistorySink::new()),
            SupervisorConfig::default(),
            10,
            false,
            "c1".into(),
            600_000,
        );

        let events = Arc::new(Mutex::new(Vec::new()));
        let events_clone = events.clone();
        supervisor
            .run(Uuid::new_v4(), "hi", Some(conversation.id), CancellationToken::new(), &move |e| {
                events_clone.lock().push(e)
            })
            .await;

        let events = events.lock();
        assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);
        // a repeat "hi" with a prior assistant turn must go through the full
        // pipeline (Quality emitted), not the fast path.
        assert!(events.iter().any(|e| matches!(e, StreamEvent::Quality { .. })));
    }

    #[tokio::test]
    async fn cancelled_token_stops_the_run_with_a_single_cancelled_error() {
        let supervisor = build_supervisor();
        let token = CancellationToken::new();
        token.cancel();

        let events = Arc::new(Mutex::new(Vec::new()));
        let events_clone = events.clone();
        supervisor
            .run(
                Uuid::new_v4(),
                "write a five-paragraph essay about the history of bridges",
                None,
                token,
                &move |e| events_clone.lock().push(e),
            )
            .await;

        let events = events.lock();
        assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);
        match events.last() {
            Some(StreamEvent::Error { code, .. }) => assert_eq!(code, "cancelled"),
            other => panic!("expected a terminal cancelled error, got {other:?}"),
        }
    }
}
