//! Agent Runner (§4.4) — executes one agent's turn: builds its message
//! context, streams model output, dispatches requested tool calls through
//! the Tool Registry, and accumulates a structured per-agent result.
//!
//! Grounded on the teacher's `runtime::turn::run_turn`/`run_turn_inner`
//! tool-call loop: stream tokens, surface a tool-call request, invoke it,
//! feed the result back as a message, repeat until the model stops asking
//! for tools or the loop budget is spent.

use std::sync::Arc;
use std::time::Instant;

use conductor_domain::agent::AgentDescriptor;
use conductor_domain::error::{Error, Result};
use conductor_domain::task::{Message, Role};
use conductor_domain::tool::{ToolCall, ToolDescriptor};
use conductor_tools::ToolRegistry;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Upper bound on tool-call round-trips within a single turn.
pub const MAX_TOOL_LOOPS: usize = 25;

/// A unit of streamed model output. Reduced from the teacher's `TurnEvent`
/// to what the Agent Runner acts on directly; usage accounting and final
/// text are folded into `PerAgentResult` rather than re-emitted here.
#[derive(Debug, Clone)]
pub enum LlmStreamEvent {
    Delta(String),
    ToolCallRequested {
        call_id: String,
        tool_name: String,
        input: serde_json::Value,
    },
    Usage {
        input_tokens: u64,
        output_tokens: u64,
    },
    Done,
}

/// Implemented by each concrete model backend. One call opens a streamed
/// channel rather than returning a future directly, so the runner can
/// interleave cancellation checks and tool dispatch with token output —
/// the same shape as the teacher's `LlmProvider` streaming boundary.
#[async_trait::async_trait]
pub trait LlmClient: Send + Sync {
    async fn stream_turn(
        &self,
        agent: &AgentDescriptor,
        messages: &[Message],
        tools: &[ToolDescriptor],
    ) -> Result<mpsc::Receiver<Result<LlmStreamEvent>>>;
}

/// Events an `AgentRunner` emits as a turn progresses, consumed by the
/// execution strategy to build `AGENT_DELTA`/`TOOL_CALL` stream frames.
#[derive(Debug, Clone)]
pub enum AgentTurnEvent {
    Delta(String),
    ToolCall(ToolCall),
}

/// The accumulated outcome of one agent's turn (§4.4).
#[derive(Debug, Clone)]
pub struct PerAgentResult {
    pub agent_name: String,
    pub output: String,
    pub tool_calls: Vec<ToolCall>,
    pub duration_ms: u64,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

pub struct AgentRunner {
    llm: Arc<dyn LlmClient>,
    tools: Arc<ToolRegistry>,
}

impl AgentRunner {
    pub fn new(llm: Arc<dyn LlmClient>, tools: Arc<ToolRegistry>) -> Self {
        Self { llm, tools }
    }

    /// Run one agent's turn to completion: stream the model, dispatch any
    /// requested tool call through the registry, feed the result back in,
    /// and repeat until the model stops requesting tools, emits an error,
    /// the caller cancels, or the loop budget (`MAX_TOOL_LOOPS`) is spent.
    pub async fn run(
        &self,
        agent: &AgentDescriptor,
        subtask_text: &str,
        history: &[Message],
        allowed_tool_names: &[String],
        cancel: &CancellationToken,
        mut on_event: impl FnMut(AgentTurnEvent),
    ) -> Result<PerAgentResult> {
        let started = Instant::now();
        let tool_descriptors: Vec<ToolDescriptor> = allowed_tool_names
            .iter()
            .filter_map(|name| self.tools.get_descriptor(name))
            .collect();

        let mut messages: Vec<Message> = Vec::with_capacity(history.len() + 2);
        messages.push(Message::new(Role::System, agent.system_prompt.clone()));
        messages.extend_from_slice(history);
        messages.push(Message::new(Role::User, subtask_text.to_string()));

        let mut output = String::new();
        let mut tool_calls = Vec::new();
        let mut input_tokens = 0u64;
        let mut output_tokens = 0u64;

        for _ in 0..MAX_TOOL_LOOPS {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            let mut rx = self.llm.stream_turn(agent, &messages, &tool_descriptors).await?;
            let mut requested_tool_call = None;
            let mut turn_delta = String::new();

            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(Error::Cancelled),
                    event = rx.recv() => {
                        let Some(event) = event else { break };
                        match event? {
                            LlmStreamEvent::Delta(text) => {
                                turn_delta.push_str(&text);
                                on_event(AgentTurnEvent::Delta(text));
                            }
                            LlmStreamEvent::ToolCallRequested { call_id, tool_name, input } => {
                                requested_tool_call = Some((call_id, tool_name, input));
                            }
                            LlmStreamEvent::Usage { input_tokens: i, output_tokens: o } => {
                                input_tokens += i;
                                output_tokens += o;
                            }
                            LlmStreamEvent::Done => break,
                        }
                    }
                }
            }

            output.push_str(&turn_delta);

            let Some((call_id, tool_name, input)) = requested_tool_call else {
                break;
            };

            if !turn_delta.is_empty() {
                messages.push(Message::new(Role::Assistant, turn_delta.clone()));
            }

            let call_started = Instant::now();
            let tool_result = self.tools.invoke(&tool_name, input.clone()).await;
            let duration_ms = call_started.elapsed().as_millis() as u64;

            let (output_summary, error) = match &tool_result {
                Ok(value) => (summarize(value), None),
                Err(e) => (String::new(), Some(e.to_string())),
            };

            let call = ToolCall {
                tool_name: tool_name.clone(),
                input: input.clone(),
                output_summary,
                duration_ms,
                error,
            };
            on_event(AgentTurnEvent::ToolCall(call.clone()));
            tool_calls.push(call);

            let feedback = match tool_result {
                Ok(value) => format!("tool `{tool_name}` ({call_id}) returned: {value}"),
                Err(e) => format!("tool `{tool_name}` ({call_id}) failed: {e}"),
            };
            messages.push(Message::new(Role::User, feedback));
        }

        Ok(PerAgentResult {
            agent_name: agent.name.clone(),
            output,
            tool_calls,
            duration_ms: started.elapsed().as_millis() as u64,
            input_tokens,
            output_tokens,
        })
    }
}

fn summarize(value: &serde_json::Value) -> String {
    conductor_domain::run::truncate(&value.to_string(), 500)
}

#[cfg(test)]
mod tests {
    use super::*;
    use conductor_tools::Invoker;
    use std::collections::BTreeSet;
    use std::sync::Mutex;

    fn agent() -> AgentDescriptor {
        AgentDescriptor {
            name: "writer".into(),
            model: "gpt-4.1".into(),
            temperature: 0.2,
            system_prompt: "you are a writer".into(),
            tools: BTreeSet::from(["echo".to_string()]),
            timeout_ms: 30_000,
            max_tokens: None,
            reasoning_effort: None,
        }
    }

    struct Echo;

    #[async_trait::async_trait]
    impl Invoker for Echo {
        async fn invoke(&self, input: serde_json::Value) -> Result<serde_json::Value> {
            Ok(input)
        }
    }

    fn echo_tool_descriptor() -> conductor_domain::tool::ToolDescriptor {
        conductor_domain::tool::ToolDescriptor {
            name: "echo".into(),
            aliases: BTreeSet::new(),
            capabilities: BTreeSet::from(["echo".to_string()]),
            latency_hint: conductor_domain::tool::LatencyHint::Low,
            result_ttl_ms: None,
            schema_ref: "echo".into(),
        }
    }

    /// Streams a fixed scripted sequence of events, one script per call,
    /// in call order — enough to exercise the tool-call loop deterministically.
    struct ScriptedClient {
        scripts: Mutex<Vec<Vec<LlmStreamEvent>>>,
    }

    #[async_trait::async_trait]
    impl LlmClient for ScriptedClient {
        async fn stream_turn(
            &self,
            _agent: &AgentDescriptor,
            _messages: &[Message],
            _tools: &[ToolDescriptor],
        ) -> Result<mpsc::Receiver<Result<LlmStreamEvent>>> {
            let script = self.scripts.lock().unwrap().remove(0);
            let (tx, rx) = mpsc::channel(16);
            tokio::spawn(async move {
                for event in script {
                    let _ = tx.send(Ok(event)).await;
                }
            });
            Ok(rx)
        }
    }

    #[tokio::test]
    async fn straight_through_turn_with_no_tool_calls() {
        let registry = Arc::new(ToolRegistry::new());
        registry.register(echo_tool_descriptor(), Arc::new(Echo)).unwrap();
        let llm = Arc::new(ScriptedClient {
            scripts: Mutex::new(vec![vec![
                LlmStreamEvent::Delta("hello".into()),
                LlmStreamEvent::Delta(" world".into()),
                LlmStreamEvent::Usage { input_tokens: 10, output_tokens: 2 },
                LlmStreamEvent::Done,
            ]]),
        });
        let runner = AgentRunner::new(llm, registry);
        let cancel = CancellationToken::new();
        let result = runner
            .run(&agent(), "say hello", &[], &["echo".to_string()], &cancel, |_| {})
            .await
            .unwrap();
        assert_eq!(result.output, "hello world");
        assert!(result.tool_calls.is_empty());
        assert_eq!(result.input_tokens, 10);
    }

    #[tokio::test]
    async fn tool_call_round_trip_feeds_result_back_and_completes() {
        let registry = Arc::new(ToolRegistry::new());
        registry.register(echo_tool_descriptor(), Arc::new(Echo)).unwrap();
        let llm = Arc::new(ScriptedClient {
            scripts: Mutex::new(vec![
                vec![
                    LlmStreamEvent::ToolCallRequested {
                        call_id: "1".into(),
                        tool_name: "echo".into(),
                        input: serde_json::json!({"x": 1}),
                    },
                    LlmStreamEvent::Done,
                ],
                vec![LlmStreamEvent::Delta("done".into()), LlmStreamEvent::Done],
            ]),
        });
        let runner = AgentRunner::new(llm, registry);
        let cancel = CancellationToken::new();
        let mut events = Vec::new();
        let result = runner
            .run(&agent(), "use the tool", &[], &["echo".to_string()], &cancel, |e| events.push(e))
            .await
            .unwrap();
        assert_eq!(result.output, "done");
        assert_eq!(result.tool_calls.len(), 1);
        assert_eq!(result.tool_calls[0].tool_name, "echo");
        assert!(events.iter().any(|e| matches!(e, AgentTurnEvent::ToolCall(_))));
    }

    #[tokio::test]
    async fn cancellation_before_start_short_circuits() {
        let registry = Arc::new(ToolRegistry::new());
        let llm = Arc::new(ScriptedClient { scripts: Mutex::new(vec![]) });
        let runner = AgentRunner::new(llm, registry);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = runner.run(&agent(), "hi", &[], &[], &cancel, |_| {}).await.unwrap_err();
        assert!(matches!(err, Error::Cancelled));
    }
}
