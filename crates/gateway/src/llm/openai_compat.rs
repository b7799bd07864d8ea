//! OpenAI-compatible `LlmClient` adapter. Works against OpenAI itself and
//! any endpoint following the same chat-completions streaming contract
//! (Azure OpenAI, Ollama, vLLM, LM Studio, ...).

use std::collections::BTreeMap;

use conductor_agents::{LlmClient, LlmStreamEvent};
use conductor_domain::agent::AgentDescriptor;
use conductor_domain::error::{Error, Result};
use conductor_domain::task::{Message, Role};
use conductor_domain::tool::ToolDescriptor;
use serde_json::Value;
use tokio::sync::mpsc;

use super::sse::drain_data_lines;

/// Chat-completions adapter over a single OpenAI-compatible base URL.
///
/// The API key is read from `api_key_env` once per request rather than
/// cached, so rotating the environment variable takes effect immediately —
/// this mirrors the teacher's auth-rotator convention without needing a
/// full rotation pool for a single static key.
pub struct OpenAiCompatClient {
    base_url: String,
    api_key_env: String,
    client: reqwest::Client,
}

impl OpenAiCompatClient {
    pub fn new(base_url: impl Into<String>, api_key_env: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key_env: api_key_env.into(),
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(120))
                .build()
                .expect("reqwest client builder never fails with these options"),
        }
    }

    fn api_key(&self) -> String {
        std::env::var(&self.api_key_env).unwrap_or_default()
    }
}

fn role_to_str(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
    }
}

fn message_to_openai(msg: &Message) -> Value {
    serde_json::json!({
        "role": role_to_str(msg.role),
        "content": msg.content,
    })
}

fn tool_to_openai(tool: &ToolDescriptor) -> Value {
    serde_json::json!({
        "type": "function",
        "function": {
            "name": tool.name,
            "description": format!("schema: {}", tool.schema_ref),
            "parameters": {
                "type": "object",
                "additionalProperties": true,
            },
        }
    })
}

struct ToolCallBuilder {
    call_id: String,
    tool_name: String,
    args_buf: String,
}

#[async_trait::async_trait]
impl LlmClient for OpenAiCompatClient {
    async fn stream_turn(
        &self,
        agent: &AgentDescriptor,
        messages: &[Message],
        tools: &[ToolDescriptor],
    ) -> Result<mpsc::Receiver<Result<LlmStreamEvent>>> {
        let mut body = serde_json::json!({
            "model": agent.model,
            "messages": messages.iter().map(message_to_openai).collect::<Vec<_>>(),
            "temperature": agent.temperature,
            "stream": true,
            "stream_options": { "include_usage": true },
        });
        if !tools.is_empty() {
            body["tools"] = Value::Array(tools.iter().map(tool_to_openai).collect());
        }
        if let Some(max_tokens) = agent.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key()))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::ReasonerUnavailable(format!("llm request failed: {e}")))?;

        if let Err(status_err) = response.error_for_status_ref() {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::AgentFailure {
                agent_name: agent.name.clone(),
                message: format!("llm returned {status_err}: {text}"),
            });
        }

        let (tx, rx) = mpsc::channel(64);
        tokio::spawn(drive_stream(response, tx));
        Ok(rx)
    }
}

async fn drive_stream(mut response: reqwest::Response, tx: mpsc::Sender<Result<LlmStreamEvent>>) {
    let mut buffer = String::new();
    let mut tool_calls: BTreeMap<u64, ToolCallBuilder> = BTreeMap::new();
    let mut done_sent = false;

    loop {
        let chunk = match response.chunk().await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => break,
            Err(e) => {
                let _ = tx.send(Err(Error::AgentFailure {
                    agent_name: "llm".into(),
                    message: format!("stream read error: {e}"),
                }))
                .await;
                return;
            }
        };
        buffer.push_str(&String::from_utf8_lossy(&chunk));

        for data in drain_data_lines(&mut buffer) {
            if handle_data_line(&data, &mut tool_calls, &tx, &mut done_sent).await.is_break() {
                return;
            }
        }
    }

    if !buffer.trim().is_empty() {
        buffer.push_str("\n\n");
        for data in drain_data_lines(&mut buffer) {
            if handle_data_line(&data, &mut tool_calls, &tx, &mut done_sent).await.is_break() {
                return;
            }
        }
    }

    if !done_sent {
        let _ = tx.send(Ok(LlmStreamEvent::Done)).await;
    }
}

enum Flow {
    Continue,
    Break,
}
impl Flow {
    fn is_break(&self) -> bool {
        matches!(self, Flow::Break)
    }
}

async fn handle_data_line(
    data: &str,
    tool_calls: &mut BTreeMap<u64, ToolCallBuilder>,
    tx: &mpsc::Sender<Result<LlmStreamEvent>>,
    done_sent: &mut bool,
) -> Flow {
    if data.trim() == "[DONE]" {
        flush_tool_calls(tool_calls, tx).await;
        let _ = tx.send(Ok(LlmStreamEvent::Done)).await;
        *done_sent = true;
        return Flow::Break;
    }

    let v: Value = match serde_json::from_str(data) {
        Ok(v) => v,
        Err(e) => {
            let _ = tx.send(Err(Error::Json(e))).await;
            return Flow::Break;
        }
    };

    let choice = v.get("choices").and_then(|c| c.as_array()).and_then(|a| a.first());

    let Some(choice) = choice else {
        if let Some(usage) = v.get("usage") {
            emit_usage(usage, tx).await;
        }
        return Flow::Continue;
    };

    let delta = choice.get("delta").unwrap_or(&Value::Null);

    if let Some(text) = delta.get("content").and_then(|v| v.as_str()) {
        if !text.is_empty() {
            let _ = tx.send(Ok(LlmStreamEvent::Delta(text.to_string()))).await;
        }
    }

    if let Some(tc_arr) = delta.get("tool_calls").and_then(|v| v.as_array()) {
        for tc in tc_arr {
            let index = tc.get("index").and_then(|v| v.as_u64()).unwrap_or(0);
            let entry = tool_calls.entry(index).or_insert_with(|| ToolCallBuilder {
                call_id: String::new(),
                tool_name: String::new(),
                args_buf: String::new(),
            });
            if let Some(id) = tc.get("id").and_then(|v| v.as_str()) {
                entry.call_id = id.to_string();
            }
            if let Some(name) = tc.get("function").and_then(|f| f.get("name")).and_then(|v| v.as_str()) {
                entry.tool_name = name.to_string();
            }
            if let Some(args) = tc.get("function").and_then(|f| f.get("arguments")).and_then(|v| v.as_str()) {
                entry.args_buf.push_str(args);
            }
        }
    }

    if let Some(fr) = choice.get("finish_reason").and_then(|f| f.as_str()) {
        if fr != "null" {
            flush_tool_calls(tool_calls, tx).await;
            if let Some(usage) = v.get("usage") {
                emit_usage(usage, tx).await;
            }
            let _ = tx.send(Ok(LlmStreamEvent::Done)).await;
            *done_sent = true;
            return Flow::Break;
        }
    }

    Flow::Continue
}

async fn flush_tool_calls(tool_calls: &mut BTreeMap<u64, ToolCallBuilder>, tx: &mpsc::Sender<Result<LlmStreamEvent>>) {
    for (_, builder) in std::mem::take(tool_calls) {
        if builder.tool_name.is_empty() {
            continue;
        }
        let input: Value = serde_json::from_str(&builder.args_buf).unwrap_or_else(|_| serde_json::json!({}));
        let _ = tx
            .send(Ok(LlmStreamEvent::ToolCallRequested {
                call_id: if builder.call_id.is_empty() { uuid::Uuid::new_v4().to_string() } else { builder.call_id },
                tool_name: builder.tool_name,
                input,
            }))
            .await;
    }
}

async fn emit_usage(usage: &Value, tx: &mpsc::Sender<Result<LlmStreamEvent>>) {
    let input_tokens = usage.get("prompt_tokens").and_then(|v| v.as_u64()).unwrap_or(0);
    let output_tokens = usage.get("completion_tokens").and_then(|v| v.as_u64()).unwrap_or(0);
    let _ = tx.send(Ok(LlmStreamEvent::Usage { input_tokens, output_tokens })).await;
}
