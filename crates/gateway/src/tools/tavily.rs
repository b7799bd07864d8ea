//! `tavily_search` — web search via the Tavily API. Registered with the
//! `web_search` capability so the Routing phase's time-sensitivity check
//! (§4.3) can route research tasks to it.

use conductor_domain::error::{Error, Result};
use conductor_tools::Invoker;
use serde_json::{json, Value};

const TAVILY_ENDPOINT: &str = "https://api.tavily.com/search";

pub struct TavilySearchTool {
    client: reqwest::Client,
    api_key_env: String,
}

impl TavilySearchTool {
    pub fn new(api_key_env: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(20))
                .build()
                .expect("reqwest client builder never fails with these options"),
            api_key_env: api_key_env.into(),
        }
    }
}

#[async_trait::async_trait]
impl Invoker for TavilySearchTool {
    async fn invoke(&self, input: Value) -> Result<Value> {
        let query = input
            .get("query")
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::ToolError {
                tool_name: "tavily_search".into(),
                reason: "missing required field \"query\"".into(),
            })?;

        let api_key = std::env::var(&self.api_key_env).unwrap_or_default();
        if api_key.is_empty() {
            return Err(Error::ToolError {
                tool_name: "tavily_search".into(),
                reason: format!("{} is not set", self.api_key_env),
            });
        }

        let body = json!({
            "api_key": api_key,
            "query": query,
            "max_results": input.get("max_results").and_then(|v| v.as_u64()).unwrap_or(5),
        });

        let response = self
            .client
            .post(TAVILY_ENDPOINT)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::ToolError { tool_name: "tavily_search".into(), reason: e.to_string() })?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(Error::ToolError {
                tool_name: "tavily_search".into(),
                reason: format!("tavily returned {status}: {text}"),
            });
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| Error::ToolError { tool_name: "tavily_search".into(), reason: e.to_string() })
    }
}
