//! Tool adapters registered into the shared `ToolRegistry` at startup.
//!
//! `tavily_search` satisfies the web-search capability the Routing phase
//! looks for when a task is time-sensitive (§4.3 `ensure_web_search_agent`).
//! `request_approval` bridges a plain `Invoker::invoke` call into
//! `conductor_sessions::SessionManager::request_hitl`, suspending the
//! calling agent turn until a client responds over the HITL side-channel.

mod approval;
mod tavily;

use std::sync::Arc;

use conductor_domain::error::Result;
use conductor_domain::tool::{LatencyHint, ToolDescriptor};
use conductor_tools::ToolRegistry;

pub use approval::ApprovalTool;
pub use tavily::TavilySearchTool;

/// Register the tools that don't depend on session/run state
/// (`request_approval` is registered separately in `main`, once the
/// `SessionManager`/`RunEventRegistry` it needs exist).
pub fn register_builtin_descriptors(registry: &ToolRegistry, tavily_api_key_env: &str) -> Result<()> {
    registry.register(
        ToolDescriptor {
            name: "tavily_search".into(),
            aliases: Default::default(),
            capabilities: ["web_search".to_string(), "search".to_string()].into_iter().collect(),
            latency_hint: LatencyHint::Medium,
            result_ttl_ms: Some(5 * 60 * 1000),
            schema_ref: "tavily_search.schema.json".into(),
        },
        Arc::new(TavilySearchTool::new(tavily_api_key_env)),
    )
}
