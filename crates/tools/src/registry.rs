//! Tool Registry (§4.5) — one-shot registration, alias resolution,
//! capability-tag lookup, typed invoker dispatch, optional TTL result cache.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use conductor_domain::error::{Error, Result};
use conductor_domain::tool::{LatencyHint, ToolDescriptor, ToolSummary};
use parking_lot::RwLock;

/// Implemented by every concrete tool adapter (web search, code execution,
/// browser, ...). Invokers are wrapped uniformly regardless of whether the
/// underlying call is sync or async, mirroring `sa_providers::LlmProvider`'s
/// uniform async boundary over heterogeneous backends.
#[async_trait::async_trait]
pub trait Invoker: Send + Sync {
    /// Invoke with a JSON input already validated against `schemaRef` by
    /// the caller. Failures are returned as `Error::ToolError`, which the
    /// Agent Runner treats as non-fatal.
    async fn invoke(&self, input: serde_json::Value) -> Result<serde_json::Value>;
}

struct RegisteredTool {
    descriptor: ToolDescriptor,
    invoker: std::sync::Arc<dyn Invoker>,
}

struct CachedResult {
    value: serde_json::Value,
    expires_at: Instant,
}

/// Process-wide, read-mostly registry of tools (§5 shared-resource policy).
pub struct ToolRegistry {
    tools: RwLock<HashMap<String, RegisteredTool>>,
    aliases: RwLock<HashMap<String, String>>,
    result_cache: RwLock<HashMap<(String, String), CachedResult>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: RwLock::new(HashMap::new()),
            aliases: RwLock::new(HashMap::new()),
            result_cache: RwLock::new(HashMap::new()),
        }
    }

    /// One-shot registration at startup. Duplicate names are rejected.
    pub fn register(
        &self,
        descriptor: ToolDescriptor,
        invoker: std::sync::Arc<dyn Invoker>,
    ) -> Result<()> {
        let mut tools = self.tools.write();
        if tools.contains_key(&descriptor.name) {
            return Err(Error::Other(format!(
                "tool '{}' is already registered",
                descriptor.name
            )));
        }
        let mut aliases = self.aliases.write();
        for alias in &descriptor.aliases {
            if tools.contains_key(alias) || aliases.contains_key(alias) {
                return Err(Error::Other(format!(
                    "alias '{alias}' collides with an existing tool or alias"
                )));
            }
            aliases.insert(alias.clone(), descriptor.name.clone());
        }
        tracing::info!(tool = %descriptor.name, capabilities = ?descriptor.capabilities, "registered tool");
        tools.insert(descriptor.name.clone(), RegisteredTool { descriptor, invoker });
        Ok(())
    }

    /// Resolve an alias or canonical name to the canonical tool name.
    pub fn resolve(&self, name: &str) -> Option<String> {
        let tools = self.tools.read();
        if tools.contains_key(name) {
            return Some(name.to_string());
        }
        self.aliases.read().get(name).cloned()
    }

    pub fn get_descriptor(&self, name: &str) -> Option<ToolDescriptor> {
        let canonical = self.resolve(name)?;
        self.tools.read().get(&canonical).map(|t| t.descriptor.clone())
    }

    /// Tools offering a given capability, in registration order.
    pub fn by_capability(&self, capability: &str) -> Vec<String> {
        let tools = self.tools.read();
        let mut names: Vec<String> = tools
            .values()
            .filter(|t| t.descriptor.capabilities.contains(capability))
            .map(|t| t.descriptor.name.clone())
            .collect();
        names.sort();
        names
    }

    /// Minimal summaries the Reasoner consumes for routing (§4.5 `describe()`).
    pub fn describe(&self) -> Vec<ToolSummary> {
        let mut summaries: Vec<ToolSummary> =
            self.tools.read().values().map(|t| ToolSummary::from(&t.descriptor)).collect();
        summaries.sort_by(|a, b| a.name.cmp(&b.name));
        summaries
    }

    pub fn tool_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.resolve(name).is_some()
    }

    /// Invoke a tool by name/alias. Result-level TTL caching is applied
    /// when `resultTTLms` is set, keyed by canonical tool name + normalized
    /// input. Failures are wrapped as `Error::ToolError`, matching §4.5's
    /// "not fatal" contract.
    pub async fn invoke(&self, name: &str, input: serde_json::Value) -> Result<serde_json::Value> {
        let canonical = self
            .resolve(name)
            .ok_or_else(|| Error::ToolError { tool_name: name.into(), reason: "tool not registered".into() })?;

        let (invoker, ttl) = {
            let tools = self.tools.read();
            let entry = tools.get(&canonical).expect("resolved name must exist");
            (entry.invoker.clone(), entry.descriptor.result_ttl_ms)
        };

        let cache_key = ttl.map(|_| (canonical.clone(), normalize_input(&input)));
        if let Some(key) = &cache_key {
            if let Some(cached) = self.result_cache.read().get(key) {
                if cached.expires_at > Instant::now() {
                    return Ok(cached.value.clone());
                }
            }
        }

        let result = invoker
            .invoke(input)
            .await
            .map_err(|e| Error::ToolError { tool_name: canonical.clone(), reason: e.to_string() })?;

        if let (Some(key), Some(ttl_ms)) = (cache_key, ttl) {
            self.result_cache.write().insert(
                key,
                CachedResult { value: result.clone(), expires_at: Instant::now() + Duration::from_millis(ttl_ms) },
            );
        }

        Ok(result)
    }

    pub fn latency_hint(&self, name: &str) -> Option<LatencyHint> {
        self.get_descriptor(name).map(|d| d.latency_hint)
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn normalize_input(input: &serde_json::Value) -> String {
    serde_json::to_string(input).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use conductor_domain::tool::LatencyHint;
    use std::collections::BTreeSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Echo;

    #[async_trait::async_trait]
    impl Invoker for Echo {
        async fn invoke(&self, input: serde_json::Value) -> Result<serde_json::Value> {
            Ok(input)
        }
    }

    struct Failing;

    #[async_trait::async_trait]
    impl Invoker for Failing {
        async fn invoke(&self, _input: serde_json::Value) -> Result<serde_json::Value> {
            Err(Error::Other("boom".into()))
        }
    }

    struct Counting(AtomicUsize);

    #[async_trait::async_trait]
    impl Invoker for Counting {
        async fn invoke(&self, input: serde_json::Value) -> Result<serde_json::Value> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(input)
        }
    }

    fn descriptor(name: &str, aliases: &[&str], caps: &[&str]) -> ToolDescriptor {
        ToolDescriptor {
            name: name.into(),
            aliases: aliases.iter().map(|s| s.to_string()).collect(),
            capabilities: caps.iter().map(|s| s.to_string()).collect::<BTreeSet<_>>(),
            latency_hint: LatencyHint::Low,
            result_ttl_ms: None,
            schema_ref: "echo".into(),
        }
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let registry = ToolRegistry::new();
        registry
            .register(descriptor("search", &[], &["web_search"]), Arc::new(Echo))
            .unwrap();
        let err = registry.register(descriptor("search", &[], &["web_search"]), Arc::new(Echo));
        assert!(err.is_err());
    }

    #[test]
    fn alias_resolves_to_canonical_name() {
        let registry = ToolRegistry::new();
        registry
            .register(descriptor("tavily_search", &["web_search_alias"], &["web_search"]), Arc::new(Echo))
            .unwrap();
        assert_eq!(registry.resolve("web_search_alias").as_deref(), Some("tavily_search"));
    }

    #[test]
    fn by_capability_returns_matching_tools_sorted() {
        let registry = ToolRegistry::new();
        registry.register(descriptor("b_tool", &[], &["web_search"]), Arc::new(Echo)).unwrap();
        registry.register(descriptor("a_tool", &[], &["web_search"]), Arc::new(Echo)).unwrap();
        registry.register(descriptor("other", &[], &["code_exec"]), Arc::new(Echo)).unwrap();
        assert_eq!(registry.by_capability("web_search"), vec!["a_tool", "b_tool"]);
    }

    #[tokio::test]
    async fn invoke_unknown_tool_is_tool_error() {
        let registry = ToolRegistry::new();
        let err = registry.invoke("missing", serde_json::json!({})).await.unwrap_err();
        matches!(err, Error::ToolError { .. });
    }

    #[tokio::test]
    async fn invoke_failure_is_wrapped_as_tool_error_and_not_fatal() {
        let registry = ToolRegistry::new();
        registry.register(descriptor("flaky", &[], &[]), Arc::new(Failing)).unwrap();
        let err = registry.invoke("flaky", serde_json::json!({})).await.unwrap_err();
        assert!(matches!(err, Error::ToolError { .. }));
    }

    #[tokio::test]
    async fn ttl_cache_avoids_repeat_invocation() {
        let registry = ToolRegistry::new();
        let mut d = descriptor("cached", &[], &[]);
        d.result_ttl_ms = Some(60_000);
        let counting = Arc::new(Counting(AtomicUsize::new(0)));
        registry.register(d, counting.clone()).unwrap();
        let input = serde_json::json!({"q": "x"});
        registry.invoke("cached", input.clone()).await.unwrap();
        registry.invoke("cached", input).await.unwrap();
        assert_eq!(counting.0.load(Ordering::SeqCst), 1, "second call should have hit the cache, not re-invoked");
    }

    #[test]
    fn describe_hides_invoker_details() {
        let registry = ToolRegistry::new();
        registry
            .register(descriptor("search", &[], &["web_search"]), Arc::new(Echo))
            .unwrap();
        let summaries = registry.describe();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].name, "search");
    }
}
