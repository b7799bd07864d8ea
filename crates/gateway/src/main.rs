use std::sync::Arc;

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use clap::Parser;
use sha2::{Digest, Sha256};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing_subscriber::EnvFilter;

use conductor_agents::{AgentRegistry, AgentRunner};
use conductor_cache::RoutingCache;
use conductor_domain::config::{Config, ConfigSeverity};
use conductor_memory::sink::JsonlHistorySink;
use conductor_memory::{HistorySink, InMemoryConversationStore, InMemoryHistorySink};
use conductor_reasoner::ReasonerFacade;
use conductor_sessions::SessionManager;
use conductor_tools::ToolRegistry;

use conductor_gateway::cli::{Cli, Command, ConfigCommand};
use conductor_gateway::llm::OpenAiCompatClient;
use conductor_gateway::reasoner_null::NullReasoner;
use conductor_gateway::state::{AppState, RunEventRegistry};
use conductor_gateway::tools::{ApprovalTool, TavilySearchTool};
use conductor_gateway::{api, cli, transport};

/// Env var naming the LLM API key (read fresh per request by
/// `OpenAiCompatClient`, never cached alongside the admin/API token hashes).
const LLM_API_KEY_ENV: &str = "LLM_API_KEY";
const TAVILY_API_KEY_ENV: &str = "TAVILY_API_KEY";
const HITL_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(15 * 60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        None | Some(Command::Serve) => {
            init_tracing();
            let (config, _config_path) = cli::load_config()?;
            run_server(Arc::new(config)).await
        }
        Some(Command::Doctor) => {
            let (config, config_path) = cli::load_config()?;
            let passed = cli::doctor::run(&config, &config_path).await?;
            if !passed {
                std::process::exit(1);
            }
            Ok(())
        }
        Some(Command::Config(ConfigCommand::Validate)) => {
            let (config, config_path) = cli::load_config()?;
            if !cli::config::validate(&config, &config_path) {
                std::process::exit(1);
            }
            Ok(())
        }
        Some(Command::Config(ConfigCommand::Show)) => {
            let (config, _config_path) = cli::load_config()?;
            cli::config::show(&config);
            Ok(())
        }
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,conductor_gateway=debug")))
        .json()
        .init();
}

async fn run_server(config: Arc<Config>) -> anyhow::Result<()> {
    tracing::info!("conductor starting");

    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    if issues.iter().any(|i| i.severity == ConfigSeverity::Error) {
        anyhow::bail!(
            "config validation failed with {} error(s)",
            issues.iter().filter(|i| i.severity == ConfigSeverity::Error).count()
        );
    }

    // ── Tool registry ────────────────────────────────────────────────
    let tool_registry = Arc::new(ToolRegistry::new());
    conductor_gateway::tools::register_builtin_descriptors(&tool_registry, TAVILY_API_KEY_ENV)
        .context("registering built-in tools")?;
    tracing::info!("tool registry ready");

    // ── Agent registry + LLM client + runner ─────────────────────────
    let agent_registry = AgentRegistry::from_config(&config.agents).context("loading agent registry")?;
    tracing::info!(agents = agent_registry.len(), "agent registry ready");

    let llm_base_url = std::env::var("LLM_BASE_URL").unwrap_or_else(|_| "https://api.openai.com/v1".into());
    let llm_client = Arc::new(OpenAiCompatClient::new(llm_base_url, LLM_API_KEY_ENV));
    let agent_runner = AgentRunner::new(llm_client, tool_registry.clone());

    // ── Routing cache ────────────────────────────────────────────────
    let routing_cache = RoutingCache::new(config.routing_cache.max_entries);

    // ── Reasoner façade ──────────────────────────────────────────────
    let researcher_agent = agent_registry.list().iter().find(|n| **n == "researcher").map(|n| n.to_string());
    let writer_agent = agent_registry.list().iter().find(|n| **n == "writer").map(|n| n.to_string());
    let reasoner: ReasonerFacade<NullReasoner> = ReasonerFacade::new(
        None,
        config.supervisor.recent_year_threshold,
        config.supervisor.default_agent.clone(),
        researcher_agent,
        writer_agent,
    );
    if config.reasoner_artifact.is_none() {
        tracing::warn!("no reasoner artifact configured — running on fallback heuristics only");
    }

    // ── Conversation store + run audit sink ──────────────────────────
    let conversation_store = Arc::new(InMemoryConversationStore::new());
    let history_sink: Arc<dyn HistorySink> = match &config.checkpoint_dir {
        Some(dir) => Arc::new(JsonlHistorySink::new(std::path::Path::new(dir).join("runs.jsonl"))),
        None => Arc::new(InMemoryHistorySink::new()),
    };

    // ── Supervisor ───────────────────────────────────────────────────
    let supervisor = Arc::new(conductor_supervisor::Supervisor::new(
        reasoner,
        routing_cache,
        agent_registry,
        tool_registry.clone(),
        agent_runner,
        conversation_store,
        history_sink,
        config.supervisor.clone(),
        config.memory.history_turns,
        config.quality.enable_refinement,
        "c1".to_string(),
        config.routing_cache.ttl_ms,
    ));
    tracing::info!("supervisor ready");

    // ── Run store + session manager ──────────────────────────────────
    let run_store = match &config.checkpoint_dir {
        Some(dir) => conductor_domain::run::RunStore::with_log_file(std::path::Path::new(dir), 2000)
            .context("initializing run store log")?,
        None => conductor_domain::run::RunStore::new(),
    };
    let checkpoint_dir = config.checkpoint_dir.clone().unwrap_or_else(|| "./data/checkpoints".into());
    let session_manager = Arc::new(SessionManager::new(run_store, HITL_TIMEOUT, checkpoint_dir));
    tracing::info!("session manager ready");

    let run_events = RunEventRegistry::new();

    // register the approval tool now that session_manager/run_events exist
    tool_registry
        .register(
            conductor_domain::tool::ToolDescriptor {
                name: "request_approval".into(),
                aliases: Default::default(),
                capabilities: ["hitl".to_string()].into_iter().collect(),
                latency_hint: conductor_domain::tool::LatencyHint::High,
                result_ttl_ms: None,
                schema_ref: "request_approval.schema.json".into(),
            },
            Arc::new(ApprovalTool::new(session_manager.clone(), run_events.clone(), HITL_TIMEOUT)),
        )
        .context("registering request_approval tool")?;

    // ── Admin token (read once, hash for constant-time comparison) ───
    let admin_token_hash = match std::env::var(&config.admin.token_env) {
        Ok(token) if !token.is_empty() => {
            tracing::info!(env_var = %config.admin.token_env, "admin bearer-token auth enabled");
            Some(Sha256::digest(token.as_bytes()).to_vec())
        }
        _ => {
            tracing::warn!(env_var = %config.admin.token_env, "admin bearer-token auth DISABLED");
            None
        }
    };

    let state = AppState {
        config: config.clone(),
        supervisor,
        session_manager,
        run_events,
        admin_token_hash,
    };

    // ── CORS layer (config-aware) ─────────────────────────────────────
    let cors_layer = build_cors_layer(&config.server.cors);

    // ── Concurrency limit (backpressure protection) ───────────────────
    let max_concurrent = std::env::var("CONDUCTOR_MAX_CONCURRENT_REQUESTS")
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(256);
    tracing::info!(max_concurrent, "concurrency limit set");

    let app = api::router(state.clone())
        .merge(transport::router())
        .layer(cors_layer)
        .layer(tower::limit::ConcurrencyLimitLayer::new(max_concurrent))
        .with_state(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await.with_context(|| format!("binding to {addr}"))?;

    tracing::info!(addr = %addr, "conductor listening");

    axum::serve(listener, app).await.context("axum server error")?;

    Ok(())
}

/// Build a [`CorsLayer`] from the configured allowed origins. Grounded on
/// the teacher's `build_cors_layer`: a literal `"*"` is fully permissive
/// (logged), `host:*` entries match any numeric port on that host, anything
/// else is an exact match.
fn build_cors_layer(cors: &conductor_domain::config::CorsConfig) -> CorsLayer {
    use axum::http::header;

    if cors.allowed_origins.len() == 1 && cors.allowed_origins[0] == "*" {
        tracing::warn!("CORS configured with wildcard \"*\" — all origins allowed");
        return CorsLayer::new()
            .allow_origin(tower_http::cors::Any)
            .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);
    }

    let mut exact: Vec<HeaderValue> = Vec::new();
    let mut wildcard_prefixes: Vec<String> = Vec::new();

    for origin in &cors.allowed_origins {
        if origin.ends_with(":*") {
            wildcard_prefixes.push(origin.trim_end_matches('*').to_owned());
        } else if let Ok(hv) = origin.parse::<HeaderValue>() {
            exact.push(hv);
        } else {
            tracing::warn!(origin = %origin, "invalid CORS origin, skipping");
        }
    }

    let allow_origin = if wildcard_prefixes.is_empty() {
        AllowOrigin::list(exact)
    } else {
        AllowOrigin::predicate(move |origin, _| {
            let origin_str = origin.to_str().unwrap_or("");
            if exact.iter().any(|e| e.as_bytes() == origin.as_bytes()) {
                return true;
            }
            wildcard_prefixes.iter().any(|prefix| {
                origin_str
                    .strip_prefix(prefix.as_str())
                    .map(|port| !port.is_empty() && port.chars().all(|c| c.is_ascii_digit()))
                    .unwrap_or(false)
            })
        })
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}
