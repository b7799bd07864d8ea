mod agents;
mod server;

pub use agents::*;
pub use server::*;

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Supervisor budgets and limits (§4.1 "Budgets and limits").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupervisorConfig {
    #[serde(default = "d_max_rounds")]
    pub max_rounds: u32,
    #[serde(default = "d_max_parallel_agents")]
    pub max_parallel_agents: usize,
    #[serde(default = "d_max_refinement_rounds")]
    pub max_refinement_rounds: u32,
    #[serde(default = "d_max_task_length")]
    pub max_task_length: usize,
    #[serde(default = "d_agent_timeout_ms")]
    pub agent_timeout_ms: u64,
    #[serde(default = "d_run_timeout_ms")]
    pub run_timeout_ms: u64,
    #[serde(default = "d_default_agent")]
    pub default_agent: String,
    /// Recent-year threshold used by the time-sensitivity heuristic (§4.3).
    #[serde(default = "d_recent_year_threshold")]
    pub recent_year_threshold: u32,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            max_rounds: d_max_rounds(),
            max_parallel_agents: d_max_parallel_agents(),
            max_refinement_rounds: d_max_refinement_rounds(),
            max_task_length: d_max_task_length(),
            agent_timeout_ms: d_agent_timeout_ms(),
            run_timeout_ms: d_run_timeout_ms(),
            default_agent: d_default_agent(),
            recent_year_threshold: d_recent_year_threshold(),
        }
    }
}

fn d_max_rounds() -> u32 {
    15
}
fn d_max_parallel_agents() -> usize {
    4
}
fn d_max_refinement_rounds() -> u32 {
    // Open Question resolution (§9): refinement disabled by default.
    0
}
fn d_max_task_length() -> usize {
    crate::task::DEFAULT_MAX_TASK_LENGTH
}
fn d_agent_timeout_ms() -> u64 {
    60_000
}
fn d_run_timeout_ms() -> u64 {
    300_000
}
fn d_default_agent() -> String {
    "writer".into()
}
fn d_recent_year_threshold() -> u32 {
    2024
}

/// Routing Cache knobs (§4.6, §6.4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingCacheConfig {
    #[serde(default = "d_routing_cache_ttl_ms")]
    pub ttl_ms: u64,
    #[serde(default = "d_routing_cache_max_entries")]
    pub max_entries: usize,
}

impl Default for RoutingCacheConfig {
    fn default() -> Self {
        Self {
            ttl_ms: d_routing_cache_ttl_ms(),
            max_entries: d_routing_cache_max_entries(),
        }
    }
}

fn d_routing_cache_ttl_ms() -> u64 {
    600_000
}
fn d_routing_cache_max_entries() -> usize {
    1000
}

/// Conversation Memory knobs (§4.7).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    #[serde(default = "d_history_turns")]
    pub history_turns: usize,
    /// `ENABLE_SENSITIVE_DATA` — when false, cache telemetry/traces redact
    /// task text (§6.4).
    #[serde(default)]
    pub enable_sensitive_data: bool,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            history_turns: d_history_turns(),
            enable_sensitive_data: false,
        }
    }
}

fn d_history_turns() -> usize {
    10
}

/// Quality phase knobs — refinement is opt-in (§9 Open Question).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct QualityConfig {
    #[serde(default)]
    pub enable_refinement: bool,
}

/// Top-level runtime configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub admin: AdminConfig,
    #[serde(default)]
    pub supervisor: SupervisorConfig,
    #[serde(default)]
    pub routing_cache: RoutingCacheConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub quality: QualityConfig,
    /// Path to the pre-compiled reasoner artifact. Absent → fallback
    /// heuristics only (§4.3, §6.4 `REASONER_ARTIFACT`).
    #[serde(default)]
    pub reasoner_artifact: Option<String>,
    /// Checkpoint directory (§6.3). Absent disables checkpointing.
    #[serde(default)]
    pub checkpoint_dir: Option<String>,
    /// Configured agents, keyed by name.
    #[serde(default)]
    pub agents: HashMap<String, AgentConfig>,
}

/// Severity of a configuration validation issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

#[derive(Debug, Clone)]
pub struct ConfigIssue {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration, collecting all issues rather than
    /// failing fast (teacher convention: `sa_domain::config::Config::validate`).
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();

        if self.server.port == 0 {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                field: "server.port".into(),
                message: "port must be greater than 0".into(),
            });
        }
        if self.server.host.is_empty() {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                field: "server.host".into(),
                message: "host must not be empty".into(),
            });
        }
        if self.supervisor.max_parallel_agents == 0 {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                field: "supervisor.max_parallel_agents".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.supervisor.max_rounds == 0 {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                field: "supervisor.max_rounds".into(),
                message: "must be greater than 0".into(),
            });
        }
        if !self.agents.contains_key(&self.supervisor.default_agent) && !self.agents.is_empty() {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                field: "supervisor.default_agent".into(),
                message: format!(
                    "default_agent \"{}\" is not among configured agents",
                    self.supervisor.default_agent
                ),
            });
        }
        if self.agents.is_empty() {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Warning,
                field: "agents".into(),
                message: "no agents configured".into(),
            });
        }
        if self.reasoner_artifact.is_none() {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Warning,
                field: "reasoner_artifact".into(),
                message: "no reasoner artifact configured; running on fallback heuristics only"
                    .into(),
            });
        }
        if self.server.cors.allowed_origins.iter().any(|o| o == "*") {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Warning,
                field: "server.cors.allowed_origins".into(),
                message: "wildcard \"*\" allows all origins (not recommended for production)"
                    .into(),
            });
        }

        issues
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_only_warnings() {
        let issues = Config::default().validate();
        assert!(issues.iter().all(|i| i.severity == ConfigSeverity::Warning));
    }

    #[test]
    fn zero_port_is_error() {
        let mut cfg = Config::default();
        cfg.server.port = 0;
        let issues = cfg.validate();
        assert!(issues
            .iter()
            .any(|i| i.field == "server.port" && i.severity == ConfigSeverity::Error));
    }

    #[test]
    fn unknown_default_agent_is_error() {
        let mut cfg = Config::default();
        cfg.agents.insert(
            "writer".into(),
            AgentConfig {
                descriptor: crate::agent::AgentDescriptor {
                    name: "writer".into(),
                    model: "gpt".into(),
                    temperature: 0.7,
                    system_prompt: "you write".into(),
                    tools: Default::default(),
                    timeout_ms: 60_000,
                    max_tokens: None,
                    reasoning_effort: None,
                },
                tool_policy: ToolPolicy::default(),
            },
        );
        cfg.supervisor.default_agent = "nonexistent".into();
        let issues = cfg.validate();
        assert!(issues
            .iter()
            .any(|i| i.field == "supervisor.default_agent" && i.severity == ConfigSeverity::Error));
    }

    #[test]
    fn config_issue_display_format() {
        let issue = ConfigIssue {
            severity: ConfigSeverity::Error,
            field: "server.port".into(),
            message: "port must be greater than 0".into(),
        };
        assert_eq!(
            format!("{issue}"),
            "[ERROR] server.port: port must be greater than 0"
        );
    }
}
