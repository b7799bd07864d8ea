use serde::{Deserialize, Serialize};

use crate::agent::AgentDescriptor;

/// Tool allow/deny policy — prefix-based matching (§4.5).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ToolPolicy {
    /// Tool name prefixes this agent may use. Empty or `["*"]` = unrestricted.
    #[serde(default)]
    pub allow: Vec<String>,
    /// Tool name prefixes this agent is denied (checked before allow).
    #[serde(default)]
    pub deny: Vec<String>,
}

impl ToolPolicy {
    /// Whether `tool_name` is permitted. Case-insensitive; deny wins.
    pub fn allows(&self, tool_name: &str) -> bool {
        let name = tool_name.to_ascii_lowercase();

        for d in &self.deny {
            let d_lower = d.to_ascii_lowercase();
            if d_lower == "*" || name == d_lower || name.starts_with(&format!("{d_lower}.")) {
                return false;
            }
        }
        if self.allow.is_empty() || self.allow.iter().any(|a| a == "*") {
            return true;
        }
        self.allow.iter().any(|a| {
            let a_lower = a.to_ascii_lowercase();
            name == a_lower || name.starts_with(&format!("{a_lower}."))
        })
    }
}

/// Configured agent entry: the static descriptor plus an optional policy
/// restriction narrower than the descriptor's own `tools` set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(flatten)]
    pub descriptor: AgentDescriptor,
    #[serde(default)]
    pub tool_policy: ToolPolicy,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_policy_allows_all() {
        let p = ToolPolicy::default();
        assert!(p.allows("tavily_search"));
    }

    #[test]
    fn allow_restricts_to_prefixes() {
        let p = ToolPolicy {
            allow: vec!["web".into()],
            deny: vec![],
        };
        assert!(p.allows("web.search"));
        assert!(!p.allows("code_exec"));
    }

    #[test]
    fn deny_takes_precedence_over_allow() {
        let p = ToolPolicy {
            allow: vec!["*".into()],
            deny: vec!["code_exec".into()],
        };
        assert!(!p.allows("code_exec"));
        assert!(p.allows("web_search"));
    }

    #[test]
    fn case_insensitive_matching() {
        let p = ToolPolicy {
            allow: vec!["Web".into()],
            deny: vec![],
        };
        assert!(p.allows("WEB.SEARCH"));
    }
}
