//! Agent registry: one-shot load of configured agent descriptors, keyed by
//! name. Mirrors the teacher's `AgentManager::from_config/get/list`.

use std::collections::HashMap;

use conductor_domain::agent::AgentDescriptor;
use conductor_domain::config::agents::{AgentConfig, ToolPolicy};
use conductor_domain::error::{Error, Result};

pub struct AgentRegistry {
    descriptors: HashMap<String, AgentDescriptor>,
    policies: HashMap<String, ToolPolicy>,
}

impl AgentRegistry {
    pub fn from_config(agents: &HashMap<String, AgentConfig>) -> Result<Self> {
        if agents.is_empty() {
            return Err(Error::InvalidInput("no agents configured".into()));
        }
        let mut descriptors = HashMap::with_capacity(agents.len());
        let mut policies = HashMap::with_capacity(agents.len());
        for (name, cfg) in agents {
            if cfg.descriptor.name != *name {
                return Err(Error::InvalidInput(format!(
                    "agent config key '{name}' does not match descriptor name '{}'",
                    cfg.descriptor.name
                )));
            }
            descriptors.insert(name.clone(), cfg.descriptor.clone());
            policies.insert(name.clone(), cfg.tool_policy.clone());
        }
        Ok(Self { descriptors, policies })
    }

    pub fn get(&self, name: &str) -> Option<&AgentDescriptor> {
        self.descriptors.get(name)
    }

    pub fn tool_policy(&self, name: &str) -> Option<&ToolPolicy> {
        self.policies.get(name)
    }

    pub fn list(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.descriptors.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Tools an agent may invoke given its declared tool set and its
    /// configured allow/deny policy.
    pub fn allowed_tools(&self, name: &str) -> Vec<String> {
        let Some(descriptor) = self.descriptors.get(name) else {
            return Vec::new();
        };
        let policy = self.policies.get(name);
        descriptor
            .tools
            .iter()
            .filter(|tool| policy.map(|p| p.allows(tool)).unwrap_or(true))
            .cloned()
            .collect()
    }
}
