pub mod registry;
pub mod runner;

pub use registry::AgentRegistry;
pub use runner::{AgentRunner, AgentTurnEvent, LlmClient, LlmStreamEvent, PerAgentResult};
