//! LLM client adapters satisfying `conductor_agents::LlmClient`.

mod openai_compat;
mod sse;

pub use openai_compat::OpenAiCompatClient;
