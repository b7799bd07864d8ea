//! Gateway Binary (crate layout) — WebSocket + SSE transports (§6.1), the
//! Event Mapper, the REST admin surface, and the CLI that ties the rest of
//! the `conductor-*` crates into a runnable server.

pub mod api;
pub mod cli;
pub mod llm;
pub mod reasoner_null;
pub mod run_task;
pub mod state;
pub mod tools;
pub mod transport;
