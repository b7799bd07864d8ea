//! Supervisor State Machine (§4.1) — the orchestration entry point that
//! ties the Reasoner Façade, Tool Registry, Agent Runner, Execution
//! Strategies, Routing Cache, and Conversation Memory together into one
//! `run()` call emitting the closed `StreamEvent` set.

pub mod fastpath;
pub mod phases;
pub mod state_machine;

pub use state_machine::Supervisor;
