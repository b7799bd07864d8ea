//! Conversation Memory (§4.7) — thread-like history injection into the
//! first agent turn of a run, plus an append-only audit sink for completed
//! runs.

pub mod format;
pub mod sink;
pub mod store;

pub use format::build_task_with_history;
pub use sink::{HistorySink, InMemoryHistorySink, RunRecord};
pub use store::{ConversationStore, ConversationSummary, InMemoryConversationStore};
