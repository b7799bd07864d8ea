pub mod cancel;
pub mod checkpoint;
pub mod hitl;
pub mod manager;

pub use cancel::CancelMap;
pub use checkpoint::{Checkpoint, CheckpointStore, PendingRequestSnapshot};
pub use hitl::{HitlDecision, HitlStore, RequestInfo};
pub use manager::SessionManager;
