//! Checkpoint capture/resume at HITL boundaries (§4.2, §6.3).
//!
//! Grounded on the teacher's `sessions::store` content-addressed layout:
//! a checkpoint is hashed and written once under its own id, never
//! mutated in place. Content addressing here reuses the sha2+hex
//! fingerprinting idiom from `conductor_cache::fingerprint`, applied to a
//! canonical JSON encoding of the checkpoint body instead of a task
//! fingerprint.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use conductor_domain::error::{Error, Result};
use conductor_domain::reasoning::RoutingDecision;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// A pending HITL request captured at the moment of checkpointing, enough
/// to reconstruct and re-enter the suspension point on resume.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingRequestSnapshot {
    pub request_id: Uuid,
    pub kind: String,
    pub payload: serde_json::Value,
}

/// Enough run state to resume at the next HITL boundary: the original
/// task, the routing decision already made (so routing is not re-run),
/// outputs already produced by completed agents, and the request that
/// was pending when the checkpoint was taken.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub run_id: String,
    pub task_text: String,
    pub conversation_id: Option<Uuid>,
    pub routing_decision: Option<RoutingDecision>,
    pub completed_outputs: HashMap<String, String>,
    pub pending_request: Option<PendingRequestSnapshot>,
    pub created_at: DateTime<Utc>,
}

fn content_id(checkpoint: &Checkpoint) -> Result<String> {
    let bytes = serde_json::to_vec(checkpoint)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(hex::encode(hasher.finalize()))
}

/// File-backed store of checkpoints under a configured directory, one
/// file per content-addressed id.
pub struct CheckpointStore {
    dir: PathBuf,
}

impl CheckpointStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, checkpoint_id: &str) -> PathBuf {
        self.dir.join(format!("{checkpoint_id}.json"))
    }

    /// Write the checkpoint, returning its content-addressed id. Writing
    /// the same logical state twice is a no-op past the first write
    /// (same bytes hash to the same id and overwrite identically).
    pub fn save(&self, checkpoint: &Checkpoint) -> Result<String> {
        std::fs::create_dir_all(&self.dir)?;
        let id = content_id(checkpoint)?;
        let path = self.path_for(&id);
        let bytes = serde_json::to_vec_pretty(checkpoint)?;
        std::fs::write(&path, bytes)?;
        tracing::info!(checkpoint_id = %id, run_id = %checkpoint.run_id, "checkpoint saved");
        Ok(id)
    }

    pub fn load(&self, checkpoint_id: &str) -> Result<Checkpoint> {
        let path = self.path_for(checkpoint_id);
        if !path.exists() {
            return Err(Error::InvalidInput(format!("checkpoint '{checkpoint_id}' not found")));
        }
        let bytes = std::fs::read(&path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(run_id: &str) -> Checkpoint {
        Checkpoint {
            run_id: run_id.to_string(),
            task_text: "write a report".into(),
            conversation_id: None,
            routing_decision: None,
            completed_outputs: HashMap::new(),
            pending_request: Some(PendingRequestSnapshot {
                request_id: Uuid::new_v4(),
                kind: "confirm".into(),
                payload: serde_json::json!({"q": "proceed?"}),
            }),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn save_then_load_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path());
        let checkpoint = sample("run1");
        let id = store.save(&checkpoint).unwrap();
        let loaded = store.load(&id).unwrap();
        assert_eq!(loaded.run_id, "run1");
        assert_eq!(loaded.task_text, "write a report");
    }

    #[test]
    fn load_unknown_id_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path());
        assert!(store.load("deadbeef").is_err());
    }

    #[test]
    fn same_state_yields_same_content_id() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path());
        let mut checkpoint = sample("run1");
        // freeze the timestamp so the two saves are byte-identical
        checkpoint.created_at = DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z").unwrap().with_timezone(&Utc);
        checkpoint.pending_request = None;
        let id1 = store.save(&checkpoint).unwrap();
        let id2 = store.save(&checkpoint).unwrap();
        assert_eq!(id1, id2);
    }
}
