//! Run record and bounded in-memory store (§3 Run, §6.3 persisted layout).
//!
//! The live, non-serializable parts of a run (cancel signal, pending HITL
//! map) are owned by `conductor_sessions::manager::SessionManager`; this
//! type is the serializable projection used for persistence, introspection
//! and the admin surface.

use std::collections::{HashMap, VecDeque};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::reasoning::QualityVerdict;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    Running,
    NeedsResponse,
    Cancelled,
    Succeeded,
    Failed,
}

impl RunStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Cancelled | Self::Succeeded | Self::Failed)
    }
}

/// A single durable execution step, kept for introspection (ambient;
/// not required by the spec's data model but carried for admin tooling).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunNode {
    pub node_id: u32,
    pub label: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub is_error: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    pub run_id: Uuid,
    pub task_preview: String,
    pub conversation_id: Option<Uuid>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub status: RunStatus,
    pub checkpoint_ref: Option<String>,
    pub final_result: Option<String>,
    pub quality: Option<QualityVerdict>,
    pub error: Option<String>,
    pub nodes: Vec<RunNode>,
}

impl Run {
    pub fn new(task_text: &str, conversation_id: Option<Uuid>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            task_preview: truncate(task_text, 200),
            conversation_id,
            started_at: Utc::now(),
            ended_at: None,
            status: RunStatus::Pending,
            checkpoint_ref: None,
            final_result: None,
            quality: None,
            error: None,
            nodes: Vec::new(),
        }
    }

    pub fn finish(&mut self, status: RunStatus) {
        self.status = status;
        self.ended_at = Some(Utc::now());
    }
}

/// Truncate to at most `max_chars` characters, respecting UTF-8 boundaries.
pub fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let mut end = s.len();
    for (count, (idx, _)) in s.char_indices().enumerate() {
        if count == max_chars {
            end = idx;
            break;
        }
    }
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &s[..end])
}

const MAX_RUNS_IN_MEMORY: usize = 2000;

struct RunStoreInner {
    runs: VecDeque<Run>,
    index: HashMap<Uuid, usize>,
    base_seq: usize,
}

impl RunStoreInner {
    fn new() -> Self {
        Self {
            runs: VecDeque::new(),
            index: HashMap::new(),
            base_seq: 0,
        }
    }

    fn deque_idx(&self, seq: usize) -> usize {
        seq - self.base_seq
    }

    fn get(&self, run_id: &Uuid) -> Option<&Run> {
        let seq = *self.index.get(run_id)?;
        self.runs.get(self.deque_idx(seq))
    }

    fn get_mut(&mut self, run_id: &Uuid) -> Option<&mut Run> {
        let seq = *self.index.get(run_id)?;
        self.runs.get_mut(self.deque_idx(seq))
    }

    fn push_back(&mut self, run: Run) {
        let seq = self.base_seq + self.runs.len();
        self.index.insert(run.run_id, seq);
        self.runs.push_back(run);
    }

    fn pop_front(&mut self) -> Option<Run> {
        let run = self.runs.pop_front()?;
        self.index.remove(&run.run_id);
        self.base_seq += 1;
        Some(run)
    }
}

/// Bounded in-memory ring of recent runs, optionally durable via an
/// append-only JSONL log. Grounded on the teacher's `RunStore`.
pub struct RunStore {
    inner: RwLock<RunStoreInner>,
    log_path: Option<PathBuf>,
    capacity: usize,
}

impl RunStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(RunStoreInner::new()),
            log_path: None,
            capacity: MAX_RUNS_IN_MEMORY,
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            ..Self::new()
        }
    }

    /// Load recent runs from a JSONL file and persist future inserts there.
    pub fn with_log_file(dir: &Path, capacity: usize) -> std::io::Result<Self> {
        std::fs::create_dir_all(dir)?;
        let log_path = dir.join("runs.jsonl");
        let mut inner = RunStoreInner::new();
        if let Ok(content) = std::fs::read_to_string(&log_path) {
            let lines: Vec<&str> = content.lines().collect();
            for line in lines.iter().rev().take(capacity).rev() {
                if let Ok(run) = serde_json::from_str::<Run>(line) {
                    inner.push_back(run);
                }
            }
        }
        Ok(Self {
            inner: RwLock::new(inner),
            log_path: Some(log_path),
            capacity,
        })
    }

    pub fn insert(&self, run: Run) {
        if let Some(path) = &self.log_path {
            self.append_jsonl(path, &run);
        }
        let mut inner = self.inner.write();
        inner.push_back(run);
        while inner.runs.len() > self.capacity {
            inner.pop_front();
        }
    }

    pub fn update<F: FnOnce(&mut Run)>(&self, run_id: &Uuid, f: F) -> bool {
        let mut inner = self.inner.write();
        match inner.get_mut(run_id) {
            Some(run) => {
                f(run);
                let updated = run.clone();
                drop(inner);
                if let Some(path) = &self.log_path {
                    self.append_jsonl(path, &updated);
                }
                true
            }
            None => false,
        }
    }

    pub fn get(&self, run_id: &Uuid) -> Option<Run> {
        self.inner.read().get(run_id).cloned()
    }

    /// Most recent runs first.
    pub fn list_recent(&self, limit: usize) -> Vec<Run> {
        self.inner
            .read()
            .runs
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect()
    }

    fn append_jsonl(&self, path: &Path, run: &Run) {
        if let Ok(line) = serde_json::to_string(run) {
            if let Ok(mut file) = std::fs::OpenOptions::new().create(true).append(true).open(path)
            {
                let _ = writeln!(file, "{line}");
            }
        }
    }
}

impl Default for RunStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_respects_char_boundaries() {
        let s = "héllo wörld";
        let t = truncate(s, 3);
        assert!(t.chars().count() <= 4); // 3 chars + ellipsis
    }

    #[test]
    fn truncate_short_string_is_unchanged() {
        assert_eq!(truncate("hi", 10), "hi");
    }

    #[test]
    fn insert_and_get_roundtrip() {
        let store = RunStore::new();
        let run = Run::new("hello", None);
        let id = run.run_id;
        store.insert(run);
        assert!(store.get(&id).is_some());
    }

    #[test]
    fn update_mutates_in_place() {
        let store = RunStore::new();
        let run = Run::new("hello", None);
        let id = run.run_id;
        store.insert(run);
        assert!(store.update(&id, |r| r.finish(RunStatus::Succeeded)));
        assert_eq!(store.get(&id).unwrap().status, RunStatus::Succeeded);
    }

    #[test]
    fn bounded_capacity_evicts_oldest() {
        let store = RunStore::with_capacity(2);
        let r1 = Run::new("one", None);
        let id1 = r1.run_id;
        store.insert(r1);
        store.insert(Run::new("two", None));
        store.insert(Run::new("three", None));
        assert!(store.get(&id1).is_none());
        assert_eq!(store.list_recent(10).len(), 2);
    }

    #[test]
    fn run_status_terminal_set() {
        assert!(RunStatus::Succeeded.is_terminal());
        assert!(RunStatus::Failed.is_terminal());
        assert!(RunStatus::Cancelled.is_terminal());
        assert!(!RunStatus::Running.is_terminal());
        assert!(!RunStatus::NeedsResponse.is_terminal());
    }
}
