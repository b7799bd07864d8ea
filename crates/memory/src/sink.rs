//! Run audit sink (§4.7 supplement) — one append-only record per completed
//! run, written at the same point the teacher persists its assistant
//! transcript line. Grounded on `runtime::mod::persist_transcript` (a
//! non-fatal, warn-and-continue append) and `RunStore::append_jsonl`'s
//! JSONL-on-disk layout.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use conductor_domain::reasoning::{QualityVerdict, RoutingDecision};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One line of the run audit log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: Uuid,
    pub task: String,
    pub routing: Option<RoutingDecision>,
    pub quality: Option<QualityVerdict>,
    pub duration_ms: u64,
    pub completed_at: DateTime<Utc>,
}

impl RunRecord {
    /// Redact `task` to its length only, per `ENABLE_SENSITIVE_DATA` (§6.4).
    pub fn redacted(mut self) -> Self {
        self.task = format!("<redacted:{}chars>", self.task.chars().count());
        self
    }
}

/// Append-only sink for completed-run audit records. Failures are
/// logged and swallowed — the audit trail is diagnostic, never
/// run-critical.
pub trait HistorySink: Send + Sync {
    fn append(&self, record: RunRecord);
}

/// In-process sink, useful for tests and as the default when no
/// on-disk audit log is configured.
#[derive(Default)]
pub struct InMemoryHistorySink {
    records: RwLock<Vec<RunRecord>>,
}

impl InMemoryHistorySink {
    pub fn new() -> Self {
        Self { records: RwLock::new(Vec::new()) }
    }

    pub fn records(&self) -> Vec<RunRecord> {
        self.records.read().clone()
    }
}

impl HistorySink for InMemoryHistorySink {
    fn append(&self, record: RunRecord) {
        self.records.write().push(record);
    }
}

/// File-backed sink appending one JSON line per run under `path`.
pub struct JsonlHistorySink {
    path: PathBuf,
}

impl JsonlHistorySink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl HistorySink for JsonlHistorySink {
    fn append(&self, record: RunRecord) {
        let Ok(mut line) = serde_json::to_string(&record) else {
            tracing::warn!(run_id = %record.run_id, "failed to serialize run audit record");
            return;
        };
        line.push('\n');

        if let Some(parent) = self.path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                tracing::warn!(error = %e, "failed to create run audit log directory");
                return;
            }
        }

        use std::io::Write;
        let result = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .and_then(|mut file| file.write_all(line.as_bytes()));

        if let Err(e) = result {
            tracing::warn!(error = %e, run_id = %record.run_id, "failed to persist run audit record");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(task: &str) -> RunRecord {
        RunRecord {
            run_id: Uuid::new_v4(),
            task: task.to_string(),
            routing: None,
            quality: None,
            duration_ms: 42,
            completed_at: Utc::now(),
        }
    }

    #[test]
    fn in_memory_sink_accumulates_records() {
        let sink = InMemoryHistorySink::new();
        sink.append(sample("first"));
        sink.append(sample("second"));
        assert_eq!(sink.records().len(), 2);
    }

    #[test]
    fn redacted_drops_task_text_but_keeps_length() {
        let record = sample("a secret plan").redacted();
        assert!(!record.task.contains("secret"));
        assert!(record.task.contains("13chars"));
    }

    #[test]
    fn jsonl_sink_appends_one_line_per_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("runs.jsonl");
        let sink = JsonlHistorySink::new(&path);
        sink.append(sample("one"));
        sink.append(sample("two"));

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 2);
    }
}
