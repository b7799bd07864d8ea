//! Per-run cancellation tokens (§4.2, §5).
//!
//! Adapted from the teacher's `runtime::cancel::CancelMap`, which paired a
//! hand-rolled `AtomicBool` token with a manual parent→child group map for
//! cascading cancellation. `tokio_util::sync::CancellationToken` already
//! provides both halves natively (`is_cancelled`/`cancel` and
//! `child_token()` whose cancellation follows its parent), so the group
//! bookkeeping is dropped in favor of the library primitive; the map here
//! keeps only the per-run registration/lookup/removal the teacher's
//! `CancelMap` also provided.

use std::collections::HashMap;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

/// Tracks the active cancellation token for each running run.
pub struct CancelMap {
    tokens: Mutex<HashMap<String, CancellationToken>>,
}

impl Default for CancelMap {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelMap {
    pub fn new() -> Self {
        Self { tokens: Mutex::new(HashMap::new()) }
    }

    /// Create and register a fresh token for a run, replacing any prior
    /// token registered under the same id.
    pub fn register(&self, run_id: &str) -> CancellationToken {
        let token = CancellationToken::new();
        self.tokens.lock().insert(run_id.to_owned(), token.clone());
        token
    }

    /// Request cancellation of a run. Returns `true` if a token was found.
    pub fn cancel(&self, run_id: &str) -> bool {
        if let Some(token) = self.tokens.lock().get(run_id) {
            token.cancel();
            true
        } else {
            false
        }
    }

    /// Remove the token for a run (called when the run reaches a terminal
    /// state).
    pub fn remove(&self, run_id: &str) {
        self.tokens.lock().remove(run_id);
    }

    pub fn is_running(&self, run_id: &str) -> bool {
        self.tokens.lock().contains_key(run_id)
    }

    pub fn token(&self, run_id: &str) -> Option<CancellationToken> {
        self.tokens.lock().get(run_id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_and_cancel() {
        let map = CancelMap::new();
        let token = map.register("run1");
        assert!(!token.is_cancelled());
        assert!(map.is_running("run1"));

        assert!(map.cancel("run1"));
        assert!(token.is_cancelled());

        map.remove("run1");
        assert!(!map.is_running("run1"));
        assert!(!map.cancel("run1"));
    }

    #[test]
    fn cancel_nonexistent_returns_false() {
        let map = CancelMap::new();
        assert!(!map.cancel("ghost"));
    }

    #[test]
    fn register_replaces_previous_token() {
        let map = CancelMap::new();
        let old = map.register("run1");
        let new = map.register("run1");
        map.cancel("run1");
        assert!(!old.is_cancelled());
        assert!(new.is_cancelled());
    }

    #[test]
    fn remove_is_idempotent() {
        let map = CancelMap::new();
        map.register("run1");
        map.remove("run1");
        map.remove("run1");
        assert!(!map.is_running("run1"));
    }
}
