//! Bounded, TTL-scoped LRU cache of routing decisions (§4.6).

use std::collections::HashMap;
use std::time::Duration;

use chrono::Utc;
use conductor_domain::cache::RoutingCacheEntry;
use conductor_domain::reasoning::RoutingDecision;
use parking_lot::Mutex;

struct Node {
    entry: RoutingCacheEntry,
    /// Monotonic recency counter; higher = more recently used.
    last_used: u64,
}

struct Inner {
    entries: HashMap<String, Node>,
    clock: u64,
    max_entries: usize,
}

impl Inner {
    fn touch(&mut self, key: &str) {
        self.clock += 1;
        if let Some(node) = self.entries.get_mut(key) {
            node.last_used = self.clock;
        }
    }

    fn evict_lru_if_over_capacity(&mut self) {
        while self.entries.len() > self.max_entries {
            if let Some((victim, _)) = self
                .entries
                .iter()
                .min_by_key(|(_, node)| node.last_used)
                .map(|(k, n)| (k.clone(), n.last_used))
            {
                self.entries.remove(&victim);
            } else {
                break;
            }
        }
    }
}

/// Routing Cache: `get` (§4.6 O(1) amortized, expiry-aware), `put`,
/// `invalidate` (bulk clear on version change).
pub struct RoutingCache {
    inner: Mutex<Inner>,
}

impl RoutingCache {
    pub fn new(max_entries: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                clock: 0,
                max_entries,
            }),
        }
    }

    /// Returns the cached decision if present and not expired.
    pub fn get(&self, fingerprint: &str) -> Option<RoutingDecision> {
        let mut inner = self.inner.lock();
        let now = Utc::now();
        let expired = match inner.entries.get(fingerprint) {
            Some(node) => node.entry.is_expired_at(now),
            None => return None,
        };
        if expired {
            inner.entries.remove(fingerprint);
            return None;
        }
        inner.touch(fingerprint);
        inner.entries.get(fingerprint).map(|n| n.entry.decision.clone())
    }

    pub fn put(&self, fingerprint: String, decision: RoutingDecision, ttl: Duration) {
        let now = Utc::now();
        let entry = RoutingCacheEntry {
            fingerprint: fingerprint.clone(),
            decision,
            inserted_at: now,
            expires_at: now + chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::zero()),
        };
        let mut inner = self.inner.lock();
        inner.clock += 1;
        let clock = inner.clock;
        inner.entries.insert(fingerprint, Node { entry, last_used: clock });
        inner.evict_lru_if_over_capacity();
    }

    /// Bulk clear, used on reasoner-version or routing-config-version change.
    pub fn invalidate(&self) {
        self.inner.lock().entries.clear();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conductor_domain::reasoning::ExecutionMode;
    use std::collections::BTreeMap;

    fn decision() -> RoutingDecision {
        RoutingDecision {
            mode: ExecutionMode::Delegated,
            assigned: vec!["writer".into()],
            subtasks: vec!["do it".into()],
            tool_requirements: BTreeMap::new(),
            confidence: 0.9,
        }
    }

    #[test]
    fn put_then_get_within_ttl_returns_value() {
        let cache = RoutingCache::new(10);
        cache.put("fp1".into(), decision(), Duration::from_secs(60));
        assert!(cache.get("fp1").is_some());
    }

    #[test]
    fn get_after_ttl_returns_none() {
        let cache = RoutingCache::new(10);
        cache.put("fp1".into(), decision(), Duration::from_millis(0));
        std::thread::sleep(std::time::Duration::from_millis(5));
        assert!(cache.get("fp1").is_none());
    }

    #[test]
    fn invalidate_clears_everything() {
        let cache = RoutingCache::new(10);
        cache.put("fp1".into(), decision(), Duration::from_secs(60));
        cache.invalidate();
        assert!(cache.is_empty());
    }

    #[test]
    fn capacity_evicts_least_recently_used() {
        let cache = RoutingCache::new(2);
        cache.put("a".into(), decision(), Duration::from_secs(60));
        cache.put("b".into(), decision(), Duration::from_secs(60));
        // touch "a" so "b" becomes the LRU victim
        cache.get("a");
        cache.put("c".into(), decision(), Duration::from_secs(60));
        assert!(cache.get("b").is_none());
        assert!(cache.get("a").is_some());
        assert!(cache.get("c").is_some());
    }
}
