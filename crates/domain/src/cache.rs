//! RoutingCacheEntry — the data model for the Routing Cache (§3, §4.6).
//! The cache's LRU/TTL mechanics live in `conductor-cache`; this is just
//! the stored shape.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::reasoning::RoutingDecision;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingCacheEntry {
    pub fingerprint: String,
    pub decision: RoutingDecision,
    pub inserted_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl RoutingCacheEntry {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}
