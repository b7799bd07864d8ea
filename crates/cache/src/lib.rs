pub mod fingerprint;
pub mod routing_cache;

pub use fingerprint::fingerprint;
pub use routing_cache::RoutingCache;
