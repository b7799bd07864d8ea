//! Fingerprint computation for the Routing Cache (§4.6).

use sha2::{Digest, Sha256};

/// Normalize task text: trim, collapse internal whitespace, casefold.
pub fn normalize_task_text(text: &str) -> String {
    text.trim()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Stable hash over (normalized task, sorted tool-universe names, reasoner
/// version, routing-config version). Changing the reasoner or config
/// version invalidates every prior entry without an explicit flush.
pub fn fingerprint(
    task_text: &str,
    tool_universe: &[String],
    reasoner_version: &str,
    routing_config_version: &str,
) -> String {
    let mut tools = tool_universe.to_vec();
    tools.sort();

    let mut hasher = Sha256::new();
    hasher.update(normalize_task_text(task_text).as_bytes());
    hasher.update(b"\0");
    hasher.update(tools.join(",").as_bytes());
    hasher.update(b"\0");
    hasher.update(reasoner_version.as_bytes());
    hasher.update(b"\0");
    hasher.update(routing_config_version.as_bytes());

    hex::encode(hasher.finalize())
}
