//! Fallback heuristics used when the reasoner is unavailable or its output
//! repeatedly fails assertions (§4.3).

use std::collections::{BTreeMap, BTreeSet};

use conductor_domain::reasoning::{Complexity, ExecutionMode, QualityVerdict, RoutingDecision, TaskAnalysis};

const TIME_SENSITIVE_MARKERS: [&str; 3] = ["today", "latest", "current"];

/// Whether the task text contains a time-sensitive marker word or a
/// 4-digit year at or beyond `recent_year_threshold` (§4.3 fallback rule,
/// also used by the Routing phase's time-sensitivity normalization).
pub fn is_time_sensitive(task_text: &str, recent_year_threshold: u32) -> bool {
    let lower = task_text.to_lowercase();
    if TIME_SENSITIVE_MARKERS.iter().any(|m| lower.contains(m)) {
        return true;
    }
    for token in lower.split(|c: char| !c.is_ascii_digit()) {
        if token.len() == 4 {
            if let Ok(year) = token.parse::<u32>() {
                if (1900..=2200).contains(&year) && year >= recent_year_threshold {
                    return true;
                }
            }
        }
    }
    false
}

/// Heuristic `TaskAnalysis` when `Reasoner.analyze_task` is unavailable.
pub fn fallback_analysis(task_text: &str, recent_year_threshold: u32) -> TaskAnalysis {
    let needs_web_search = is_time_sensitive(task_text, recent_year_threshold);
    TaskAnalysis {
        complexity: Complexity::Medium,
        required_capabilities: BTreeSet::new(),
        recommended_tools: BTreeSet::new(),
        needs_web_search,
        search_query: if needs_web_search { Some(task_text.to_string()) } else { None },
        notes: Some("fallback heuristic analysis".into()),
    }
}

/// Heuristic `RoutingDecision` when `Reasoner.route_task` is unavailable
/// or assertions still fail after retry.
pub fn fallback_routing(
    task_text: &str,
    recent_year_threshold: u32,
    default_agent: &str,
    researcher_agent: Option<&str>,
    writer_agent: Option<&str>,
) -> RoutingDecision {
    let time_sensitive = is_time_sensitive(task_text, recent_year_threshold);
    match (time_sensitive, researcher_agent, writer_agent) {
        (true, Some(researcher), Some(writer)) => RoutingDecision {
            mode: ExecutionMode::Sequential,
            assigned: vec![researcher.to_string(), writer.to_string()],
            subtasks: vec![task_text.to_string(), "synthesize the research".to_string()],
            tool_requirements: BTreeMap::new(),
            confidence: 0.3,
        },
        _ => RoutingDecision {
            mode: ExecutionMode::Delegated,
            assigned: vec![default_agent.to_string()],
            subtasks: vec![task_text.to_string()],
            tool_requirements: BTreeMap::new(),
            confidence: 0.3,
        },
    }
}

pub fn fallback_quality() -> QualityVerdict {
    QualityVerdict::fallback()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_marker_words() {
        assert!(is_time_sensitive("what's the latest news", 2024));
        assert!(is_time_sensitive("TODAY's weather", 2024));
    }

    #[test]
    fn detects_recent_year() {
        assert!(is_time_sensitive("events in 2025", 2024));
        assert!(!is_time_sensitive("events in 1999", 2024));
    }

    #[test]
    fn fallback_routing_prefers_researcher_when_time_sensitive() {
        let d = fallback_routing("latest ai news", 2024, "writer", Some("researcher"), Some("writer"));
        assert_eq!(d.assigned, vec!["researcher".to_string(), "writer".to_string()]);
    }

    #[test]
    fn fallback_routing_defaults_to_single_agent() {
        let d = fallback_routing("say hi", 2024, "writer", Some("researcher"), Some("writer"));
        assert_eq!(d.assigned, vec!["writer".to_string()]);
    }

    #[test]
    fn fallback_quality_score_is_six() {
        assert_eq!(fallback_quality().score, 6.0);
    }
}
