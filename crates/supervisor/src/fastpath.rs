//! Fast-path classifier (§4.1): trivial tasks skip routing/quality and go
//! straight to a single default-agent turn. Disabled whenever the
//! conversation already holds a prior assistant message, so multi-turn
//! context is never silently dropped.

use conductor_domain::task::{Conversation, Role};

const GREETINGS: &[&str] = &[
    "hi", "hello", "hey", "yo", "good morning", "good afternoon", "good evening", "thanks", "thank you",
];

const FOLLOWUP_MARKERS: &[&str] =
    &["it", "that", "those", "again", "also", "and then", "what about", "continue", "more", "the above"];

const FACTOID_PREFIXES: &[&str] = &["what is", "what's", "who is", "who's", "define", "when is", "when was"];

/// Whether `task_text` alone (ignoring conversation history) looks trivial:
/// a greeting, a small arithmetic question, or a short factoid with no
/// follow-up markers.
pub fn is_trivial_task(task_text: &str) -> bool {
    let lower = task_text.trim().to_lowercase();
    if lower.is_empty() {
        return false;
    }
    let bare = lower.trim_end_matches(['!', '.', '?']);
    if GREETINGS.contains(&bare) {
        return true;
    }

    let word_count = lower.split_whitespace().count();
    if word_count > 12 {
        return false;
    }
    if FOLLOWUP_MARKERS.iter().any(|m| lower.contains(m)) {
        return false;
    }

    is_small_arithmetic(&lower) || is_short_factoid(&lower, word_count)
}

fn is_small_arithmetic(lower: &str) -> bool {
    let has_digit = lower.chars().any(|c| c.is_ascii_digit());
    let has_operator = ['+', '-', '*', '/', '×', '÷']
        .iter()
        .any(|op| lower.contains(*op))
        || lower.contains("plus")
        || lower.contains("minus")
        || lower.contains("times");
    has_digit && has_operator
}

fn is_short_factoid(lower: &str, word_count: usize) -> bool {
    word_count <= 8 && FACTOID_PREFIXES.iter().any(|p| lower.starts_with(p))
}

/// The full fast-path gate (§4.1): a trivial task AND no prior assistant
/// turn in the bound conversation.
pub fn is_fast_path_eligible(task_text: &str, conversation: &Conversation) -> bool {
    let has_prior_assistant_turn = conversation.messages.iter().any(|m| m.role == Role::Assistant);
    !has_prior_assistant_turn && is_trivial_task(task_text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use conductor_domain::task::Message;

    #[test]
    fn greeting_is_trivial() {
        assert!(is_trivial_task("hi"));
        assert!(is_trivial_task("Hello!"));
        assert!(is_trivial_task("  good morning "));
    }

    #[test]
    fn small_arithmetic_is_trivial() {
        assert!(is_trivial_task("what is 2 + 2?"));
        assert!(is_trivial_task("12 times 4"));
    }

    #[test]
    fn short_factoid_is_trivial() {
        assert!(is_trivial_task("what is the capital of France?"));
    }

    #[test]
    fn long_or_followup_task_is_not_trivial() {
        assert!(!is_trivial_task("write me a five-paragraph essay on climate change policy"));
        assert!(!is_trivial_task("what about that again?"));
    }

    #[test]
    fn fast_path_disabled_once_conversation_has_an_assistant_turn() {
        let mut conversation = Conversation::new(None);
        assert!(is_fast_path_eligible("hi", &conversation));

        conversation.push(Message::new(Role::User, "hi"));
        conversation.push(Message::new(Role::Assistant, "hello!"));
        assert!(!is_fast_path_eligible("hi", &conversation));
    }
}
