//! History injection formatting (§4.7 step 2).

use conductor_domain::task::Message;

/// Render prior messages as the `Previous conversation:` block. Returns
/// `None` for an empty slice — callers skip the block entirely on the
/// first turn of a fresh conversation.
pub fn format_history(messages: &[Message]) -> Option<String> {
    if messages.is_empty() {
        return None;
    }
    let mut block = String::from("Previous conversation:\n");
    for message in messages {
        block.push_str(message.role.label());
        block.push_str(": ");
        block.push_str(&message.content);
        block.push('\n');
    }
    block.truncate(block.trim_end_matches('\n').len());
    Some(block)
}

/// Build the text sent on the first user turn: prior history (if any)
/// followed by the current task, in the exact shape `Previous
/// conversation:\n{ROLE: content lines}\n\nUser's current message: {task}`.
pub fn build_task_with_history(history: &[Message], task_text: &str) -> String {
    match format_history(history) {
        Some(block) => format!("{block}\n\nUser's current message: {task_text}"),
        None => task_text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conductor_domain::task::Role;

    #[test]
    fn empty_history_yields_no_block() {
        assert!(format_history(&[]).is_none());
        assert_eq!(build_task_with_history(&[], "what time is it?"), "what time is it?");
    }

    #[test]
    fn history_block_has_uppercase_role_labels() {
        let history = vec![
            Message::new(Role::User, "what's the capital of France?"),
            Message::new(Role::Assistant, "Paris."),
        ];
        let rendered = build_task_with_history(&history, "and its population?");
        assert_eq!(
            rendered,
            "Previous conversation:\nUSER: what's the capital of France?\nASSISTANT: Paris.\n\n\
             User's current message: and its population?"
        );
    }

    #[test]
    fn single_prior_message_still_prepends_block() {
        let history = vec![Message::new(Role::User, "hello")];
        let rendered = build_task_with_history(&history, "follow up");
        assert!(rendered.starts_with("Previous conversation:\nUSER: hello"));
        assert!(rendered.ends_with("User's current message: follow up"));
    }
}
