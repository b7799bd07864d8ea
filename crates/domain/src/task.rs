//! Task, Message, and Conversation — the durable conversational data model (§3).

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

/// Default cap on task text length, in characters.
pub const DEFAULT_MAX_TASK_LENGTH: usize = 10_000;

/// An immutable per-run task submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub text: String,
    pub submitted_at: DateTime<Utc>,
    pub conversation_id: Option<Uuid>,
    pub reasoning_effort: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Task {
    /// Build a task from raw user input, trimming and validating length.
    ///
    /// Mirrors the teacher's validate-then-construct convention rather than
    /// accepting arbitrary strings at the type boundary.
    pub fn new(text: impl Into<String>, conversation_id: Option<Uuid>) -> Result<Self> {
        Self::with_max_length(text, conversation_id, DEFAULT_MAX_TASK_LENGTH)
    }

    pub fn with_max_length(
        text: impl Into<String>,
        conversation_id: Option<Uuid>,
        max_length: usize,
    ) -> Result<Self> {
        let trimmed = text.into().trim().to_string();
        if trimmed.is_empty() {
            return Err(Error::InvalidInput("task text must not be empty".into()));
        }
        if trimmed.chars().count() > max_length {
            return Err(Error::InvalidInput(format!(
                "task text exceeds maximum length of {max_length} characters"
            )));
        }
        Ok(Self {
            text: trimmed,
            submitted_at: Utc::now(),
            conversation_id,
            reasoning_effort: None,
            metadata: HashMap::new(),
        })
    }
}

/// Speaker role of a `Message`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    /// Uppercase label used in formatted conversation history (§4.7).
    pub fn label(&self) -> &'static str {
        match self {
            Role::User => "USER",
            Role::Assistant => "ASSISTANT",
            Role::System => "SYSTEM",
        }
    }
}

/// A single turn in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub agent_id: Option<String>,
    pub reasoning: Option<String>,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            content: content.into(),
            created_at: Utc::now(),
            agent_id: None,
            reasoning: None,
        }
    }

    pub fn with_agent(mut self, agent_id: impl Into<String>) -> Self {
        self.agent_id = Some(agent_id.into());
        self
    }

    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = Some(reasoning.into());
        self
    }
}

/// A thread of messages, addressable independently of its message list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: Uuid,
    pub title: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub messages: Vec<Message>,
}

impl Conversation {
    pub fn new(title: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            title,
            created_at: now,
            updated_at: now,
            messages: Vec::new(),
        }
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_trims_and_rejects_empty() {
        assert!(Task::new("  hi  ", None).is_ok());
        assert!(Task::new("   ", None).is_err());
    }

    #[test]
    fn task_rejects_oversized_input() {
        let big = "a".repeat(DEFAULT_MAX_TASK_LENGTH + 1);
        assert!(Task::new(big, None).is_err());
    }

    #[test]
    fn role_labels_are_uppercase() {
        assert_eq!(Role::User.label(), "USER");
        assert_eq!(Role::Assistant.label(), "ASSISTANT");
    }

    #[test]
    fn empty_conversation_has_no_messages_but_exists() {
        let c = Conversation::new(None);
        assert!(c.messages.is_empty());
    }
}
