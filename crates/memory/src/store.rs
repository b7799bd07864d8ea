//! Conversation storage (§3 `Conversation`, §4.7 invariants 4-5).
//!
//! Grounded on the teacher's `sessions::store::SessionStore`: a
//! `parking_lot::RwLock<HashMap<Uuid, Conversation>>` behind a small
//! resolve-or-create API. Unlike the teacher's store, nothing here is
//! flushed to disk — conversation history is recoverable cache, not
//! run-critical state, so a process-local in-memory implementation is
//! the reference backend; a production deployment would swap in a
//! database-backed `ConversationStore` without touching callers.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use conductor_domain::task::{Conversation, Message};
use parking_lot::RwLock;
use uuid::Uuid;

/// Lightweight projection of a `Conversation` for listing, carrying no
/// message bodies (§4.7 invariant 5: `list()` must not require loading
/// messages).
#[derive(Debug, Clone)]
pub struct ConversationSummary {
    pub id: Uuid,
    pub title: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Storage boundary for conversations, serialized through the store so
/// concurrent runs sharing a `conversationId` never race on the message
/// list (§3 Ownership).
pub trait ConversationStore: Send + Sync {
    /// Resolve an existing conversation by id, or create a fresh one —
    /// with that id if given, otherwise a freshly minted one. Never
    /// returns `None`: a conversation record always exists once a run is
    /// bound to it, even before any message has been pushed (§4.7
    /// invariant 4).
    fn resolve_or_create(&self, id: Option<Uuid>) -> Conversation;

    /// Read a conversation by id. `None` only when no record exists at
    /// all — an existing conversation with zero messages still returns
    /// `Some`.
    fn get(&self, id: Uuid) -> Option<Conversation>;

    /// Append a message to a conversation, bumping `updatedAt`. No-op if
    /// the conversation doesn't exist (callers always `resolve_or_create`
    /// first).
    fn append(&self, id: Uuid, message: Message);

    /// The most recent `limit` messages, oldest first. Empty if the
    /// conversation doesn't exist or has no messages.
    fn recent_messages(&self, id: Uuid, limit: usize) -> Vec<Message>;

    /// All conversations, ordered by `updatedAt` descending (§4.7
    /// invariant 5).
    fn list(&self) -> Vec<ConversationSummary>;
}

/// In-memory `ConversationStore`, keyed by conversation id.
#[derive(Default)]
pub struct InMemoryConversationStore {
    conversations: RwLock<HashMap<Uuid, Conversation>>,
}

impl InMemoryConversationStore {
    pub fn new() -> Self {
        Self { conversations: RwLock::new(HashMap::new()) }
    }
}

impl ConversationStore for InMemoryConversationStore {
    fn resolve_or_create(&self, id: Option<Uuid>) -> Conversation {
        if let Some(id) = id {
            if let Some(existing) = self.conversations.read().get(&id) {
                return existing.clone();
            }
        }

        let mut conversation = Conversation::new(None);
        if let Some(id) = id {
            conversation.id = id;
        }
        self.conversations.write().insert(conversation.id, conversation.clone());
        conversation
    }

    fn get(&self, id: Uuid) -> Option<Conversation> {
        self.conversations.read().get(&id).cloned()
    }

    fn append(&self, id: Uuid, message: Message) {
        if let Some(conversation) = self.conversations.write().get_mut(&id) {
            conversation.push(message);
        }
    }

    fn recent_messages(&self, id: Uuid, limit: usize) -> Vec<Message> {
        let conversations = self.conversations.read();
        let Some(conversation) = conversations.get(&id) else {
            return Vec::new();
        };
        let len = conversation.messages.len();
        let start = len.saturating_sub(limit);
        conversation.messages[start..].to_vec()
    }

    fn list(&self) -> Vec<ConversationSummary> {
        let mut summaries: Vec<ConversationSummary> = self
            .conversations
            .read()
            .values()
            .map(|c| ConversationSummary {
                id: c.id,
                title: c.title.clone(),
                created_at: c.created_at,
                updated_at: c.updated_at,
            })
            .collect();
        summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        summaries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conductor_domain::task::Role;

    #[test]
    fn resolve_or_create_is_stable_across_calls() {
        let store = InMemoryConversationStore::new();
        let first = store.resolve_or_create(None);
        let second = store.resolve_or_create(Some(first.id));
        assert_eq!(first.id, second.id);
    }

    #[test]
    fn get_returns_empty_conversation_not_none() {
        let store = InMemoryConversationStore::new();
        let created = store.resolve_or_create(None);
        let fetched = store.get(created.id).expect("conversation must exist once created");
        assert!(fetched.messages.is_empty());
    }

    #[test]
    fn get_unknown_id_is_none() {
        let store = InMemoryConversationStore::new();
        assert!(store.get(Uuid::new_v4()).is_none());
    }

    #[test]
    fn append_then_recent_messages_respects_limit_and_order() {
        let store = InMemoryConversationStore::new();
        let conversation = store.resolve_or_create(None);
        for i in 0..5 {
            store.append(conversation.id, Message::new(Role::User, format!("turn {i}")));
        }
        let recent = store.recent_messages(conversation.id, 2);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].content, "turn 3");
        assert_eq!(recent[1].content, "turn 4");
    }

    #[test]
    fn list_orders_by_updated_at_descending() {
        let store = InMemoryConversationStore::new();
        let older = store.resolve_or_create(None);
        std::thread::sleep(std::time::Duration::from_millis(5));
        let newer = store.resolve_or_create(None);
        store.append(newer.id, Message::new(Role::User, "hi"));

        let listed = store.list();
        assert_eq!(listed[0].id, newer.id);
        assert_eq!(listed[1].id, older.id);
    }
}
