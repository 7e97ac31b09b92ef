use std::collections::HashMap;

use crate::models::{ConversationId, ConversationState, Message};

/// Single source of truth for conversation state.
///
/// Plain reducer: every method is a synchronous state transition. Sharing,
/// locking and persistence live in [`super::SharedSessionStore`].
#[derive(Debug, Clone)]
pub struct SessionStore {
    conversations: HashMap<ConversationId, ConversationState>,
    active_conversation_id: Option<ConversationId>,
    retention: usize,
    activity_seq: u64,
}

impl SessionStore {
    pub fn new(retention: usize) -> Self {
        Self {
            conversations: HashMap::new(),
            active_conversation_id: None,
            retention: retention.max(1),
            activity_seq: 0,
        }
    }

    /// Rebuild from a persisted map. Entries are re-trimmed to `retention`
    /// and unknown keys are re-keyed by their own id.
    pub fn from_conversations(
        conversations: HashMap<ConversationId, ConversationState>,
        retention: usize,
    ) -> Self {
        let mut store = Self::new(retention);
        for (_, mut conversation) in conversations {
            while conversation.messages.len() > store.retention {
                conversation.messages.pop_front();
            }
            conversation.refresh_preview();
            store.activity_seq = store.activity_seq.max(conversation.last_activity_seq);
            store
                .conversations
                .insert(conversation.id.clone(), conversation);
        }
        store
    }

    // ===== Getters =====

    pub fn retention(&self) -> usize {
        self.retention
    }

    pub fn conversation(&self, id: &str) -> Option<&ConversationState> {
        self.conversations.get(id)
    }

    pub fn conversations(&self) -> &HashMap<ConversationId, ConversationState> {
        &self.conversations
    }

    pub fn active_conversation_id(&self) -> Option<&str> {
        self.active_conversation_id.as_deref()
    }

    pub fn active_conversation(&self) -> Option<&ConversationState> {
        self.active_conversation_id
            .as_deref()
            .and_then(|id| self.conversations.get(id))
    }

    /// Conversation ids, most recently updated first.
    pub fn conversation_ids_by_recency(&self) -> Vec<ConversationId> {
        let mut entries: Vec<_> = self.conversations.values().collect();
        entries.sort_by(|a, b| {
            b.last_activity_seq
                .cmp(&a.last_activity_seq)
                .then_with(|| a.id.cmp(&b.id))
        });
        entries.into_iter().map(|c| c.id.clone()).collect()
    }

    pub fn total_unread(&self) -> u64 {
        self.conversations
            .values()
            .map(|c| u64::from(c.unread_count))
            .sum()
    }

    pub fn len(&self) -> usize {
        self.conversations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conversations.is_empty()
    }

    // ===== Mutations =====

    /// The only path by which message content enters the store.
    pub fn apply_incoming_message(&mut self, message: Message) {
        self.activity_seq += 1;
        let seq = self.activity_seq;
        let retention = self.retention;

        let conversation = self
            .conversations
            .entry(message.conversation_id.clone())
            .or_insert_with(|| ConversationState::new(message.conversation_id.clone()));

        if message.is_self {
            conversation.unread_count = 0;
        } else {
            conversation.unread_count = conversation.unread_count.saturating_add(1);
        }
        conversation.last_activity_seq = seq;
        conversation.push_bounded(message, retention);
    }

    /// Set (or clear with `None`) the active conversation. Unknown ids are
    /// ignored so the pointer always refers to an existing entry.
    /// Does not clear unread; that is a separate `clear_unread` call.
    pub fn select_conversation(&mut self, id: Option<&str>) -> bool {
        match id {
            None => {
                self.active_conversation_id = None;
                true
            }
            Some(id) if self.conversations.contains_key(id) => {
                self.active_conversation_id = Some(id.to_string());
                true
            }
            Some(_) => false,
        }
    }

    pub fn clear_unread(&mut self, id: &str) -> bool {
        match self.conversations.get_mut(id) {
            Some(conversation) if conversation.unread_count != 0 => {
                conversation.unread_count = 0;
                true
            }
            _ => false,
        }
    }

    /// Remove the message at `index`. Out-of-range or unknown ids are no-ops.
    pub fn delete_message(&mut self, id: &str, index: usize) -> Option<Message> {
        let conversation = self.conversations.get_mut(id)?;
        let removed = conversation.messages.remove(index)?;
        conversation.refresh_preview();
        Some(removed)
    }

    /// Drop a conversation and, in the same step, the active pointer if it
    /// referred to it.
    pub fn remove_conversation(&mut self, id: &str) -> Option<ConversationState> {
        let removed = self.conversations.remove(id)?;
        if self.active_conversation_id.as_deref() == Some(id) {
            self.active_conversation_id = None;
        }
        Some(removed)
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(crate::constants::MAX_MESSAGES_PER_CONVERSATION)
    }
}
