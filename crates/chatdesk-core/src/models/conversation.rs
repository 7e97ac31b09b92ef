use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use super::message::{ConversationId, Message};
use crate::constants::MESSAGE_PREVIEW_LENGTH;

/// Per-conversation state held by the session store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationState {
    pub id: ConversationId,
    /// Append order as received, bounded by the store's retention
    pub messages: VecDeque<Message>,
    pub last_message_preview: String,
    pub last_message_time: String,
    pub unread_count: u32,
    /// Store-local monotonically increasing stamp of the last append (recency ordering)
    pub last_activity_seq: u64,
}

impl ConversationState {
    pub fn new(id: impl Into<ConversationId>) -> Self {
        Self {
            id: id.into(),
            messages: VecDeque::new(),
            last_message_preview: String::new(),
            last_message_time: String::new(),
            unread_count: 0,
            last_activity_seq: 0,
        }
    }

    /// Append and drop the oldest entries beyond `retention`.
    pub(crate) fn push_bounded(&mut self, message: Message, retention: usize) {
        self.messages.push_back(message);
        while self.messages.len() > retention {
            self.messages.pop_front();
        }
        self.refresh_preview();
    }

    pub(crate) fn refresh_preview(&mut self) {
        match self.messages.back() {
            Some(last) => {
                self.last_message_preview = last.content.clone();
                self.last_message_time = last.timestamp.clone();
            }
            None => {
                self.last_message_preview.clear();
                self.last_message_time.clear();
            }
        }
    }

    /// Most recent non-self message, the question an auto-reply answers.
    pub fn last_incoming(&self) -> Option<&Message> {
        self.messages.iter().rev().find(|m| !m.is_self)
    }

    /// Last `n` messages in arrival order.
    pub fn recent(&self, n: usize) -> impl Iterator<Item = &Message> {
        let skip = self.messages.len().saturating_sub(n);
        self.messages.iter().skip(skip)
    }

    /// Preview cut to a list-friendly length (char-boundary safe).
    pub fn preview_snippet(&self) -> String {
        let mut chars = self.last_message_preview.chars();
        let snippet: String = chars.by_ref().take(MESSAGE_PREVIEW_LENGTH).collect();
        if chars.next().is_some() {
            format!("{}…", snippet)
        } else {
            snippet
        }
    }
}
