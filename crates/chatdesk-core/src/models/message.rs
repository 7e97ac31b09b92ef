use serde::{Deserialize, Serialize};

/// Counterparty display name / chat handle. Key of the session map.
pub type ConversationId = String;

/// A single chat message as delivered by the event stream.
///
/// The backend uses `session`/`time`/`id` on the wire; the camelCase names are
/// accepted too so snapshots written by other clients still decode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    #[serde(alias = "session", alias = "conversationId")]
    pub conversation_id: ConversationId,
    #[serde(default)]
    pub sender: String,
    #[serde(default)]
    pub content: String,
    #[serde(default, alias = "isSelf")]
    pub is_self: bool,
    /// `HH:MM:SS` or ISO-8601, kept verbatim
    #[serde(default, alias = "time")]
    pub timestamp: String,
    #[serde(default, alias = "id", alias = "sequenceHint")]
    pub sequence_hint: Option<u64>,
}

impl Message {
    pub fn new(
        conversation_id: impl Into<ConversationId>,
        sender: impl Into<String>,
        content: impl Into<String>,
        is_self: bool,
        timestamp: impl Into<String>,
    ) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            sender: sender.into(),
            content: content.into(),
            is_self,
            timestamp: timestamp.into(),
            sequence_hint: None,
        }
    }

    /// Role tag used in generation history
    pub fn role(&self) -> &'static str {
        if self.is_self {
            "assistant"
        } else {
            "user"
        }
    }
}
