use crate::models::{ConversationId, Message};
use crate::streaming::ConnectionState;

/// Change notifications for the presentation shell. State itself is read
/// from the store; these only say when to look again.
#[derive(Debug, Clone)]
pub enum CoreEvent {
    /// A stream message was applied to the store
    Message(Message),
    ConversationDeleted(ConversationId),
    Connection(ConnectionState),
}
