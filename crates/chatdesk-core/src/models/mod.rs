pub mod conversation;
pub mod expert;
pub mod message;

pub use conversation::ConversationState;
pub use expert::{default_expert, Expert};
pub use message::{ConversationId, Message};
