use serde_json::Value;

use crate::models::Message;

/// One decoded `data:` payload from the message stream.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamFrame {
    /// Liveness only, nothing to apply
    Heartbeat,
    Message(Message),
}

/// Decode one event payload.
///
/// `{"type":"heartbeat"}`, an empty payload and any object without a
/// conversation id are heartbeats. Anything else must decode as a `Message`.
pub fn decode_frame(data: &str) -> Result<StreamFrame, serde_json::Error> {
    if data.trim().is_empty() {
        return Ok(StreamFrame::Heartbeat);
    }

    let value: Value = serde_json::from_str(data)?;
    if value.get("type").and_then(Value::as_str) == Some("heartbeat") {
        return Ok(StreamFrame::Heartbeat);
    }

    let has_conversation = ["session", "conversation_id", "conversationId"]
        .iter()
        .any(|key| {
            value
                .get(*key)
                .and_then(Value::as_str)
                .is_some_and(|id| !id.is_empty())
        });
    if !has_conversation {
        return Ok(StreamFrame::Heartbeat);
    }

    serde_json::from_value(value).map(StreamFrame::Message)
}
