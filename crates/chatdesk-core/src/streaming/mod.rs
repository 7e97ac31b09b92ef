//! Persistent connection to the backend message feed.

pub mod backoff;
pub mod connection;
pub mod sse;
pub mod types;

pub use backoff::ReconnectPolicy;
pub use connection::{ConnectionState, StreamConnectionManager};
pub use sse::{LineStream, SseDecoder, SseTransport, StreamTransport};
pub use types::{decode_frame, StreamFrame};
