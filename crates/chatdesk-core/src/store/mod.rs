pub mod session_store;
pub mod shared;
pub mod state_cache;

pub use session_store::SessionStore;
pub use shared::SharedSessionStore;
