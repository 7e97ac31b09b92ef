use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;

use super::session_store::SessionStore;
use super::state_cache::{self, SnapshotWriter};
use crate::backend::ChatBackend;
use crate::error::Result;
use crate::models::{ConversationState, Message};

struct Inner {
    store: SessionStore,
    /// Bumped on every effective mutation; orders snapshot writes
    revision: u64,
}

/// Process-wide handle to the session store.
///
/// Cloned into every component that reads or writes conversation state. All
/// writers go through the mutation methods here; each runs under one write
/// lock, and each effective change is persisted best-effort afterwards.
#[derive(Clone)]
pub struct SharedSessionStore {
    inner: Arc<RwLock<Inner>>,
    writer: Option<Arc<SnapshotWriter>>,
}

impl SharedSessionStore {
    /// In-memory only.
    pub fn new(store: SessionStore) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner { store, revision: 0 })),
            writer: None,
        }
    }

    /// Rehydrate from `data_dir` (empty on any load failure) and persist there afterwards.
    pub fn load_or_default(data_dir: &Path, retention: usize) -> Self {
        let store = match state_cache::load_snapshot(data_dir) {
            Some(conversations) => {
                tracing::info!(count = conversations.len(), "restored session snapshot");
                SessionStore::from_conversations(conversations, retention)
            }
            None => SessionStore::new(retention),
        };
        Self {
            inner: Arc::new(RwLock::new(Inner { store, revision: 0 })),
            writer: Some(Arc::new(SnapshotWriter::new(data_dir))),
        }
    }

    // ===== Reads =====

    pub fn read<R>(&self, f: impl FnOnce(&SessionStore) -> R) -> R {
        f(&self.inner.read().store)
    }

    pub fn snapshot(&self) -> SessionStore {
        self.inner.read().store.clone()
    }

    pub fn conversation(&self, id: &str) -> Option<ConversationState> {
        self.read(|s| s.conversation(id).cloned())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.read(|s| s.conversation(id).is_some())
    }

    pub fn active_conversation_id(&self) -> Option<String> {
        self.read(|s| s.active_conversation_id().map(str::to_string))
    }

    // ===== Mutations =====

    pub fn apply_incoming_message(&self, message: Message) {
        self.mutate(|store| {
            store.apply_incoming_message(message);
            ((), true)
        })
    }

    pub fn select_conversation(&self, id: Option<&str>) -> bool {
        // the active pointer is not part of the persisted snapshot
        let mut inner = self.inner.write();
        inner.store.select_conversation(id)
    }

    pub fn clear_unread(&self, id: &str) -> bool {
        self.mutate(|store| {
            let changed = store.clear_unread(id);
            (changed, changed)
        })
    }

    pub fn delete_message(&self, id: &str, index: usize) -> Option<Message> {
        self.mutate(|store| {
            let removed = store.delete_message(id, index);
            let changed = removed.is_some();
            (removed, changed)
        })
    }

    /// Ask the backend to drop the conversation, then remove it locally.
    /// On backend failure the store is untouched and the error is returned.
    pub async fn delete_conversation(&self, backend: &dyn ChatBackend, id: &str) -> Result<u64> {
        let deleted = backend.delete_session(id).await.map_err(|e| {
            tracing::warn!(conversation = id, error = %e, "backend refused conversation delete");
            e
        })?;

        self.mutate(|store| {
            let changed = store.remove_conversation(id).is_some();
            ((), changed)
        });
        tracing::info!(conversation = id, deleted, "conversation deleted");
        Ok(deleted)
    }

    /// Run `f` under the write lock. `f` reports whether it changed anything;
    /// only changes are encoded and written.
    fn mutate<R>(&self, f: impl FnOnce(&mut SessionStore) -> (R, bool)) -> R {
        let (result, pending) = {
            let mut inner = self.inner.write();
            let (result, changed) = f(&mut inner.store);
            if !changed {
                return result;
            }
            inner.revision += 1;
            let pending = match &self.writer {
                Some(_) => match state_cache::encode_snapshot(inner.store.conversations()) {
                    Ok(bytes) => Some((inner.revision, bytes)),
                    Err(e) => {
                        tracing::warn!(error = %e, "failed to encode session snapshot");
                        None
                    }
                },
                None => None,
            };
            (result, pending)
        };

        if let (Some(writer), Some((revision, bytes))) = (&self.writer, pending) {
            writer.write(revision, &bytes);
        }
        result
    }
}

impl std::fmt::Debug for SharedSessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("SharedSessionStore")
            .field("conversations", &inner.store.len())
            .field("revision", &inner.revision)
            .field("persistent", &self.writer.is_some())
            .finish()
    }
}
