use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use crate::auto_reply::{AutoReplyConfig, AutoReplyEngine, SharedAutoReplyConfig};
use crate::backend::{ChatBackend, HttpBackend};
use crate::cache::{CacheResult, ExpertDirectory};
use crate::config::CoreConfig;
use crate::events::CoreEvent;
use crate::models::{Expert, Message};
use crate::notifications::{Notification, NotificationCenter, NotificationId};
use crate::store::SharedSessionStore;
use crate::streaming::{ConnectionState, SseTransport, StreamConnectionManager, StreamTransport};

/// Decoded messages waiting to be applied
const INGEST_CHANNEL_CAPACITY: usize = 256;
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Application root: owns the store, the stream, the auto-reply engine and
/// everything they share, and exposes the commands the shell issues.
pub struct CoreRuntime {
    config: CoreConfig,
    backend: Arc<dyn ChatBackend>,
    store: SharedSessionStore,
    auto_reply: AutoReplyEngine,
    notifications: NotificationCenter,
    experts: ExpertDirectory,
    stream: StreamConnectionManager,
    events: broadcast::Sender<CoreEvent>,
    tasks: Vec<JoinHandle<()>>,
}

impl CoreRuntime {
    /// Production wiring: reqwest backend and SSE transport from `config`.
    pub fn with_http(config: CoreConfig) -> Result<Self> {
        let backend = HttpBackend::new(&config.api_base_url)
            .with_context(|| format!("invalid backend url {}", config.api_base_url))?;
        Self::start(config, Arc::new(backend), Arc::new(SseTransport::new()))
    }

    /// Rehydrate local state and start streaming. Must be called inside a tokio runtime.
    pub fn start(
        config: CoreConfig,
        backend: Arc<dyn ChatBackend>,
        transport: Arc<dyn StreamTransport>,
    ) -> Result<Self> {
        std::fs::create_dir_all(&config.data_dir)
            .with_context(|| format!("creating data dir {}", config.data_dir.display()))?;

        let store = SharedSessionStore::load_or_default(&config.data_dir, config.retention);
        let auto_reply_config = SharedAutoReplyConfig::load_or_default(&config.data_dir);
        let notifications = NotificationCenter::with_ttl(config.notification_ttl);
        let experts = ExpertDirectory::new(backend.clone(), config.expert_cache_ttl);
        let auto_reply = AutoReplyEngine::new(
            backend.clone(),
            store.clone(),
            auto_reply_config,
            notifications.clone(),
            experts.clone(),
        );
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        let (message_tx, message_rx) = mpsc::channel(INGEST_CHANNEL_CAPACITY);
        let stream = StreamConnectionManager::connect(
            config.stream_url(),
            transport,
            &config.stream,
            message_tx,
        );

        let ingest = tokio::spawn(ingest_messages(
            message_rx,
            store.clone(),
            auto_reply.clone(),
            events.clone(),
        ));
        let connection = tokio::spawn(forward_connection_state(
            stream.subscribe(),
            events.clone(),
        ));

        tracing::info!(
            data_dir = %config.data_dir.display(),
            url = %config.stream_url(),
            conversations = store.read(|s| s.len()),
            "core runtime started"
        );

        Ok(Self {
            config,
            backend,
            store,
            auto_reply,
            notifications,
            experts,
            stream,
            events,
            tasks: vec![ingest, connection],
        })
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn store(&self) -> SharedSessionStore {
        self.store.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CoreEvent> {
        self.events.subscribe()
    }

    // ===== Session commands =====

    pub fn select_conversation(&self, id: Option<&str>) -> bool {
        self.store.select_conversation(id)
    }

    pub fn clear_unread(&self, id: &str) -> bool {
        self.store.clear_unread(id)
    }

    pub fn delete_message(&self, id: &str, index: usize) -> Option<Message> {
        self.store.delete_message(id, index)
    }

    /// Delete on the backend, then locally; the pending auto-reply goes too.
    pub async fn delete_conversation(&self, id: &str) -> crate::error::Result<u64> {
        let deleted = self
            .store
            .delete_conversation(self.backend.as_ref(), id)
            .await?;
        self.auto_reply.cancel(id);
        let _ = self.events.send(CoreEvent::ConversationDeleted(id.to_string()));
        Ok(deleted)
    }

    /// The sent message shows up later through the stream as a self message.
    pub async fn send_manual(&self, recipient: &str, text: &str) -> crate::error::Result<()> {
        self.auto_reply.send_manual(recipient, text).await
    }

    // ===== Auto-reply =====

    pub fn auto_reply_config(&self) -> AutoReplyConfig {
        self.auto_reply.config()
    }

    pub fn set_auto_reply_config(&self, config: AutoReplyConfig) {
        tracing::info!(enabled = config.enabled, style = %config.reply_style, "auto-reply config updated");
        self.auto_reply.set_config(config);
    }

    // ===== Experts =====

    pub async fn experts(&self) -> CacheResult<Vec<Expert>> {
        self.experts.experts().await
    }

    pub async fn refresh_experts(&self) -> CacheResult<Vec<Expert>> {
        self.experts.refresh().await
    }

    /// Window regained focus.
    pub async fn on_focus(&self) {
        self.experts.on_focus().await;
    }

    // ===== Connection =====

    pub fn reconnect(&self) {
        self.stream.reconnect();
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.stream.state()
    }

    // ===== Notifications =====

    pub fn notifications(&self) -> Vec<Notification> {
        self.notifications.active()
    }

    pub fn close_notification(&self, id: NotificationId) -> bool {
        self.notifications.close(id)
    }

    /// Close the stream, drop pending auto-replies and wait for background tasks.
    pub async fn shutdown(&mut self) {
        self.stream.close();
        self.auto_reply.cancel_all();
        for task in self.tasks.drain(..) {
            let _ = task.await;
        }
        tracing::info!("core runtime stopped");
    }
}

/// Apply stream messages strictly in arrival order, then let the engine see them.
async fn ingest_messages(
    mut messages: mpsc::Receiver<Message>,
    store: SharedSessionStore,
    auto_reply: AutoReplyEngine,
    events: broadcast::Sender<CoreEvent>,
) {
    while let Some(message) = messages.recv().await {
        store.apply_incoming_message(message.clone());
        auto_reply.observe(&message);
        let _ = events.send(CoreEvent::Message(message));
    }
    tracing::debug!("ingest loop finished");
}

async fn forward_connection_state(
    mut states: tokio::sync::watch::Receiver<ConnectionState>,
    events: broadcast::Sender<CoreEvent>,
) {
    while states.changed().await.is_ok() {
        let state = states.borrow_and_update().clone();
        let _ = events.send(CoreEvent::Connection(state));
    }
}
