use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use super::config::{AutoReplyConfig, SharedAutoReplyConfig};
use super::debounce::KeyedDebouncer;
use crate::backend::{ChatBackend, GenerateReplyRequest, HistoryEntry};
use crate::cache::ExpertDirectory;
use crate::constants::AUTO_REPLY_HISTORY_LEN;
use crate::error::{CoreError, Result};
use crate::models::{ConversationId, ConversationState, Message};
use crate::notifications::NotificationCenter;
use crate::store::SharedSessionStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FireOutcome {
    Sent,
    Disabled,
    NothingToAnswer,
}

struct EngineInner {
    backend: Arc<dyn ChatBackend>,
    store: SharedSessionStore,
    config: SharedAutoReplyConfig,
    notifications: NotificationCenter,
    experts: ExpertDirectory,
    timers: KeyedDebouncer<ConversationId>,
    /// One lock per conversation; a cycle holds it from generate through send.
    cycle_locks: Mutex<HashMap<ConversationId, Arc<tokio::sync::Mutex<()>>>>,
}

/// Debounced automatic replies.
///
/// Every non-self message (re)arms its conversation's timer. When the timer
/// expires the engine reads the current config and store, asks the backend
/// for drafted replies, sends the configured variant and reports the outcome
/// through the notification surface.
#[derive(Clone)]
pub struct AutoReplyEngine {
    inner: Arc<EngineInner>,
}

impl AutoReplyEngine {
    pub fn new(
        backend: Arc<dyn ChatBackend>,
        store: SharedSessionStore,
        config: SharedAutoReplyConfig,
        notifications: NotificationCenter,
        experts: ExpertDirectory,
    ) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                backend,
                store,
                config,
                notifications,
                experts,
                timers: KeyedDebouncer::new(),
                cycle_locks: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Feed a message that was just applied to the store.
    pub fn observe(&self, message: &Message) {
        if message.is_self {
            return;
        }
        let config = self.inner.config.get();
        if !config.enabled {
            return;
        }

        let id = message.conversation_id.clone();
        tracing::debug!(conversation = %id, delay = ?config.debounce(), "arming auto-reply");

        let weak: Weak<EngineInner> = Arc::downgrade(&self.inner);
        let fire_id = id.clone();
        self.inner.timers.schedule(id, config.debounce(), async move {
            if let Some(inner) = weak.upgrade() {
                inner.fire(&fire_id).await;
            }
        });
    }

    /// Drop the pending timer of one conversation (e.g. it was deleted).
    pub fn cancel(&self, conversation_id: &str) -> bool {
        let cancelled = self.inner.timers.cancel(&conversation_id.to_string());
        self.inner.prune_lock(conversation_id);
        if cancelled {
            tracing::debug!(conversation = conversation_id, "auto-reply timer cancelled");
        }
        cancelled
    }

    pub fn cancel_all(&self) -> usize {
        let cancelled = self.inner.timers.cancel_all();
        if cancelled > 0 {
            tracing::debug!(cancelled, "all auto-reply timers cancelled");
        }
        cancelled
    }

    /// Operator-typed send. Drops the conversation's pending auto-reply and
    /// waits for any in-flight cycle, so the two never interleave.
    pub async fn send_manual(&self, recipient: &str, text: &str) -> Result<()> {
        if self.inner.timers.cancel(&recipient.to_string()) {
            tracing::debug!(conversation = recipient, "manual send superseded pending auto-reply");
        }
        let result = {
            let lock = self.inner.cycle_lock(recipient);
            let _cycle = lock.lock().await;
            self.inner.backend.send_message(recipient, text).await
        };
        self.inner.prune_lock(recipient);
        result
    }

    pub fn is_armed(&self, conversation_id: &str) -> bool {
        self.inner.timers.is_pending(&conversation_id.to_string())
    }

    pub fn armed_count(&self) -> usize {
        self.inner.timers.pending_count()
    }

    pub fn config(&self) -> AutoReplyConfig {
        self.inner.config.get()
    }

    /// Replace and persist the config. Disabling drops every pending timer.
    pub fn set_config(&self, config: AutoReplyConfig) {
        let enabled = config.enabled;
        self.inner.config.set(config);
        if !enabled {
            self.cancel_all();
        }
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.inner.config.update(|c| c.enabled = enabled);
        if !enabled {
            self.cancel_all();
        }
    }
}

impl EngineInner {
    fn cycle_lock(&self, conversation_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.cycle_locks
            .lock()
            .entry(conversation_id.to_string())
            .or_default()
            .clone()
    }

    fn prune_lock(&self, conversation_id: &str) {
        let mut locks = self.cycle_locks.lock();
        if locks
            .get(conversation_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(conversation_id);
        }
    }

    async fn fire(&self, conversation_id: &str) {
        {
            let lock = self.cycle_lock(conversation_id);
            let _cycle = lock.lock().await;
            self.report(conversation_id, self.run_cycle(conversation_id).await);
        }
        self.prune_lock(conversation_id);
    }

    fn report(&self, conversation_id: &str, outcome: Result<FireOutcome>) {
        match outcome {
            Ok(FireOutcome::Sent) => {
                tracing::info!(conversation = conversation_id, "auto-reply sent");
                self.notifications
                    .success(format!("Auto-replied to {conversation_id}"));
            }
            Ok(skipped) => {
                tracing::debug!(conversation = conversation_id, reason = ?skipped, "auto-reply skipped");
            }
            Err(e) => {
                tracing::warn!(conversation = conversation_id, error = %e, "auto-reply failed");
                self.notifications.error(format!("Auto-reply failed: {e}"));
            }
        }
    }

    async fn run_cycle(&self, conversation_id: &str) -> Result<FireOutcome> {
        let config = self.config.get();
        if !config.enabled {
            return Ok(FireOutcome::Disabled);
        }

        let Some(mut request) = self
            .store
            .read(|s| s.conversation(conversation_id).and_then(build_request))
        else {
            return Ok(FireOutcome::NothingToAnswer);
        };

        request.prompt_id = match config.selected_expert_id {
            Some(id) => Some(id),
            None => self.experts.default_expert_id().await,
        };

        let suggestions = self.backend.generate_reply(&request).await?;
        let reply = suggestions
            .get(config.reply_style)
            .ok_or(CoreError::MissingSuggestion(config.reply_style))?;

        self.backend.send_message(conversation_id, reply).await?;
        Ok(FireOutcome::Sent)
    }
}

/// History of the last few messages plus the latest customer question.
fn build_request(conversation: &ConversationState) -> Option<GenerateReplyRequest> {
    let question = conversation.last_incoming()?;
    let conversation_history = conversation
        .recent(AUTO_REPLY_HISTORY_LEN)
        .map(|m| HistoryEntry {
            role: m.role().to_string(),
            content: m.content.clone(),
        })
        .collect();

    Some(GenerateReplyRequest {
        session_id: conversation.id.clone(),
        customer_message: question.content.clone(),
        conversation_history,
        prompt_id: None,
    })
}

impl std::fmt::Debug for AutoReplyEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AutoReplyEngine")
            .field("armed", &self.armed_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::auto_reply::ReplyStyle;
    use crate::backend::ReplySuggestions;
    use crate::models::Expert;
    use crate::notifications::NotificationKind;
    use crate::store::SessionStore;
    use crate::test_support::FakeBackend;

    struct Harness {
        backend: Arc<FakeBackend>,
        store: SharedSessionStore,
        notifications: NotificationCenter,
        engine: AutoReplyEngine,
    }

    fn harness(config: AutoReplyConfig) -> Harness {
        let backend = Arc::new(FakeBackend::new());
        let store = SharedSessionStore::new(SessionStore::new(100));
        // long enough that nothing expires during a test
        let notifications = NotificationCenter::with_ttl(Duration::from_secs(3600));
        let experts = ExpertDirectory::new(backend.clone(), Duration::from_secs(120));
        let engine = AutoReplyEngine::new(
            backend.clone(),
            store.clone(),
            SharedAutoReplyConfig::new(config),
            notifications.clone(),
            experts,
        );
        Harness {
            backend,
            store,
            notifications,
            engine,
        }
    }

    fn enabled(debounce_seconds: u64) -> AutoReplyConfig {
        AutoReplyConfig {
            enabled: true,
            debounce_seconds,
            ..AutoReplyConfig::default()
        }
    }

    impl Harness {
        fn receive(&self, conversation: &str, content: &str) {
            let message = Message::new(conversation, conversation, content, false, "12:00:00");
            self.store.apply_incoming_message(message.clone());
            self.engine.observe(&message);
        }

        fn receive_own(&self, conversation: &str, content: &str) {
            let message = Message::new(conversation, "me", content, true, "12:00:00");
            self.store.apply_incoming_message(message.clone());
            self.engine.observe(&message);
        }

        fn cycle_lock_count(&self) -> usize {
            self.engine.inner.cycle_locks.lock().len()
        }

        fn notifications_of(&self, kind: NotificationKind) -> Vec<String> {
            self.notifications
                .active()
                .into_iter()
                .filter(|n| n.kind == kind)
                .map(|n| n.message)
                .collect()
        }
    }

    async fn sleep_ms(ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_fires_once_with_latest_message() {
        let h = harness(enabled(5));
        h.backend.set_suggestions(ReplySuggestions {
            aggressive: Some("buy it now".into()),
            conservative: Some("maybe later".into()),
            professional: Some("Happy to help with that.".into()),
        });

        h.receive("客户-张三", "hello");
        sleep_ms(1_000).await;
        h.receive("客户-张三", "are you there?");
        sleep_ms(1_000).await;
        h.receive("客户-张三", "what does it cost?");

        // t=2s; the last arm expires at t=7s
        sleep_ms(4_900).await;
        assert!(h.backend.generate_requests().is_empty());
        assert!(h.backend.sent_messages().is_empty());

        sleep_ms(200).await;
        let requests = h.backend.generate_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].session_id, "客户-张三");
        assert_eq!(requests[0].customer_message, "what does it cost?");
        assert_eq!(requests[0].conversation_history.len(), 3);
        assert_eq!(
            h.backend.sent_messages(),
            vec![("客户-张三".to_string(), "Happy to help with that.".to_string())]
        );
        assert_eq!(
            h.notifications_of(NotificationKind::Success),
            vec!["Auto-replied to 客户-张三".to_string()]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_generation_failure_notifies_once_without_send() {
        let h = harness(enabled(5));
        h.backend.fail_generate("quota exceeded");

        h.receive("alice", "hi");
        sleep_ms(6_000).await;

        assert_eq!(h.backend.generate_requests().len(), 1);
        assert!(h.backend.sent_messages().is_empty());
        let errors = h.notifications_of(NotificationKind::Error);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("quota exceeded"));
        assert!(!h.engine.is_armed("alice"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_disable_before_expiry_cancels() {
        let h = harness(enabled(5));
        h.receive("alice", "hi");
        h.receive("bob", "hey");
        assert_eq!(h.engine.armed_count(), 2);

        sleep_ms(4_000).await;
        h.engine.set_enabled(false);
        assert_eq!(h.engine.armed_count(), 0);

        sleep_ms(10_000).await;
        assert!(h.backend.generate_requests().is_empty());
        assert!(h.backend.sent_messages().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_on_delete_before_expiry() {
        let h = harness(enabled(5));
        h.receive("alice", "hi");
        h.receive("bob", "hey");

        sleep_ms(1_000).await;
        assert!(h.engine.cancel("alice"));

        sleep_ms(10_000).await;
        let requests = h.backend.generate_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].session_id, "bob");
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_config_does_not_arm() {
        let h = harness(AutoReplyConfig::default());
        h.receive("alice", "hi");
        assert!(!h.engine.is_armed("alice"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_self_message_does_not_arm() {
        let h = harness(enabled(5));
        h.receive_own("alice", "hello from me");
        assert!(!h.engine.is_armed("alice"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_debounce_fires_next_tick() {
        let h = harness(enabled(0));
        h.receive("alice", "hi");
        assert!(h.backend.generate_requests().is_empty());

        sleep_ms(1).await;
        assert_eq!(h.backend.generate_requests().len(), 1);
        assert_eq!(h.backend.sent_messages().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fire_reads_config_at_expiry() {
        let h = harness(enabled(5));
        h.receive("alice", "hi");

        // style changes while armed; the send must use the new one
        let mut config = h.engine.config();
        config.reply_style = ReplyStyle::Aggressive;
        h.engine.set_config(config);
        assert!(h.engine.is_armed("alice"));

        sleep_ms(6_000).await;
        assert_eq!(h.backend.sent_messages()[0].1, "aggressive reply");
    }

    #[tokio::test(start_paused = true)]
    async fn test_history_is_role_tagged_and_bounded() {
        let h = harness(enabled(1));
        for i in 0..8 {
            h.store
                .apply_incoming_message(Message::new("alice", "alice", format!("q{i}"), false, "t"));
            h.store
                .apply_incoming_message(Message::new("alice", "me", format!("a{i}"), true, "t"));
        }
        h.receive("alice", "final question");

        sleep_ms(2_000).await;
        let request = &h.backend.generate_requests()[0];
        assert_eq!(request.conversation_history.len(), 10);
        let last = request.conversation_history.last().unwrap();
        assert_eq!(last.role, "user");
        assert_eq!(last.content, "final question");
        assert_eq!(request.conversation_history[8].role, "assistant");
        assert_eq!(request.customer_message, "final question");
    }

    #[tokio::test(start_paused = true)]
    async fn test_expert_resolution() {
        // configured id wins
        let h = harness(AutoReplyConfig {
            selected_expert_id: Some(42),
            ..enabled(1)
        });
        h.backend.set_experts(vec![Expert { id: 2, name: "b".into(), is_active: true }]);
        h.receive("alice", "hi");
        sleep_ms(2_000).await;
        assert_eq!(h.backend.generate_requests()[0].prompt_id, Some(42));

        // otherwise the active expert
        let h = harness(enabled(1));
        h.backend.set_experts(vec![
            Expert { id: 1, name: "a".into(), is_active: false },
            Expert { id: 2, name: "b".into(), is_active: true },
        ]);
        h.receive("alice", "hi");
        sleep_ms(2_000).await;
        assert_eq!(h.backend.generate_requests()[0].prompt_id, Some(2));

        // list failure means no expert, generation still runs
        let h = harness(enabled(1));
        h.backend.fail_list_experts("offline");
        h.receive("alice", "hi");
        sleep_ms(2_000).await;
        assert_eq!(h.backend.generate_requests()[0].prompt_id, None);
        assert_eq!(h.backend.sent_messages().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_variant_is_reported() {
        let h = harness(enabled(1));
        h.backend.set_suggestions(ReplySuggestions {
            aggressive: Some("x".into()),
            conservative: None,
            professional: Some("   ".into()),
        });
        h.receive("alice", "hi");
        sleep_ms(2_000).await;

        assert!(h.backend.sent_messages().is_empty());
        let errors = h.notifications_of(NotificationKind::Error);
        assert_eq!(errors, vec!["Auto-reply failed: No professional reply in generation response".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_failure_is_reported() {
        let h = harness(enabled(1));
        h.backend.fail_send("window not found");
        h.receive("alice", "hi");
        sleep_ms(2_000).await;

        let errors = h.notifications_of(NotificationKind::Error);
        assert_eq!(errors, vec!["Auto-reply failed: window not found".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_conversation_deleted_before_fire_is_skipped() {
        let h = harness(enabled(1));
        h.receive("alice", "hi");
        // store entry vanishes without going through cancel
        h.store
            .delete_conversation(h.backend.as_ref(), "alice")
            .await
            .unwrap();

        sleep_ms(2_000).await;
        assert!(h.backend.generate_requests().is_empty());
        assert!(h.notifications.active().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_send_supersedes_pending_timer() {
        let h = harness(enabled(5));
        h.receive("alice", "hi");
        sleep_ms(1_000).await;

        h.engine.send_manual("alice", "typed by hand").await.unwrap();
        assert!(!h.engine.is_armed("alice"));

        sleep_ms(10_000).await;
        assert!(h.backend.generate_requests().is_empty());
        assert_eq!(
            h.backend.sent_messages(),
            vec![("alice".to_string(), "typed by hand".to_string())]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_cycles_for_one_conversation_never_overlap() {
        let h = harness(enabled(1));
        h.backend.set_generate_delay(Duration::from_secs(10));

        h.receive("alice", "first");
        // first cycle starts at t=1s and generates until t=11s
        sleep_ms(2_000).await;
        h.receive("alice", "second");
        h.receive("bob", "other");

        sleep_ms(30_000).await;
        let alice: Vec<_> = h
            .backend
            .generate_requests()
            .into_iter()
            .filter(|r| r.session_id == "alice")
            .map(|r| r.customer_message)
            .collect();
        assert_eq!(alice, vec!["first".to_string(), "second".to_string()]);
        assert_eq!(h.backend.max_concurrent_generates_for("alice"), 1);
        assert_eq!(h.backend.sent_messages().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cycle_locks_released_after_use() {
        let h = harness(enabled(1));
        h.backend.set_generate_delay(Duration::from_secs(5));
        for i in 0..20 {
            h.receive(&format!("customer-{i}"), "hi");
        }

        // cycles are in flight and hold their locks
        sleep_ms(2_000).await;
        assert_eq!(h.cycle_lock_count(), 20);

        sleep_ms(10_000).await;
        assert_eq!(h.backend.sent_messages().len(), 20);
        assert_eq!(h.cycle_lock_count(), 0);

        h.engine.send_manual("customer-0", "thanks").await.unwrap();
        assert_eq!(h.cycle_lock_count(), 0);
    }
}
