// Ephemeral user-facing notices fed by auto-reply and other async operations.
// Every notice expires on its own after a fixed duration unless closed earlier.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;
use uuid::Uuid;

use crate::constants::NOTIFICATION_TTL;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationKind {
    Success,
    Error,
}

pub type NotificationId = Uuid;

#[derive(Debug, Clone)]
pub struct Notification {
    pub id: NotificationId,
    pub kind: NotificationKind,
    pub message: String,
    pub shown_at: Instant,
    pub duration: Duration,
}

impl Notification {
    pub fn is_expired_at(&self, now: Instant) -> bool {
        now.duration_since(self.shown_at) >= self.duration
    }
}

/// Arrival-ordered notices, no de-duplication.
#[derive(Debug)]
struct NotificationQueue {
    items: VecDeque<Notification>,
    ttl: Duration,
}

impl NotificationQueue {
    fn push(&mut self, message: String, kind: NotificationKind) -> NotificationId {
        let id = Uuid::new_v4();
        self.items.push_back(Notification {
            id,
            kind,
            message,
            shown_at: Instant::now(),
            duration: self.ttl,
        });
        id
    }

    fn remove(&mut self, id: NotificationId) -> bool {
        let before = self.items.len();
        self.items.retain(|n| n.id != id);
        self.items.len() != before
    }

    fn prune(&mut self) {
        let now = Instant::now();
        self.items.retain(|n| !n.is_expired_at(now));
    }
}

/// Shared handle to the notification surface.
#[derive(Debug, Clone)]
pub struct NotificationCenter {
    queue: Arc<Mutex<NotificationQueue>>,
}

impl NotificationCenter {
    pub fn new() -> Self {
        Self::with_ttl(NOTIFICATION_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            queue: Arc::new(Mutex::new(NotificationQueue {
                items: VecDeque::new(),
                ttl,
            })),
        }
    }

    pub fn show(&self, message: impl Into<String>, kind: NotificationKind) -> NotificationId {
        let message = message.into();
        match kind {
            NotificationKind::Success => tracing::info!(%message, "notification"),
            NotificationKind::Error => tracing::warn!(%message, "notification"),
        }
        self.queue.lock().push(message, kind)
    }

    pub fn success(&self, message: impl Into<String>) -> NotificationId {
        self.show(message, NotificationKind::Success)
    }

    pub fn error(&self, message: impl Into<String>) -> NotificationId {
        self.show(message, NotificationKind::Error)
    }

    /// Dismiss early. Returns false if already gone.
    pub fn close(&self, id: NotificationId) -> bool {
        self.queue.lock().remove(id)
    }

    /// Drop expired notices (call each UI tick)
    pub fn tick(&self) {
        self.queue.lock().prune();
    }

    /// Live notices in arrival order
    pub fn active(&self) -> Vec<Notification> {
        let mut queue = self.queue.lock();
        queue.prune();
        queue.items.iter().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.active().is_empty()
    }

    pub fn clear(&self) {
        self.queue.lock().items.clear();
    }
}

impl Default for NotificationCenter {
    fn default() -> Self {
        Self::new()
    }
}
