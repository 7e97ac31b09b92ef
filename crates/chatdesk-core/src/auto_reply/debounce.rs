use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;

struct Pending {
    generation: u64,
    handle: JoinHandle<()>,
}

struct DebounceState<K> {
    next_generation: u64,
    pending: HashMap<K, Pending>,
}

/// Per-key cancel-and-reschedule timers.
///
/// Scheduling a key replaces whatever was pending for it. When a timer
/// expires it claims its slot only if it is still the latest generation for
/// that key, so an aborted task that raced past its sleep never runs its
/// action. Once claimed, the action runs to completion and is no longer
/// cancelable through this type.
pub struct KeyedDebouncer<K> {
    state: Arc<Mutex<DebounceState<K>>>,
}

impl<K> KeyedDebouncer<K>
where
    K: Clone + Eq + Hash + Send + 'static,
{
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(DebounceState {
                next_generation: 0,
                pending: HashMap::new(),
            })),
        }
    }

    /// Run `action` after `delay` unless `key` is rescheduled or cancelled first.
    /// Must be called inside a tokio runtime.
    pub fn schedule<F>(&self, key: K, delay: Duration, action: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut state = self.state.lock();
        state.next_generation += 1;
        let generation = state.next_generation;

        let shared = Arc::clone(&self.state);
        let task_key = key.clone();
        // The task cannot claim before the insert below: it needs the lock we hold.
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            {
                let mut state = shared.lock();
                match state.pending.get(&task_key) {
                    Some(p) if p.generation == generation => {
                        state.pending.remove(&task_key);
                    }
                    _ => return,
                }
            }
            action.await;
        });

        if let Some(previous) = state.pending.insert(key, Pending { generation, handle }) {
            previous.handle.abort();
        }
    }

    /// Returns true if a pending timer was dropped.
    pub fn cancel(&self, key: &K) -> bool {
        match self.state.lock().pending.remove(key) {
            Some(p) => {
                p.handle.abort();
                true
            }
            None => false,
        }
    }

    pub fn cancel_all(&self) -> usize {
        let drained: Vec<Pending> = self.state.lock().pending.drain().map(|(_, p)| p).collect();
        for p in &drained {
            p.handle.abort();
        }
        drained.len()
    }

    pub fn is_pending(&self, key: &K) -> bool {
        self.state.lock().pending.contains_key(key)
    }

    pub fn pending_count(&self) -> usize {
        self.state.lock().pending.len()
    }
}

impl<K> Default for KeyedDebouncer<K>
where
    K: Clone + Eq + Hash + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K> Drop for KeyedDebouncer<K> {
    fn drop(&mut self) {
        for (_, p) in self.state.lock().pending.drain() {
            p.handle.abort();
        }
    }
}
