//! Cancellable delayed tasks keyed by an arbitrary key
//!
//! The debounce primitive used by the store (notification settling), the
//! bridge (burst coalescing) and the data-source gateway (execution
//! coalescing). Scheduling a key that already has a pending task aborts and
//! replaces it — latest-write-wins, never a queue.

use dashmap::DashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

#[derive(Debug)]
struct PendingTask {
    generation: u64,
    handle: JoinHandle<()>,
}

/// Debounced task scheduler
///
/// One pending task per key. `schedule` on an occupied key replaces the
/// pending task; `cancel` aborts it. Keys remove themselves when they fire.
#[derive(Debug)]
pub struct Debouncer<K>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
{
    delay: Duration,
    pending: Arc<DashMap<K, PendingTask>>,
    generation: AtomicU64,
}

impl<K> Debouncer<K>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
{
    /// Create a debouncer with the given settle delay
    #[must_use]
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: Arc::new(DashMap::new()),
            generation: AtomicU64::new(0),
        }
    }

    /// The settle delay
    #[inline]
    #[must_use]
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Schedule `action` to run after the settle delay
    ///
    /// A pending task under the same key is aborted and replaced; its
    /// action never runs.
    pub fn schedule<F, Fut>(&self, key: K, action: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send,
    {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        let pending = Arc::clone(&self.pending);
        let task_key = key.clone();
        // Anchor the deadline to the scheduling instant rather than the
        // spawned task's first poll, so the settle delay is measured from
        // when `schedule` was called.
        let deadline = tokio::time::Instant::now() + self.delay;

        let handle = tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            // Only deregister if we are still the scheduled task; a
            // replacement may have raced in after our timer elapsed.
            pending.remove_if(&task_key, |_, task| task.generation == generation);
            action().await;
        });

        if let Some(previous) = self.pending.insert(key, PendingTask { generation, handle }) {
            previous.handle.abort();
        }
    }

    /// Abort the pending task for `key`, if any
    ///
    /// Returns whether a task was pending.
    pub fn cancel(&self, key: &K) -> bool {
        if let Some((_, task)) = self.pending.remove(key) {
            task.handle.abort();
            true
        } else {
            false
        }
    }

    /// Abort every pending task
    pub fn cancel_all(&self) {
        self.pending.retain(|_, task| {
            task.handle.abort();
            false
        });
    }

    /// Whether a task is pending for `key`
    #[inline]
    #[must_use]
    pub fn is_pending(&self, key: &K) -> bool {
        self.pending.contains_key(key)
    }

    /// Number of pending tasks
    #[inline]
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}
