//! Task registry: named categories of in-flight asynchronous work.
//!
//! Every piece of async work the engine spawns is registered here under a
//! category, so a caller can deterministically know "this batch is fully
//! processed" (`wait`) or tear everything down (`cancel_all`). Entries live
//! exactly as long as the spawned operation: a drop guard removes the entry
//! and signals completion however the task settles: success, error, panic
//! unwind, cooperative cancellation, or runtime shutdown.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;

/// Batch-critical enrichment work (detail/full-markup calls, parsing).
pub const DISPATCH: &str = "dispatch";
/// Event publications (`ready`, `dropped`, `media_updated`).
pub const HOOK: &str = "hook";
/// Slow, low-priority media resolution (album retry supervisor).
pub const MEDIA: &str = "media";

struct TaskEntry {
    /// Cooperative cancellation signal; the task observes it at its next
    /// suspension point (including backoff sleeps).
    cancel: watch::Sender<bool>,
    /// Flips to `true` when the task settles. Clonable, so any number of
    /// waiters can observe the same task.
    done: watch::Receiver<bool>,
}

#[derive(Default)]
struct Inner {
    categories: Mutex<HashMap<String, HashMap<u64, TaskEntry>>>,
    next_id: AtomicU64,
}

impl Inner {
    // A poisoned lock only means some thread panicked mid-insert/remove;
    // the map itself stays usable.
    fn lock(&self) -> MutexGuard<'_, HashMap<String, HashMap<u64, TaskEntry>>> {
        match self.categories.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Removes the registry entry and signals completion when the task settles,
/// no matter how: normal return, cancellation, abort, or unwind.
struct SettleGuard {
    inner: Arc<Inner>,
    category: String,
    id: u64,
    done: watch::Sender<bool>,
}

impl Drop for SettleGuard {
    fn drop(&mut self) {
        let mut categories = self.inner.lock();
        if let Some(entries) = categories.get_mut(&self.category) {
            entries.remove(&self.id);
        }
        drop(categories);
        let _ = self.done.send(true);
    }
}

/// Named sets of in-flight tasks. Cheap to clone; all clones share state.
#[derive(Clone, Default)]
pub struct TaskRegistry {
    inner: Arc<Inner>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn `fut` on the runtime, registered under `category`.
    ///
    /// The entry is inserted before the task is spawned, so a `cancel` or
    /// `wait` issued immediately after `spawn` returns always covers it.
    pub fn spawn<F>(&self, category: &str, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (cancel_tx, mut cancel_rx) = watch::channel(false);
        let (done_tx, done_rx) = watch::channel(false);

        self.inner
            .lock()
            .entry(category.to_string())
            .or_default()
            .insert(
                id,
                TaskEntry {
                    cancel: cancel_tx,
                    done: done_rx,
                },
            );

        let guard = SettleGuard {
            inner: Arc::clone(&self.inner),
            category: category.to_string(),
            id,
            done: done_tx,
        };

        tokio::spawn(async move {
            let _guard = guard;
            tokio::select! {
                _ = cancel_rx.wait_for(|cancelled| *cancelled) => {
                    tracing::trace!(task_id = id, "task cancelled");
                }
                _ = fut => {}
            }
        });
    }

    /// Await every task currently registered under the given categories.
    ///
    /// Categories are visited in argument order, and each is snapshotted
    /// when reached, so `wait(&[DISPATCH, HOOK])` first drains dispatch
    /// work, then covers any hook tasks that work registered. Tasks spawned
    /// after their category's snapshot are not covered; call `wait` only
    /// after the relevant dispatch calls have returned.
    ///
    /// Returns the number of tasks awaited.
    pub async fn wait(&self, categories: &[&str]) -> usize {
        let mut settled = 0;
        for category in categories {
            let watchers: Vec<watch::Receiver<bool>> = {
                let map = self.inner.lock();
                map.get(*category)
                    .map(|entries| entries.values().map(|e| e.done.clone()).collect())
                    .unwrap_or_default()
            };

            for mut rx in watchers {
                // Err means the sender side is gone, which also means settled.
                let _ = rx.wait_for(|done| *done).await;
                settled += 1;
            }
        }
        settled
    }

    /// Flip the cancellation signal for every task in the given categories.
    ///
    /// Best-effort and cooperative: each task is torn down at its next
    /// suspension point; in-flight service calls are abandoned, not rolled
    /// back. Entries clean themselves up as the tasks settle.
    pub fn cancel(&self, categories: &[&str]) {
        let map = self.inner.lock();
        for category in categories {
            if let Some(entries) = map.get(*category) {
                let n = entries.len();
                for entry in entries.values() {
                    let _ = entry.cancel.send(true);
                }
                if n > 0 {
                    tracing::debug!(category, tasks = n, "cancellation requested");
                }
            }
        }
    }

    /// Cancel every task in every category.
    pub fn cancel_all(&self) {
        let names: Vec<String> = self.inner.lock().keys().cloned().collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        self.cancel(&refs);
    }

    /// Number of in-flight tasks under `category`.
    pub fn count(&self, category: &str) -> usize {
        self.inner
            .lock()
            .get(category)
            .map(|entries| entries.len())
            .unwrap_or(0)
    }
}
