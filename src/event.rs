//! Typed publish/subscribe channels, one per event kind.
//!
//! Each channel holds an ordered list of independent listeners. Publishing
//! invokes them in subscription order and isolates failures: a listener
//! returning an error is logged and the rest still run. Listeners never see
//! each other and never block the publisher beyond their own run time.
//!
//! Records are handed over as `Arc<ContentRecord>` and are immutable from
//! that point on; a later media update ships a fresh snapshot instead of
//! mutating the one already published.

use crate::error::ServiceError;
use crate::model::{BatchId, ContentRecord};
use futures::future::BoxFuture;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A record-carrying event: which batch produced it and the record itself.
#[derive(Debug, Clone)]
pub struct RecordEvent {
    pub batch: BatchId,
    pub record: Arc<ContentRecord>,
}

/// A failed heartbeat poll. `stop == true` means the poller gave up and the
/// timer is gone; `false` means the next tick will try again.
#[derive(Debug, Clone)]
pub struct HeartbeatFailure {
    pub error: Arc<ServiceError>,
    pub stop: bool,
}

type ListenerFn<T> = Box<dyn Fn(T) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

struct Listener<T> {
    label: String,
    call: ListenerFn<T>,
}

/// One event kind's channel: an ordered list of independent listeners.
pub struct Channel<T> {
    name: &'static str,
    listeners: RwLock<Vec<Arc<Listener<T>>>>,
}

impl<T: Clone + Send + 'static> Channel<T> {
    fn new(name: &'static str) -> Self {
        Self {
            name,
            listeners: RwLock::new(Vec::new()),
        }
    }

    /// Append a listener. `label` identifies it in failure logs.
    pub async fn subscribe<F, Fut>(&self, label: impl Into<String>, f: F)
    where
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let listener = Listener {
            label: label.into(),
            call: Box::new(move |event| Box::pin(f(event))),
        };
        self.listeners.write().await.push(Arc::new(listener));
    }

    /// Deliver `event` to every listener, in subscription order.
    ///
    /// The listener list is snapshotted first, so subscribing from inside a
    /// listener never deadlocks and takes effect from the next emission.
    pub async fn emit(&self, event: T) {
        let listeners: Vec<Arc<Listener<T>>> = self.listeners.read().await.clone();
        for listener in listeners {
            if let Err(error) = (listener.call)(event.clone()).await {
                tracing::error!(
                    channel = self.name,
                    listener = %listener.label,
                    error = %error,
                    "listener failed; continuing with remaining listeners"
                );
            }
        }
    }

    pub async fn listener_count(&self) -> usize {
        self.listeners.read().await.len()
    }
}

/// All of the engine's outbound channels.
pub struct EventBus {
    /// A record was excluded by a drop rule or malformed markup.
    pub dropped: Channel<RecordEvent>,
    /// A record's primary text/entities are resolved.
    pub ready: Channel<RecordEvent>,
    /// A record's full media list arrived (after its `ready`).
    pub media_updated: Channel<RecordEvent>,
    /// The heartbeat saw `n > 0` new records.
    pub heartbeat_refreshed: Channel<u32>,
    /// A heartbeat poll failed; see [`HeartbeatFailure::stop`].
    pub heartbeat_failed: Channel<HeartbeatFailure>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            dropped: Channel::new("dropped"),
            ready: Channel::new("ready"),
            media_updated: Channel::new("media_updated"),
            heartbeat_refreshed: Channel::new("heartbeat_refreshed"),
            heartbeat_failed: Channel::new("heartbeat_failed"),
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_listeners_run_in_subscription_order() {
        let channel: Channel<u32> = Channel::new("test");
        let order = Arc::new(tokio::sync::Mutex::new(Vec::new()));

        for tag in ["first", "second", "third"] {
            let order = Arc::clone(&order);
            channel
                .subscribe(tag, move |n: u32| {
                    let order = Arc::clone(&order);
                    async move {
                        order.lock().await.push((tag, n));
                        Ok(())
                    }
                })
                .await;
        }

        channel.emit(7).await;
        assert_eq!(
            *order.lock().await,
            vec![("first", 7), ("second", 7), ("third", 7)]
        );
    }

    #[tokio::test]
    async fn test_failing_listener_does_not_block_siblings() {
        let channel: Channel<u32> = Channel::new("test");
        let reached = Arc::new(AtomicUsize::new(0));

        channel
            .subscribe("faulty", |_| async { anyhow::bail!("listener exploded") })
            .await;
        {
            let reached = Arc::clone(&reached);
            channel
                .subscribe("healthy", move |_| {
                    let reached = Arc::clone(&reached);
                    async move {
                        reached.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    }
                })
                .await;
        }

        channel.emit(1).await;
        channel.emit(2).await;
        assert_eq!(reached.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_emit_without_listeners_is_a_noop() {
        let channel: Channel<u32> = Channel::new("test");
        channel.emit(42).await;
        assert_eq!(channel.listener_count().await, 0);
    }
}
