//! The feed engine: paginated fetch, record dispatch, and lifecycle.
//!
//! One [`FeedEngine`] owns the task registry, the event bus, and the batch
//! counter. It is a cheap handle (`Clone` shares state) so spawned
//! enrichment tasks can carry it around. Records never come back from the
//! fetch calls directly; they are delivered exclusively through the event
//! bus, while the calls return only the accepted count.

mod dispatch;
mod heartbeat;
mod media;

use crate::config::EngineConfig;
use crate::error::{ErrorBarrier, FeedError, ServiceError};
use crate::event::EventBus;
use crate::model::{BatchId, RawRecord};
use crate::registry::TaskRegistry;
use crate::service::{ContentService, MarkupParser, NameLookup};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::task::JoinHandle;

/// Caller-supplied early-stop predicate for the paginators. Returning
/// `true` for a record stops fetching further pages; the record itself is
/// skipped, not dispatched.
pub type StopPredicate<'a> = &'a (dyn Fn(&RawRecord) -> bool + Send + Sync);

pub(crate) struct Shared {
    pub(crate) service: Arc<dyn ContentService>,
    pub(crate) parser: Arc<dyn MarkupParser>,
    pub(crate) lookup: Arc<dyn NameLookup>,
    pub(crate) config: EngineConfig,
    pub(crate) registry: TaskRegistry,
    pub(crate) events: EventBus,
    batch: AtomicU32,
    heartbeat: Mutex<Option<JoinHandle<()>>>,
}

impl Shared {
    pub(crate) fn heartbeat_slot(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        match self.heartbeat.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Engine handle. Clones share all state.
#[derive(Clone)]
pub struct FeedEngine {
    pub(crate) shared: Arc<Shared>,
}

impl FeedEngine {
    pub fn new(
        service: Arc<dyn ContentService>,
        parser: Arc<dyn MarkupParser>,
        lookup: Arc<dyn NameLookup>,
        config: EngineConfig,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                service,
                parser,
                lookup,
                config,
                registry: TaskRegistry::new(),
                events: EventBus::new(),
                batch: AtomicU32::new(0),
                heartbeat: Mutex::new(None),
            }),
        }
    }

    /// Outbound event channels.
    pub fn events(&self) -> &EventBus {
        &self.shared.events
    }

    /// The task registry, for diagnostics. Prefer [`FeedEngine::wait`] and
    /// [`FeedEngine::stop`] for lifecycle control.
    pub fn registry(&self) -> &TaskRegistry {
        &self.shared.registry
    }

    /// Mint the batch id for the next fetch invocation.
    ///
    /// Wraps modulo [`BatchId::CEILING`]; correlation only. Events emitted
    /// by subsequent `get_feeds_by_*` calls carry this id.
    pub fn new_batch(&self) -> BatchId {
        let previous = self
            .shared
            .batch
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |current| {
                Some(BatchId(current).next().0)
            })
            .unwrap_or_else(|current| current);
        BatchId(previous).next()
    }

    pub(crate) fn current_batch(&self) -> BatchId {
        BatchId(self.shared.batch.load(Ordering::Relaxed))
    }

    /// Fetch until `count` records have been accepted and dispatched.
    ///
    /// Returns the accepted count: at most `count`, and exactly `count`
    /// unless the source ran out of pages first. Records are delivered via
    /// events only, in task-completion order.
    ///
    /// # Errors
    ///
    /// [`FeedError::Session`] when login is exhausted or the fetch was
    /// cancelled; [`FeedError::RetryExceeded`] when too many consecutive
    /// pages failed; [`FeedError::Unexpected`] for defect-class errors.
    pub async fn get_feeds_by_count(
        &self,
        count: usize,
        stop_pred: Option<StopPredicate<'_>>,
    ) -> Result<usize, FeedError> {
        let mut accepted = 0;
        let mut token: Option<String> = None;
        let mut barrier = ErrorBarrier::new(self.shared.config.page_error_budget);

        for page in 0..self.shared.config.page_limit {
            let resp = match self.shared.service.fetch_page(token.as_deref()).await {
                Ok(resp) => {
                    barrier.reset();
                    resp
                }
                Err(error) => {
                    classify_page_error(error, &mut barrier, page)?;
                    continue;
                }
            };
            token = resp.next_token;
            let mut stop_fetching = !resp.has_more;
            tracing::debug!(page, accepted, has_more = !stop_fetching, "page fetched");

            for record in resp.records {
                if accepted >= count {
                    stop_fetching = true;
                    break;
                }
                if let Some(pred) = stop_pred {
                    if pred(&record) {
                        stop_fetching = true;
                        continue;
                    }
                }
                self.dispatch(record);
                accepted += 1;
            }

            if stop_fetching {
                break;
            }
        }

        Ok(accepted)
    }

    /// Fetch every record whose creation time falls in
    /// `[start - seconds, start]`. `start` defaults to now.
    ///
    /// Records newer than `start` are skipped without stopping (the stream
    /// is newest-first and may begin above the window); the first record
    /// older than the window stops fetching. Returns the accepted count.
    ///
    /// # Errors
    ///
    /// Same contract as [`FeedEngine::get_feeds_by_count`].
    pub async fn get_feeds_by_second(
        &self,
        seconds: i64,
        start: Option<i64>,
        stop_pred: Option<StopPredicate<'_>>,
    ) -> Result<usize, FeedError> {
        let start = start.unwrap_or_else(|| chrono::Utc::now().timestamp());
        let end = start - seconds;

        let mut accepted = 0;
        let mut token: Option<String> = None;
        let mut barrier = ErrorBarrier::new(self.shared.config.page_error_budget);

        for page in 0..self.shared.config.page_limit {
            let resp = match self.shared.service.fetch_page(token.as_deref()).await {
                Ok(resp) => {
                    barrier.reset();
                    resp
                }
                Err(error) => {
                    classify_page_error(error, &mut barrier, page)?;
                    continue;
                }
            };
            token = resp.next_token;
            let mut stop_fetching = !resp.has_more;
            tracing::debug!(page, accepted, has_more = !stop_fetching, "page fetched");

            for record in resp.records {
                let created_at = record.created_at();
                if created_at > start {
                    continue;
                }
                if created_at < end || stop_pred.is_some_and(|pred| pred(&record)) {
                    stop_fetching = true;
                    continue;
                }
                self.dispatch(record);
                accepted += 1;
            }

            if stop_fetching {
                break;
            }
        }

        Ok(accepted)
    }

    /// Await every task currently registered under `categories`, in order.
    /// See [`TaskRegistry::wait`] for snapshot semantics. Returns the
    /// number of tasks awaited.
    pub async fn wait(&self, categories: &[&str]) -> usize {
        self.shared.registry.wait(categories).await
    }

    /// Cancel dispatch work only, leaving hooks and media tasks to finish.
    pub fn clear(&self) {
        self.shared.registry.cancel(&[crate::registry::DISPATCH]);
    }

    /// Cancel every registered task in every category and the heartbeat
    /// timer. Cancellation is cooperative and best-effort: in-flight
    /// service calls are abandoned, not rolled back.
    pub fn stop(&self) {
        tracing::warn!("engine stopping");
        self.shared.registry.cancel_all();
        self.heartbeat_stop();
    }
}

/// Route a page-fetch error: fatal classes abort the call, everything else
/// burns one unit of the consecutive-error budget.
fn classify_page_error(
    error: ServiceError,
    barrier: &mut ErrorBarrier,
    page: usize,
) -> Result<(), FeedError> {
    if error.is_fatal() || error.is_cancelled() {
        return Err(FeedError::Session(error));
    }
    if error.is_defect() {
        return Err(FeedError::Unexpected(error));
    }
    tracing::warn!(page, error = %error, "error fetching page; skipping");
    barrier.push(error)
}
