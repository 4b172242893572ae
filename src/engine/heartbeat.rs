//! Heartbeat poller: periodic new-content checks without a full fetch.
//!
//! Two steady states: running (timer armed) and stopped. Each tick calls
//! the cheap new-content count and classifies the outcome. Transient
//! failures keep the timer alive (the next tick retries); a login-fatal or
//! defect-class failure emits `heartbeat_failed` with `stop = true` and
//! tears the timer down for good.

use super::FeedEngine;
use crate::event::HeartbeatFailure;
use crate::registry;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;

/// Mutable poller state, owned by the timer task.
#[derive(Debug, Default)]
struct HeartbeatState {
    last_success: Option<i64>,
    failures: u32,
}

impl HeartbeatState {
    fn record_success(&mut self) {
        self.last_success = Some(chrono::Utc::now().timestamp());
        self.failures = 0;
    }
}

impl FeedEngine {
    /// Arm the heartbeat timer. The first poll happens one `interval` from
    /// now; a previously armed timer is cancelled and replaced.
    pub fn heartbeat_start(&self, interval: Duration) {
        let engine = self.clone();
        let handle = tokio::spawn(async move {
            let mut state = HeartbeatState::default();
            let mut ticker =
                tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                let stop = engine.heartbeat_tick(&mut state).await;
                if stop {
                    tracing::warn!(failures = state.failures, "heartbeat stopped");
                    break;
                }
            }
        });

        let mut slot = self.shared.heartbeat_slot();
        if let Some(previous) = slot.replace(handle) {
            previous.abort();
            tracing::debug!("previous heartbeat timer replaced");
        }
    }

    /// Cancel the heartbeat timer and release it. Idempotent.
    pub fn heartbeat_stop(&self) {
        if let Some(handle) = self.shared.heartbeat_slot().take() {
            handle.abort();
            tracing::debug!("heartbeat timer cancelled");
        }
    }

    /// One poll. Returns whether the timer should stop.
    async fn heartbeat_tick(&self, state: &mut HeartbeatState) -> bool {
        match self.shared.service.fetch_new_content_count().await {
            Ok(0) => {
                state.record_success();
                false
            }
            Ok(count) => {
                state.record_success();
                tracing::debug!(count, "heartbeat: new content available");
                let engine = self.clone();
                self.shared.registry.spawn(registry::HOOK, async move {
                    engine.shared.events.heartbeat_refreshed.emit(count).await;
                });
                false
            }
            Err(error) => {
                let stop = error.is_fatal() || error.is_defect();
                state.failures += 1;
                if stop {
                    tracing::warn!(error = %error, "fatal error in heartbeat");
                } else {
                    tracing::warn!(
                        error = %error,
                        failures = state.failures,
                        "heartbeat failed; will retry on next tick"
                    );
                }

                let failure = HeartbeatFailure {
                    error: Arc::new(error),
                    stop,
                };
                let engine = self.clone();
                self.shared.registry.spawn(registry::HOOK, async move {
                    engine.shared.events.heartbeat_failed.emit(failure).await;
                });
                stop
            }
        }
    }
}
