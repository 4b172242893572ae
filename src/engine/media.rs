//! Media retry supervisor.
//!
//! Albums assemble lazily on the service side: right after a record is
//! published its full media list often is not ready yet, and the album API
//! answers with a "not ready" code for a while. The supervisor polls with
//! exponential backoff (`2^i - 1` seconds before attempt `i`: 0, 1, 3, 7,
//! ..., 2047) and gives up silently after the attempt budget. A missing
//! media update is not an error, the `ready` event already carried the
//! thumbnails.

use super::FeedEngine;
use crate::error::ServiceError;
use crate::event::RecordEvent;
use crate::model::{AlbumRef, ContentRecord, VisualMedia};
use crate::registry;
use std::sync::Arc;
use std::time::Duration;

impl FeedEngine {
    /// Register the slow album resolution for `record` under `"media"`.
    pub(crate) fn spawn_media_retry(
        &self,
        album: AlbumRef,
        expected: usize,
        record: Arc<ContentRecord>,
    ) {
        tracing::info!(
            album_id = %album.album_id,
            owner_id = album.owner_id,
            expected,
            "media update task registered"
        );
        let engine = self.clone();
        self.shared.registry.spawn(registry::MEDIA, async move {
            engine.media_retry(album, expected, record).await;
        });
    }

    async fn media_retry(self, album: AlbumRef, expected: usize, record: Arc<ContentRecord>) {
        let attempts = self.shared.config.media_retry_attempts;
        for attempt in 0..attempts {
            let backoff = Duration::from_secs(2u64.saturating_pow(attempt).saturating_sub(1));
            if !backoff.is_zero() {
                tracing::debug!(secs = backoff.as_secs(), "backing off before album fetch");
            }
            // Cancellation lands here promptly: the registry wrapper drops
            // this future at the sleep.
            tokio::time::sleep(backoff).await;

            let error = match self.shared.service.fetch_album_media(&album, expected).await {
                Ok(entries) => {
                    let mut updated = (*record).clone();
                    updated.media = entries.iter().map(VisualMedia::from_album_entry).collect();
                    self.emit_media_updated(Arc::new(updated));
                    return;
                }
                Err(error) => error,
            };

            match error {
                ServiceError::Service { code, .. }
                    if code == self.shared.config.album_not_ready_code =>
                {
                    tracing::info!(attempt = attempt + 1, "album not ready yet; retrying");
                }
                ServiceError::Corrupt(message) => {
                    tracing::warn!(attempt = attempt + 1, %message, "corrupt album data; retrying");
                }
                error if error.is_transient() => {
                    tracing::info!(attempt = attempt + 1, error = %error, "album fetch failed; retrying");
                }
                error if error.is_fatal() || error.is_cancelled() => {
                    tracing::debug!(error = %error, "aborting media retry");
                    return;
                }
                error => {
                    tracing::error!(error = %error, "unexpected error in media retry");
                    return;
                }
            }
        }
        // Budget exhausted: no event. The ready record stands as published.
        tracing::debug!(album_id = %album.album_id, "album media never resolved; giving up");
    }

    pub(crate) fn emit_media_updated(&self, record: Arc<ContentRecord>) {
        let engine = self.clone();
        let event = RecordEvent {
            batch: record.batch,
            record,
        };
        self.shared.registry.spawn(registry::HOOK, async move {
            engine.shared.events.media_updated.emit(event).await;
        });
    }
}
