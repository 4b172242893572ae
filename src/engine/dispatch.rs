//! Record dispatch: drop rules, then one of the enrichment paths.
//!
//! `dispatch` itself is synchronous: it inspects the record and registers
//! the async enrichment under the `"dispatch"` category, so the paginator
//! never blocks on a slow record. Event publications are registered under
//! `"hook"`. Per-record failures stay inside the record's own task.

use super::FeedEngine;
use crate::event::RecordEvent;
use crate::model::{ContentRecord, Forward, RawRecord, VisualMedia, WebRecord};
use crate::registry;
use crate::service::MarkupInfo;
use crate::tag;
use std::sync::Arc;
use url::Url;

impl FeedEngine {
    /// Route one raw record. Applies drop rules, then hands the record to
    /// the enrichment path its shape calls for.
    pub(crate) fn dispatch(&self, raw: RawRecord) {
        let batch = self.current_batch();
        let mut model = ContentRecord::from_raw(&raw, batch);

        if self.shared.config.drop_rules.matches(&raw) {
            self.emit_dropped(model);
            return;
        }

        match raw {
            // h5 flavor arrives structured; nothing left to fetch.
            RawRecord::H5(record) => {
                model.set_detail(&record.detail);
                let engine = self.clone();
                self.shared.registry.spawn(registry::DISPATCH, async move {
                    engine.finish_ready(model).await;
                });
            }
            RawRecord::Web(record) => {
                let info = match self.shared.parser.parse_info(&record.markup) {
                    Ok(info) => info,
                    Err(error) => {
                        // Data-quality defense: a record whose markup cannot
                        // even carry an identity pair is dropped, not fatal.
                        tracing::debug!(
                            record_id = %record.record_id,
                            error = %error,
                            "markup identity extraction failed; dropping record"
                        );
                        self.emit_dropped(model);
                        return;
                    }
                };
                model.apply_info(&info);

                let engine = self.clone();
                if self.optimized_eligible(&model) {
                    self.shared.registry.spawn(registry::DISPATCH, async move {
                        engine.optimized_dispatch(record, model, info).await;
                    });
                } else {
                    self.shared.registry.spawn(registry::DISPATCH, async move {
                        engine.default_dispatch(record, model, info).await;
                    });
                }
            }
        }
    }

    /// The detail API covers this record: its app id is in the known set,
    /// or its cur_key is already a direct URL.
    fn optimized_eligible(&self, model: &ContentRecord) -> bool {
        self.shared.config.detail_app_ids.contains(&model.app_id)
            || model.cur_key.as_deref().is_some_and(is_http_url)
    }

    /// Optimized path: ask the detail API directly, skipping markup
    /// parsing. Any unusable outcome falls back to the default path rather
    /// than failing the record.
    async fn optimized_dispatch(self, record: WebRecord, mut model: ContentRecord, info: MarkupInfo) {
        let outcome = self
            .shared
            .service
            .fetch_detail(record.owner_id, &record.record_id)
            .await;
        match outcome {
            Ok(Some(detail)) if detail.photos_valid() => {
                model.set_detail(&detail);
                self.finish_ready(model).await;
            }
            Ok(Some(_)) => {
                tracing::debug!(
                    record_id = %record.record_id,
                    "detail media failed validation; falling back to markup"
                );
                self.default_dispatch(record, model, info).await;
            }
            Ok(None) => {
                tracing::debug!(
                    record_id = %record.record_id,
                    "detail API had nothing; falling back to markup"
                );
                self.default_dispatch(record, model, info).await;
            }
            Err(error) if error.is_cancelled() => {}
            Err(error) => {
                tracing::warn!(
                    record_id = %record.record_id,
                    error = %error,
                    "detail fetch failed; falling back to markup"
                );
                self.default_dispatch(record, model, info).await;
            }
        }
    }

    /// Default path: parse the markup (fetching the untruncated form first
    /// when the inline payload was cut), translate, emit ready, and hand
    /// any album reference to the retry supervisor.
    async fn default_dispatch(self, record: WebRecord, mut model: ContentRecord, info: MarkupInfo) {
        let content = if info.complete {
            self.shared.parser.parse_content(&record.markup)
        } else {
            match self
                .shared
                .service
                .fetch_full_markup(record.owner_id, &record.record_id, info.kind)
                .await
            {
                Ok(Some(full)) => self.shared.parser.parse_content(&full),
                Ok(None) => {
                    tracing::debug!(
                        record_id = %record.record_id,
                        "no full markup available; parsing partial payload"
                    );
                    self.shared.parser.parse_content(&record.markup)
                }
                Err(error) if error.is_cancelled() => return,
                Err(error) => {
                    // The record is not lost: the truncated markup still
                    // yields a usable, if shorter, set of entities.
                    tracing::warn!(
                        record_id = %record.record_id,
                        error = %error,
                        "full markup fetch failed; parsing partial payload"
                    );
                    self.shared.parser.parse_content(&record.markup)
                }
            }
        };

        model.entities = content.entities;
        model.media = content.photos.iter().map(VisualMedia::from_photo).collect();
        if let Some(uni_key) = model.uni_key.clone() {
            model.forward = Some(Forward::Reference(uni_key));
        }

        tag::translate_record(&*self.shared.lookup, &mut model).await;
        let ready = Arc::new(model);
        self.emit_ready(Arc::clone(&ready));

        // The album holds more pictures than the inline thumbnails; resolve
        // the full list on the slow path.
        if let Some(album) = content.album {
            if !content.photos.is_empty() {
                self.spawn_media_retry(album, content.photos.len(), ready);
            }
        }
    }

    /// Translate tags, then publish `ready` under the hook category.
    async fn finish_ready(&self, mut model: ContentRecord) {
        tag::translate_record(&*self.shared.lookup, &mut model).await;
        self.emit_ready(Arc::new(model));
    }

    pub(crate) fn emit_ready(&self, record: Arc<ContentRecord>) {
        let engine = self.clone();
        let event = RecordEvent {
            batch: record.batch,
            record,
        };
        self.shared.registry.spawn(registry::HOOK, async move {
            engine.shared.events.ready.emit(event).await;
        });
    }

    pub(crate) fn emit_dropped(&self, model: ContentRecord) {
        let engine = self.clone();
        let event = RecordEvent {
            batch: model.batch,
            record: Arc::new(model),
        };
        self.shared.registry.spawn(registry::HOOK, async move {
            engine.shared.events.dropped.emit(event).await;
        });
    }
}

fn is_http_url(s: &str) -> bool {
    matches!(Url::parse(s), Ok(u) if u.scheme() == "http" || u.scheme() == "https")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_http_url() {
        assert!(is_http_url("https://feed.example.com/detail?id=3"));
        assert!(is_http_url("http://feed.example.com/x"));
        assert!(!is_http_url("httpfeed"));
        assert!(!is_http_url("ftp://feed.example.com"));
        assert!(!is_http_url("89abcdef"));
    }
}
