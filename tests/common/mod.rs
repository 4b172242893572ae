//! Shared mocks for the integration tests: a scriptable content service, a
//! JSON-grammar markup parser, and a map-backed name lookup.
//!
//! Each test creates its own [`MockService`] and scripts outcomes per call;
//! failure kinds are stored as [`Fail`] values and rebuilt into fresh
//! `ServiceError`s, since errors themselves are not `Clone`.
#![allow(dead_code)]

use async_trait::async_trait;
use ripple::error::ServiceError;
use ripple::event::{Channel, RecordEvent};
use ripple::model::{AlbumEntry, AlbumRef, RawRecord, RecordDetail, WebRecord};
use ripple::service::{
    ContentService, FeedPage, MarkupContent, MarkupError, MarkupInfo, MarkupParser, NameLookup,
};
use ripple::{EngineConfig, FeedEngine};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

// ============================================================================
// Scriptable Failures
// ============================================================================

#[derive(Debug, Clone)]
pub enum Fail {
    Service(i32),
    Transport,
    Corrupt,
    Login,
    Cancelled,
    Unexpected,
}

impl Fail {
    pub fn to_error(&self) -> ServiceError {
        match self {
            Fail::Service(code) => ServiceError::Service {
                code: *code,
                message: "scripted service error".to_string(),
            },
            Fail::Transport => ServiceError::Transport("scripted transport error".to_string()),
            Fail::Corrupt => ServiceError::Corrupt("scripted corrupt payload".to_string()),
            Fail::Login => ServiceError::Login,
            Fail::Cancelled => ServiceError::Cancelled,
            Fail::Unexpected => ServiceError::Unexpected("scripted defect".to_string()),
        }
    }
}

pub enum PageOutcome {
    Page(FeedPage),
    Fail(Fail),
}

pub enum DetailOutcome {
    Detail(RecordDetail),
    Nothing,
    Fail(Fail),
}

pub enum MarkupOutcome {
    Full(String),
    Nothing,
    Fail(Fail),
    /// Never resolves; used to test cancellation.
    Hang,
}

pub enum AlbumOutcome {
    Entries(Vec<AlbumEntry>),
    Fail(Fail),
}

pub enum CountOutcome {
    Count(u32),
    Fail(Fail),
}

// ============================================================================
// Mock Content Service
// ============================================================================

#[derive(Default)]
pub struct MockService {
    pub pages: Mutex<VecDeque<PageOutcome>>,
    /// Keyed by record id. Missing key means `Ok(None)`.
    pub details: Mutex<HashMap<String, DetailOutcome>>,
    /// Keyed by record id. Missing key means `Ok(None)`.
    pub full_markup: Mutex<HashMap<String, MarkupOutcome>>,
    pub album_script: Mutex<VecDeque<AlbumOutcome>>,
    /// Instant of every `fetch_album_media` call, for backoff assertions.
    pub album_calls: Mutex<Vec<tokio::time::Instant>>,
    pub count_script: Mutex<VecDeque<CountOutcome>>,
    pub page_calls: AtomicUsize,
    pub detail_calls: AtomicUsize,
    pub count_calls: AtomicUsize,
}

impl MockService {
    pub fn with_pages(pages: Vec<PageOutcome>) -> Arc<Self> {
        let service = Self::default();
        *service.pages.lock().unwrap() = pages.into_iter().collect();
        Arc::new(service)
    }

    pub fn album_call_count(&self) -> usize {
        self.album_calls.lock().unwrap().len()
    }
}

#[async_trait]
impl ContentService for MockService {
    async fn fetch_page(&self, _token: Option<&str>) -> Result<FeedPage, ServiceError> {
        self.page_calls.fetch_add(1, Ordering::SeqCst);
        match self.pages.lock().unwrap().pop_front() {
            Some(PageOutcome::Page(page)) => Ok(page),
            Some(PageOutcome::Fail(fail)) => Err(fail.to_error()),
            None => Ok(FeedPage {
                records: Vec::new(),
                next_token: None,
                has_more: false,
            }),
        }
    }

    async fn fetch_detail(
        &self,
        _owner_id: i64,
        record_id: &str,
    ) -> Result<Option<RecordDetail>, ServiceError> {
        self.detail_calls.fetch_add(1, Ordering::SeqCst);
        match self.details.lock().unwrap().get(record_id) {
            Some(DetailOutcome::Detail(detail)) => Ok(Some(detail.clone())),
            Some(DetailOutcome::Nothing) | None => Ok(None),
            Some(DetailOutcome::Fail(fail)) => Err(fail.to_error()),
        }
    }

    async fn fetch_full_markup(
        &self,
        _owner_id: i64,
        record_id: &str,
        _kind: u32,
    ) -> Result<Option<String>, ServiceError> {
        // Decide under the lock, await outside it.
        let hang = {
            let map = self.full_markup.lock().unwrap();
            match map.get(record_id) {
                Some(MarkupOutcome::Full(markup)) => return Ok(Some(markup.clone())),
                Some(MarkupOutcome::Nothing) | None => return Ok(None),
                Some(MarkupOutcome::Fail(fail)) => return Err(fail.to_error()),
                Some(MarkupOutcome::Hang) => true,
            }
        };
        if hang {
            std::future::pending::<()>().await;
        }
        Ok(None)
    }

    async fn fetch_album_media(
        &self,
        _album: &AlbumRef,
        _expected: usize,
    ) -> Result<Vec<AlbumEntry>, ServiceError> {
        self.album_calls.lock().unwrap().push(tokio::time::Instant::now());
        match self.album_script.lock().unwrap().pop_front() {
            Some(AlbumOutcome::Entries(entries)) => Ok(entries),
            Some(AlbumOutcome::Fail(fail)) => Err(fail.to_error()),
            None => Ok(Vec::new()),
        }
    }

    async fn fetch_new_content_count(&self) -> Result<u32, ServiceError> {
        self.count_calls.fetch_add(1, Ordering::SeqCst);
        match self.count_script.lock().unwrap().pop_front() {
            Some(CountOutcome::Count(n)) => Ok(n),
            Some(CountOutcome::Fail(fail)) => Err(fail.to_error()),
            None => Ok(0),
        }
    }
}

// ============================================================================
// JSON-Grammar Markup Parser
// ============================================================================

/// Parses test markup written as JSON: `{"info": {...}, "content": {...}}`.
/// Markup without an `info` block is malformed (identity extraction fails).
#[derive(Default)]
pub struct JsonMarkupParser;

impl MarkupParser for JsonMarkupParser {
    fn parse_info(&self, markup: &str) -> Result<MarkupInfo, MarkupError> {
        let value: serde_json::Value =
            serde_json::from_str(markup).map_err(|e| MarkupError(e.to_string()))?;
        let info = value
            .get("info")
            .ok_or_else(|| MarkupError("no identity block".to_string()))?;
        serde_json::from_value(info.clone()).map_err(|e| MarkupError(e.to_string()))
    }

    fn parse_content(&self, markup: &str) -> MarkupContent {
        serde_json::from_str::<serde_json::Value>(markup)
            .ok()
            .and_then(|v| v.get("content").cloned())
            .and_then(|c| serde_json::from_value(c).ok())
            .unwrap_or_default()
    }
}

// ============================================================================
// Map-Backed Name Lookup
// ============================================================================

#[derive(Default)]
pub struct MockLookup {
    pub names: HashMap<u64, String>,
}

#[async_trait]
impl NameLookup for MockLookup {
    async fn lookup(&self, id: u64) -> Result<Option<String>, ServiceError> {
        Ok(self.names.get(&id).cloned())
    }
}

// ============================================================================
// Builders
// ============================================================================

pub fn web_record(owner_id: i64, record_id: &str, created_at: i64, markup: String) -> RawRecord {
    RawRecord::Web(WebRecord {
        app_id: 0,
        type_id: 0,
        record_id: record_id.to_string(),
        created_at,
        owner_id,
        owner_name: format!("owner-{owner_id}"),
        is_liked: false,
        markup,
    })
}

pub fn web_record_with_app(
    app_id: i32,
    owner_id: i64,
    record_id: &str,
    created_at: i64,
    markup: String,
) -> RawRecord {
    match web_record(owner_id, record_id, created_at, markup) {
        RawRecord::Web(mut r) => {
            r.app_id = app_id;
            RawRecord::Web(r)
        }
        other => other,
    }
}

/// Markup whose inline payload is complete: parsed in place.
pub fn complete_markup(text: &str) -> String {
    serde_json::json!({
        "info": { "complete": true, "kind": 0 },
        "content": { "entities": [ { "type": "text", "text": text } ] }
    })
    .to_string()
}

/// Markup cut short by the service: the full form must be fetched.
pub fn incomplete_markup(kind: u32) -> String {
    serde_json::json!({
        "info": { "complete": false, "kind": kind },
        "content": { "entities": [ { "type": "text", "text": "truncated…" } ] }
    })
    .to_string()
}

/// Complete markup that references an album with inline thumbnails.
pub fn album_markup(text: &str, album_id: &str, owner_id: i64, thumbs: usize) -> String {
    let photos: Vec<serde_json::Value> = (0..thumbs)
        .map(|i| {
            serde_json::json!({
                "height": 100, "width": 100,
                "url": format!("https://img.example.com/{album_id}/thumb{i}.jpg"),
                "thumb_url": null
            })
        })
        .collect();
    serde_json::json!({
        "info": { "complete": true, "kind": 0 },
        "content": {
            "entities": [ { "type": "text", "text": text } ],
            "photos": photos,
            "album": { "album_id": album_id, "owner_id": owner_id }
        }
    })
    .to_string()
}

pub fn album_entries(n: usize) -> Vec<AlbumEntry> {
    (0..n)
        .map(|i| AlbumEntry {
            height: 1080,
            width: 1920,
            url: format!("https://img.example.com/full{i}.jpg"),
            thumb_url: Some(format!("https://img.example.com/full{i}_s.jpg")),
            video_url: None,
        })
        .collect()
}

pub fn page(records: Vec<RawRecord>, has_more: bool) -> PageOutcome {
    PageOutcome::Page(FeedPage {
        records,
        next_token: has_more.then(|| "cursor".to_string()),
        has_more,
    })
}

// ============================================================================
// Engine + Event Sinks
// ============================================================================

pub fn engine_with(service: Arc<MockService>) -> FeedEngine {
    engine_with_config(service, EngineConfig::default())
}

pub fn engine_with_config(service: Arc<MockService>, config: EngineConfig) -> FeedEngine {
    FeedEngine::new(
        service,
        Arc::new(JsonMarkupParser),
        Arc::new(MockLookup::default()),
        config,
    )
}

/// Subscribe a collecting listener; events land in the returned vec.
pub async fn event_sink<T: Clone + Send + 'static>(channel: &Channel<T>) -> Arc<Mutex<Vec<T>>> {
    let sink = Arc::new(Mutex::new(Vec::new()));
    let captured = Arc::clone(&sink);
    channel
        .subscribe("sink", move |event| {
            let captured = Arc::clone(&captured);
            async move {
                captured.lock().unwrap().push(event);
                Ok(())
            }
        })
        .await;
    sink
}

/// [`event_sink`] for the record-carrying channels.
pub async fn record_sink(channel: &Channel<RecordEvent>) -> Arc<Mutex<Vec<RecordEvent>>> {
    event_sink(channel).await
}
