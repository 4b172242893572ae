//! External-collaborator interfaces.
//!
//! The engine is an in-memory pipeline; everything that talks to the
//! network or parses markup lives behind the traits here. Implementations
//! own their own session/login handling and surface
//! [`ServiceError::Login`](crate::error::ServiceError::Login) only when
//! every strategy is exhausted.

use crate::error::ServiceError;
use crate::model::{AlbumEntry, AlbumRef, Entity, PhotoDescriptor, RawRecord, RecordDetail};
use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

/// One page of feed records.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeedPage {
    /// Records in service order.
    pub records: Vec<RawRecord>,
    /// Cursor for the next page, echoed back on the following fetch.
    pub next_token: Option<String>,
    /// Whether the service claims more pages exist. Advisory only: the
    /// paginator bounds its iterations regardless.
    pub has_more: bool,
}

/// The remote content service, sessions included.
#[async_trait]
pub trait ContentService: Send + Sync {
    /// Fetch one page of the feed stream. `token` is `None` for the first
    /// page, then whatever the previous page's `next_token` was.
    async fn fetch_page(&self, token: Option<&str>) -> Result<FeedPage, ServiceError>;

    /// Resolve a record's full detail. `Ok(None)` means the detail API has
    /// nothing for this record (not an error).
    async fn fetch_detail(
        &self,
        owner_id: i64,
        record_id: &str,
    ) -> Result<Option<RecordDetail>, ServiceError>;

    /// Fetch the untruncated markup of a record whose inline payload was
    /// cut short. `kind` is the record kind extracted from the markup.
    async fn fetch_full_markup(
        &self,
        owner_id: i64,
        record_id: &str,
        kind: u32,
    ) -> Result<Option<String>, ServiceError>;

    /// List the full media of an album. `expected` is the number of inline
    /// thumbnails the caller already has; the service uses it as a floor.
    async fn fetch_album_media(
        &self,
        album: &AlbumRef,
        expected: usize,
    ) -> Result<Vec<AlbumEntry>, ServiceError>;

    /// Number of records newer than the last fetch. Cheap; used by the
    /// heartbeat poller.
    async fn fetch_new_content_count(&self) -> Result<u32, ServiceError>;
}

/// Malformed markup. Treated as a data-quality drop, never a batch failure.
#[derive(Debug, Error)]
#[error("malformed markup: {0}")]
pub struct MarkupError(pub String);

/// Identity pair and completeness flag extracted from a record's markup.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MarkupInfo {
    /// Identifier of the record itself. May be a URL.
    pub cur_key: Option<String>,
    /// Identifier of the original content (shares/forwards).
    pub uni_key: Option<String>,
    /// Whether the inline markup carries the full content or was truncated.
    pub complete: bool,
    /// Record kind, passed through to the full-markup API.
    pub kind: u32,
}

/// Content parsed out of markup.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MarkupContent {
    pub entities: Vec<Entity>,
    #[serde(default)]
    pub photos: Vec<PhotoDescriptor>,
    /// Set when the markup references an album larger than what is inlined.
    #[serde(default)]
    pub album: Option<AlbumRef>,
}

/// Markup parsing, pure and synchronous.
pub trait MarkupParser: Send + Sync {
    /// Extract the identity pair. Errors on markup too malformed to carry
    /// one; the record is then dropped as a data-quality defense.
    fn parse_info(&self, markup: &str) -> Result<MarkupInfo, MarkupError>;

    /// Parse entities, inline photos and any album reference. Best-effort:
    /// called on partial markup too, so it never fails; unparseable
    /// regions just yield fewer entities.
    fn parse_content(&self, markup: &str) -> MarkupContent;
}

/// Resolves a shorthand-token id to its display text. May be networked and
/// slow; the translator tolerates failures per token.
#[async_trait]
pub trait NameLookup: Send + Sync {
    /// `Ok(None)` when the id is unknown.
    async fn lookup(&self, id: u64) -> Result<Option<String>, ServiceError>;
}
