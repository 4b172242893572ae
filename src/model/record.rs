//! Raw records as the content service hands them over.
//!
//! The service has two flavors. The web flavor returns an HTML-ish markup
//! blob the engine must parse; the h5 flavor returns structure directly.
//! Both share the identity fields, so [`RawRecord`] is a tagged union with
//! accessors rather than an inheritance ladder: one normalization path per
//! variant.

use crate::model::content::Entity;
use crate::model::media::{PhotoDescriptor, VideoDescriptor};
use serde::{Deserialize, Serialize};

/// One feed item as fetched, before any enrichment. Immutable once fetched.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "flavor", rename_all = "snake_case")]
pub enum RawRecord {
    Web(WebRecord),
    H5(H5Record),
}

/// Web-flavor record: identity plus an embedded markup payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebRecord {
    pub app_id: i32,
    pub type_id: i32,
    /// Not unique across the service: shares reuse short placeholder ids.
    /// Dedup on `(owner_id, created_at)` instead.
    pub record_id: String,
    /// Creation time, unix seconds.
    pub created_at: i64,
    pub owner_id: i64,
    pub owner_name: String,
    pub is_liked: bool,
    /// Markup payload; may be truncated ("incomplete") for long records.
    pub markup: String,
}

/// H5-flavor record: identity plus an already-structured detail payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct H5Record {
    pub app_id: i32,
    pub type_id: i32,
    pub record_id: String,
    pub created_at: i64,
    pub owner_id: i64,
    pub owner_name: String,
    pub is_liked: bool,
    /// Identifier of this record itself. May be a URL.
    pub cur_key: Option<String>,
    /// Identifier of the original content (for shares/forwards).
    pub uni_key: Option<String>,
    pub detail: RecordDetail,
}

impl RawRecord {
    pub fn app_id(&self) -> i32 {
        match self {
            RawRecord::Web(r) => r.app_id,
            RawRecord::H5(r) => r.app_id,
        }
    }

    pub fn type_id(&self) -> i32 {
        match self {
            RawRecord::Web(r) => r.type_id,
            RawRecord::H5(r) => r.type_id,
        }
    }

    pub fn record_id(&self) -> &str {
        match self {
            RawRecord::Web(r) => &r.record_id,
            RawRecord::H5(r) => &r.record_id,
        }
    }

    pub fn created_at(&self) -> i64 {
        match self {
            RawRecord::Web(r) => r.created_at,
            RawRecord::H5(r) => r.created_at,
        }
    }

    pub fn owner_id(&self) -> i64 {
        match self {
            RawRecord::Web(r) => r.owner_id,
            RawRecord::H5(r) => r.owner_id,
        }
    }

    pub fn owner_name(&self) -> &str {
        match self {
            RawRecord::Web(r) => &r.owner_name,
            RawRecord::H5(r) => &r.owner_name,
        }
    }

    pub fn is_liked(&self) -> bool {
        match self {
            RawRecord::Web(r) => r.is_liked,
            RawRecord::H5(r) => r.is_liked,
        }
    }
}

/// Fully resolved body of a record: text entities, forwarded content, media.
///
/// Returned by the detail API and embedded in h5-flavor records.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordDetail {
    pub entities: Vec<Entity>,
    #[serde(default)]
    pub photos: Vec<PhotoDescriptor>,
    #[serde(default)]
    pub video: Option<VideoDescriptor>,
    #[serde(default)]
    pub forward: Option<ForwardSource>,
}

impl RecordDetail {
    /// Whether every photo carries a usable raw URL. A detail response that
    /// fails this is treated as unusable and the record falls back to the
    /// markup path.
    pub fn photos_valid(&self) -> bool {
        self.photos.iter().all(|p| p.valid_url())
    }
}

/// What a record forwards, as the service describes it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ForwardSource {
    /// The original record, resolved inline.
    Original(Box<OriginalRecord>),
    /// Only an opaque reference to the original survives.
    Share { uni_key: String },
}

/// The nested original of a forwarded record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OriginalRecord {
    pub app_id: i32,
    pub type_id: i32,
    pub record_id: String,
    pub created_at: i64,
    pub owner_id: i64,
    pub owner_name: String,
    pub cur_key: Option<String>,
    pub uni_key: Option<String>,
    pub entities: Vec<Entity>,
    #[serde(default)]
    pub photos: Vec<PhotoDescriptor>,
    #[serde(default)]
    pub video: Option<VideoDescriptor>,
}
