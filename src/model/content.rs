//! Canonical content records: the engine's output type.

use crate::model::media::VisualMedia;
use crate::model::record::{ForwardSource, OriginalRecord, RawRecord, RecordDetail};
use crate::service::MarkupInfo;
use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};

// ============================================================================
// Batch Id
// ============================================================================

/// Correlates events to the `get_feeds_by_*` call that produced them.
///
/// Minted once per logical fetch invocation; increments and wraps modulo
/// [`BatchId::CEILING`]. Correlation only, never a uniqueness guarantee for
/// records (use the record's own identity for that).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BatchId(pub u32);

impl BatchId {
    /// Wrap point for the batch counter.
    pub const CEILING: u32 = 1 << 30;

    /// The id following `self`, wrapping at [`Self::CEILING`].
    pub fn next(self) -> Self {
        BatchId((self.0 + 1) % Self::CEILING)
    }
}

impl std::fmt::Display for BatchId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Entities
// ============================================================================

/// One typed span of record text, in display order.
///
/// `Emoji` spans exist only between markup parsing and tag translation;
/// records emitted as "ready" contain none (the translator resolves them to
/// `Text`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Entity {
    Text { text: String },
    Mention { owner_id: i64, name: String },
    Link { text: String, url: String },
    Emoji { id: u64 },
}

impl Entity {
    pub fn text(text: impl Into<String>) -> Self {
        Entity::Text { text: text.into() }
    }
}

// ============================================================================
// Content Record
// ============================================================================

/// What a record forwards, after normalization.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Forward {
    /// The original record, fully normalized.
    Record(Box<ContentRecord>),
    /// An opaque reference string when only the key survives.
    Reference(String),
}

/// The engine's canonical output: a raw record with its content resolved.
///
/// Two records with the same owner, timestamp, forward and media are
/// duplicates: equality and hashing are defined over exactly those fields,
/// so dedup works across batches and across enrichment paths.
/// [`ContentRecord::ordering_key`] gives the total order (creation time,
/// then owner id) for streaming consumers; emission order is not stable, so
/// sort on it when order matters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentRecord {
    pub app_id: i32,
    pub type_id: i32,
    pub record_id: String,
    pub created_at: i64,
    pub owner_id: i64,
    pub owner_name: String,
    /// Identifier of this record itself. May be a URL.
    pub cur_key: Option<String>,
    /// Identifier of the original content behind this record.
    pub uni_key: Option<String>,
    pub is_liked: bool,
    pub entities: Vec<Entity>,
    pub forward: Option<Forward>,
    pub media: Vec<VisualMedia>,
    pub batch: BatchId,
}

impl ContentRecord {
    /// Identity-only skeleton from a raw record; content fields start empty.
    pub fn from_raw(raw: &RawRecord, batch: BatchId) -> Self {
        let (cur_key, uni_key) = match raw {
            RawRecord::Web(_) => (None, None),
            RawRecord::H5(r) => (r.cur_key.clone(), r.uni_key.clone()),
        };
        Self {
            app_id: raw.app_id(),
            type_id: raw.type_id(),
            record_id: raw.record_id().to_string(),
            created_at: raw.created_at(),
            owner_id: raw.owner_id(),
            owner_name: raw.owner_name().to_string(),
            cur_key,
            uni_key,
            is_liked: raw.is_liked(),
            entities: Vec::new(),
            forward: None,
            media: Vec::new(),
            batch,
        }
    }

    /// Adopt the identity pair extracted from markup.
    pub fn apply_info(&mut self, info: &MarkupInfo) {
        self.cur_key = info.cur_key.clone();
        self.uni_key = info.uni_key.clone();
    }

    /// Fill content from a resolved detail: entities, forward, media.
    /// A video always leads the media list.
    pub fn set_detail(&mut self, detail: &RecordDetail) {
        self.entities = detail.entities.clone();

        self.forward = detail.forward.as_ref().map(|f| match f {
            ForwardSource::Original(org) => Forward::Record(Box::new(Self::from_original(org))),
            ForwardSource::Share { uni_key } => Forward::Reference(uni_key.clone()),
        });

        self.media = detail.photos.iter().map(VisualMedia::from_photo).collect();
        if let Some(video) = &detail.video {
            self.media.insert(0, VisualMedia::from_video(video));
        }
    }

    fn from_original(org: &OriginalRecord) -> ContentRecord {
        let mut media: Vec<VisualMedia> = org.photos.iter().map(VisualMedia::from_photo).collect();
        if let Some(video) = &org.video {
            media.insert(0, VisualMedia::from_video(video));
        }
        ContentRecord {
            app_id: org.app_id,
            type_id: org.type_id,
            record_id: org.record_id.clone(),
            created_at: org.created_at,
            owner_id: org.owner_id,
            owner_name: org.owner_name.clone(),
            cur_key: org.cur_key.clone(),
            uni_key: org.uni_key.clone(),
            is_liked: false,
            entities: org.entities.clone(),
            forward: None,
            media,
            batch: BatchId(0),
        }
    }

    /// Sort key for streaming/dedup consumers: creation time, then owner.
    pub fn ordering_key(&self) -> (i64, i64) {
        (self.created_at, self.owner_id)
    }
}

// Duplicate detection: owner + timestamp + content identity. Batch id,
// entities and the like are deliberately excluded: the same record fetched
// in two batches, or enriched through two different paths, must compare
// equal.
impl PartialEq for ContentRecord {
    fn eq(&self, other: &Self) -> bool {
        self.owner_id == other.owner_id
            && self.created_at == other.created_at
            && self.forward == other.forward
            && self.media.len() == other.media.len()
            && self
                .media
                .iter()
                .zip(&other.media)
                .all(|(a, b)| a.raw == b.raw)
    }
}

impl Eq for ContentRecord {}

impl Hash for ContentRecord {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.owner_id.hash(state);
        self.created_at.hash(state);
        self.forward.hash(state);
        for m in &self.media {
            m.raw.hash(state);
        }
    }
}
