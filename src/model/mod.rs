//! Data model: raw records as fetched, canonical records as emitted, and
//! the media normalization between them.

mod content;
mod media;
mod record;

pub use content::{BatchId, ContentRecord, Entity, Forward};
pub use media::{AlbumEntry, AlbumRef, PhotoDescriptor, VideoDescriptor, VisualMedia};
pub use record::{ForwardSource, H5Record, OriginalRecord, RawRecord, RecordDetail, WebRecord};
