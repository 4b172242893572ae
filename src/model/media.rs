//! Visual media normalization.
//!
//! The content service describes media three different ways depending on
//! which endpoint produced it: inline photo descriptors (which may embed a
//! video), standalone video descriptors, and album-listing entries from the
//! slow album API. [`VisualMedia`] is the single canonical form; each
//! constructor is a pure mapping with no side effects.

use serde::{Deserialize, Serialize};
use url::Url;

/// Canonical media item attached to a content record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VisualMedia {
    pub height: u32,
    pub width: u32,
    /// URL of the full-size photo, or of the video stream for videos.
    pub raw: String,
    /// Smaller preview, when the source supplies one.
    pub thumbnail: Option<String>,
    pub is_video: bool,
}

/// Photo as described inline in a feed page or detail response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoDescriptor {
    pub height: u32,
    pub width: u32,
    /// Largest rendition.
    pub url: String,
    /// Smallest rendition.
    pub thumb_url: Option<String>,
    /// Some photo slots actually carry a video.
    #[serde(default)]
    pub video: Option<VideoDescriptor>,
}

impl PhotoDescriptor {
    /// Whether the raw URL is a usable http(s) URL. Detail responses
    /// occasionally carry placeholder or scheme-less URLs; those records
    /// fall back to the markup path instead.
    pub fn valid_url(&self) -> bool {
        matches!(Url::parse(&self.url), Ok(u) if u.scheme() == "http" || u.scheme() == "https")
    }
}

/// Video as described by the service: a cover image plus a stream URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoDescriptor {
    pub cover_height: u32,
    pub cover_width: u32,
    pub cover_url: String,
    pub video_url: String,
}

/// One entry of an album listing, as returned by the album media API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlbumEntry {
    pub height: u32,
    pub width: u32,
    pub url: String,
    #[serde(default)]
    pub thumb_url: Option<String>,
    /// Present when the entry is a video rather than a photo.
    #[serde(default)]
    pub video_url: Option<String>,
}

/// Opaque key identifying an album to the content service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AlbumRef {
    pub album_id: String,
    pub owner_id: i64,
}

impl VisualMedia {
    /// Normalize an inline photo descriptor. A descriptor carrying a video
    /// yields the video form.
    pub fn from_photo(pic: &PhotoDescriptor) -> Self {
        if let Some(video) = &pic.video {
            return Self::from_video(video);
        }
        Self {
            height: pic.height,
            width: pic.width,
            raw: pic.url.clone(),
            thumbnail: pic.thumb_url.clone(),
            is_video: false,
        }
    }

    /// Normalize a video descriptor. Dimensions come from the cover image,
    /// which is also kept as the thumbnail.
    pub fn from_video(video: &VideoDescriptor) -> Self {
        Self {
            height: video.cover_height,
            width: video.cover_width,
            raw: video.video_url.clone(),
            thumbnail: Some(video.cover_url.clone()),
            is_video: true,
        }
    }

    /// Normalize an album listing entry.
    pub fn from_album_entry(entry: &AlbumEntry) -> Self {
        match &entry.video_url {
            Some(video_url) => Self {
                height: entry.height,
                width: entry.width,
                raw: video_url.clone(),
                thumbnail: entry.thumb_url.clone().or_else(|| Some(entry.url.clone())),
                is_video: true,
            },
            None => Self {
                height: entry.height,
                width: entry.width,
                raw: entry.url.clone(),
                thumbnail: entry.thumb_url.clone(),
                is_video: false,
            },
        }
    }
}
