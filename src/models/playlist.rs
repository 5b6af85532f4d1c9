use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// `key="value"` attribute of an `#EXTINF` line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
    pub value: String,
}

impl Tag {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Single upstream playlist entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    /// Upstream locator, not necessarily a well-formed URL
    pub uri: String,
    pub name: String,
    /// Duration hint, `-1` for live streams
    pub length: i64,
    /// Attributes in source order
    pub tags: Vec<Tag>,
}

impl Track {
    /// Entries pointing at another playlist document are proxied through the
    /// positional nested route instead of a leaf route.
    pub fn is_nested_playlist(&self) -> bool {
        self.uri.ends_with(".m3u8")
    }
}

/// Ordered list of tracks; position is significant
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Playlist {
    pub tracks: Vec<Track>,
}

impl Playlist {
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}

/// A track bound to its proxy path for one rewrite pass
#[derive(Debug, Clone)]
pub struct TrackConfig {
    pub index: usize,
    pub track: Arc<Track>,
    pub relative_path: String,
}
