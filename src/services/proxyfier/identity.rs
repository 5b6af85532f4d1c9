//! Stable per-track identifiers
//!
//! Each hashing method is an ordered list of pure candidate functions; the
//! first one producing an identifier wins.

use md5::{Digest, Md5};
use std::convert::Infallible;
use std::str::FromStr;
use url::Url;

use crate::models::Track;

type Candidate = fn(&Track) -> Option<String>;

const URL_CANDIDATES: &[Candidate] = &[by_url];
const ID_CANDIDATES: &[Candidate] = &[by_id, by_url];
const TAGS_CANDIDATES: &[Candidate] = &[by_tags, by_url];
const SMART_CANDIDATES: &[Candidate] = &[by_id, by_tags, by_url];

/// Configured identifier derivation for leaf tracks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HashMethod {
    /// Hash of the raw upstream URI
    Url,
    /// Hash of the `id` query parameter, else `Url`
    Id,
    /// Hash of the name-sorted tags, else `Url`
    Tags,
    /// `Id`, then `Tags`, then `Url`
    Smart,
    /// Positional identifiers
    #[default]
    None,
}

impl HashMethod {
    fn candidates(self) -> &'static [Candidate] {
        match self {
            HashMethod::Url => URL_CANDIDATES,
            HashMethod::Id => ID_CANDIDATES,
            HashMethod::Tags => TAGS_CANDIDATES,
            HashMethod::Smart => SMART_CANDIDATES,
            HashMethod::None => &[],
        }
    }

    /// Candidate identifier for `track`, `None` when the method is unset
    pub fn resolve(self, track: &Track) -> Option<String> {
        self.candidates().iter().find_map(|candidate| candidate(track))
    }
}

impl FromStr for HashMethod {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim() {
            "url" => HashMethod::Url,
            "id" => HashMethod::Id,
            "tags" => HashMethod::Tags,
            "smart" => HashMethod::Smart,
            _ => HashMethod::None,
        })
    }
}

impl std::fmt::Display for HashMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HashMethod::Url => write!(f, "url"),
            HashMethod::Id => write!(f, "id"),
            HashMethod::Tags => write!(f, "tags"),
            HashMethod::Smart => write!(f, "smart"),
            HashMethod::None => write!(f, "none"),
        }
    }
}

/// Lowercase hex MD5 of `s`
pub fn hex_hash(s: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(s.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn by_url(track: &Track) -> Option<String> {
    Some(hex_hash(&track.uri))
}

fn by_id(track: &Track) -> Option<String> {
    let url = Url::parse(&track.uri).ok()?;
    let id = url
        .query_pairs()
        .find(|(key, _)| key == "id")
        .map(|(_, value)| value.into_owned())?;

    if id.is_empty() {
        None
    } else {
        Some(hex_hash(&id))
    }
}

fn by_tags(track: &Track) -> Option<String> {
    if track.tags.is_empty() {
        return None;
    }

    let mut tags: Vec<_> = track.tags.iter().collect();
    tags.sort_by(|a, b| a.name.cmp(&b.name));

    let joined: String = tags
        .iter()
        .map(|tag| format!("{}={},", tag.name, tag.value))
        .collect();

    Some(hex_hash(&joined))
}
