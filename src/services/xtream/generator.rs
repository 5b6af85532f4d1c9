//! Playlist generation from the Xtream Player API
//!
//! Tracks carry upstream stream URLs; the marshaller's passthrough mode then
//! swaps host and credentials for the proxy's.

use std::collections::HashMap;

use super::client::{XtreamClient, XtreamError};
use super::types::{XtreamCategory, XtreamCredentials, XtreamLiveStream, XtreamVodStream};
use crate::models::{Playlist, Tag, Track};

/// Extension used for live streams
const LIVE_EXTENSION: &str = "ts";
/// Fallback for VOD entries without `container_extension`
const DEFAULT_VOD_EXTENSION: &str = "mp4";

/// Upstream live and VOD catalogue
#[derive(Debug, Default)]
pub struct XtreamCatalogue {
    pub live_categories: Vec<XtreamCategory>,
    pub live_streams: Vec<XtreamLiveStream>,
    pub vod_categories: Vec<XtreamCategory>,
    pub vod_streams: Vec<XtreamVodStream>,
}

impl XtreamCatalogue {
    /// Fetch live and VOD categories and streams
    pub async fn fetch(client: &XtreamClient) -> Result<Self, XtreamError> {
        let (live_categories, live_streams, vod_categories, vod_streams) = tokio::try_join!(
            client.get_live_categories(),
            client.get_live_streams(),
            client.get_vod_categories(),
            client.get_vod_streams(),
        )?;

        Ok(Self {
            live_categories,
            live_streams,
            vod_categories,
            vod_streams,
        })
    }

    /// Live streams first, then VOD, in upstream order
    pub fn to_playlist(&self, creds: &XtreamCredentials) -> Playlist {
        let live_groups = category_names(&self.live_categories);
        let vod_groups = category_names(&self.vod_categories);

        let live = self.live_streams.iter().map(|stream| {
            let id = format!("{}.{}", stream.stream_id, LIVE_EXTENSION);
            track(
                creds.stream_url("live", &id),
                &stream.name,
                stream.epg_channel_id.as_deref(),
                stream.stream_icon.as_deref(),
                group(&live_groups, stream.category_id.as_deref()),
            )
        });

        let vod = self.vod_streams.iter().map(|stream| {
            let extension = stream
                .container_extension
                .as_deref()
                .filter(|ext| !ext.is_empty())
                .unwrap_or(DEFAULT_VOD_EXTENSION);
            let id = format!("{}.{}", stream.stream_id, extension);
            track(
                creds.stream_url("movie", &id),
                &stream.name,
                None,
                stream.stream_icon.as_deref(),
                group(&vod_groups, stream.category_id.as_deref()),
            )
        });

        Playlist {
            tracks: live.chain(vod).collect(),
        }
    }
}

fn category_names(categories: &[XtreamCategory]) -> HashMap<&str, &str> {
    categories
        .iter()
        .map(|c| (c.category_id.as_str(), c.category_name.as_str()))
        .collect()
}

fn group<'a>(names: &HashMap<&str, &'a str>, category_id: Option<&str>) -> Option<&'a str> {
    category_id.and_then(|id| names.get(id).copied())
}

fn track(
    uri: String,
    name: &str,
    tvg_id: Option<&str>,
    logo: Option<&str>,
    group: Option<&str>,
) -> Track {
    let mut tags = Vec::new();
    if let Some(id) = tvg_id.filter(|v| !v.is_empty()) {
        tags.push(Tag::new("tvg-id", id));
    }
    tags.push(Tag::new("tvg-name", name));
    if let Some(logo) = logo.filter(|v| !v.is_empty()) {
        tags.push(Tag::new("tvg-logo", logo));
    }
    if let Some(group) = group {
        tags.push(Tag::new("group-title", group));
    }

    Track {
        uri,
        name: name.to_string(),
        length: -1,
        tags,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::proxyfier::{compute_track_configs, marshal, tests::identity, MarshalMode};

    fn catalogue() -> XtreamCatalogue {
        XtreamCatalogue {
            live_categories: serde_json::from_str(r#"[{"category_id": "1", "category_name": "News"}]"#)
                .unwrap(),
            live_streams: serde_json::from_str(
                r#"[{"name": "CNN", "stream_id": 101, "epg_channel_id": "cnn.us", "stream_icon": "http://logo/cnn.png", "category_id": "1"}]"#,
            )
            .unwrap(),
            vod_categories: serde_json::from_str(r#"[{"category_id": 5, "category_name": "Films"}]"#)
                .unwrap(),
            vod_streams: serde_json::from_str(
                r#"[
                    {"name": "Movie", "stream_id": "202", "category_id": "5", "container_extension": "mkv"},
                    {"name": "Other", "stream_id": 203, "category_id": "9"}
                ]"#,
            )
            .unwrap(),
        }
    }

    fn creds() -> XtreamCredentials {
        XtreamCredentials {
            server: "http://up.example:8080".to_string(),
            username: "xu".to_string(),
            password: "xp".to_string(),
        }
    }

    #[test]
    fn test_to_playlist() {
        let playlist = catalogue().to_playlist(&creds());

        assert_eq!(playlist.len(), 3);
        assert_eq!(playlist.tracks[0].uri, "http://up.example:8080/live/xu/xp/101.ts");
        assert_eq!(
            playlist.tracks[0].tags,
            vec![
                Tag::new("tvg-id", "cnn.us"),
                Tag::new("tvg-name", "CNN"),
                Tag::new("tvg-logo", "http://logo/cnn.png"),
                Tag::new("group-title", "News"),
            ]
        );
        assert_eq!(playlist.tracks[1].uri, "http://up.example:8080/movie/xu/xp/202.mkv");
        assert!(playlist.tracks[1].tags.contains(&Tag::new("group-title", "Films")));

        // unknown category, default extension
        assert_eq!(playlist.tracks[2].uri, "http://up.example:8080/movie/xu/xp/203.mp4");
        assert!(!playlist.tracks[2].tags.iter().any(|t| t.name == "group-title"));
    }

    #[test]
    fn test_generated_playlist_hides_upstream_account() {
        let mut id = identity();
        id.upstream = Some(creds());

        let playlist = catalogue().to_playlist(&creds());
        let rendered = marshal(compute_track_configs(&playlist, &id), &id, MarshalMode::Xtream).unwrap();

        assert!(rendered.content.contains("http://proxy.local:8080/live/user/pass/101.ts"));
        assert!(rendered.content.contains("http://proxy.local:8080/movie/user/pass/202.mkv"));
        assert!(!rendered.content.contains("xu"));
        assert!(!rendered.content.contains("up.example"));
    }
}
