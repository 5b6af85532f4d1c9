use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::path::nested_prefix;
use super::ProxyIdentity;
use crate::models::{Track, TrackConfig};

/// What an incoming proxy path maps to
#[derive(Debug, PartialEq)]
pub enum RouteTarget<'a> {
    /// The proxied playlist file itself
    Playlist(&'a Path),
    /// A leaf track streamed as-is
    Track(&'a Track),
    /// A nested playlist; `id` is the remainder after the positional prefix
    Nested {
        index: usize,
        track: &'a Track,
        id: &'a str,
    },
}

/// Proxy path bindings produced by one rewrite pass
#[derive(Debug, Default)]
pub struct RouteTable {
    playlist_route: String,
    playlist_file: PathBuf,
    leaves: HashMap<String, Arc<Track>>,
    /// Keyed by `/<namespace>/<user>/<password>/<index>`
    nested: HashMap<String, (usize, Arc<Track>)>,
}

impl RouteTable {
    /// Build bindings for every successfully rewritten track plus the
    /// playlist endpoint (`/<playlist_name>`)
    pub fn build(
        playlist_name: &str,
        playlist_file: PathBuf,
        configs: &[TrackConfig],
        identity: &ProxyIdentity,
    ) -> Self {
        let mut table = Self::playlist_only(playlist_name, playlist_file);

        for config in configs {
            if config.track.is_nested_playlist() {
                table.nested.insert(
                    nested_prefix(config.index, identity),
                    (config.index, Arc::clone(&config.track)),
                );
            } else {
                table
                    .leaves
                    .insert(config.relative_path.clone(), Arc::clone(&config.track));
            }
        }

        table
    }

    /// Table binding only the playlist endpoint
    pub fn playlist_only(playlist_name: &str, playlist_file: PathBuf) -> Self {
        Self {
            playlist_route: format!("/{}", playlist_name.trim_start_matches('/')),
            playlist_file,
            ..Default::default()
        }
    }

    pub fn playlist_route(&self) -> &str {
        &self.playlist_route
    }

    pub fn playlist_file(&self) -> &Path {
        &self.playlist_file
    }

    /// Number of track bindings, excluding the playlist endpoint
    pub fn len(&self) -> usize {
        self.leaves.len() + self.nested.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Map a request path (custom prefix already stripped) to its target
    pub fn resolve<'a>(&'a self, path: &'a str) -> Option<RouteTarget<'a>> {
        if path == self.playlist_route {
            return Some(RouteTarget::Playlist(&self.playlist_file));
        }

        if let Some(track) = self.leaves.get(path) {
            return Some(RouteTarget::Track(track));
        }

        // "" / namespace / user / password / index / rest
        let mut parts = path.splitn(6, '/');
        let prefix_len: usize = parts.by_ref().take(5).map(|p| p.len() + 1).sum();
        let id = parts.next().filter(|rest| !rest.is_empty())?;
        let prefix = &path[..prefix_len - 1];

        self.nested
            .get(prefix)
            .map(|(index, track)| RouteTarget::Nested {
                index: *index,
                track,
                id,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::proxyfier::tests::identity;

    fn config(index: usize, uri: &str, relative_path: &str) -> TrackConfig {
        TrackConfig {
            index,
            track: Arc::new(Track {
                uri: uri.to_string(),
                name: format!("Ch {}", index),
                length: -1,
                tags: vec![],
            }),
            relative_path: relative_path.to_string(),
        }
    }

    fn table() -> RouteTable {
        let configs = vec![
            config(0, "http://up.example/a.ts", "/ns/user/pass/abc/a.ts"),
            config(1, "http://up.example/hls/index.m3u8", "/ns/user/pass/1/:id"),
        ];
        RouteTable::build("iptv.m3u", PathBuf::from("/tmp/p.m3u"), &configs, &identity())
    }

    #[test]
    fn test_playlist_route() {
        let table = table();
        assert_eq!(
            table.resolve("/iptv.m3u"),
            Some(RouteTarget::Playlist(Path::new("/tmp/p.m3u")))
        );
    }

    #[test]
    fn test_leaf_route() {
        let table = table();
        match table.resolve("/ns/user/pass/abc/a.ts") {
            Some(RouteTarget::Track(track)) => assert_eq!(track.uri, "http://up.example/a.ts"),
            other => panic!("unexpected target: {:?}", other),
        }
    }

    #[test]
    fn test_nested_route() {
        let table = table();

        match table.resolve("/ns/user/pass/1/:id") {
            Some(RouteTarget::Nested { index, id, track }) => {
                assert_eq!(index, 1);
                assert_eq!(id, ":id");
                assert_eq!(track.uri, "http://up.example/hls/index.m3u8");
            }
            other => panic!("unexpected target: {:?}", other),
        }

        match table.resolve("/ns/user/pass/1/chunks/seg-001.ts") {
            Some(RouteTarget::Nested { id, .. }) => assert_eq!(id, "chunks/seg-001.ts"),
            other => panic!("unexpected target: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_routes() {
        let table = table();

        assert!(table.resolve("/").is_none());
        assert!(table.resolve("/ns/user/pass/1").is_none());
        assert!(table.resolve("/ns/user/pass/1/").is_none());
        assert!(table.resolve("/ns/user/wrong/1/:id").is_none());
        assert!(table.resolve("/ns/user/pass/abc/other.ts").is_none());
        assert_eq!(table.len(), 2);
    }
}
