//! Playlist rewriting and route identity
//!
//! One rewrite pass turns an upstream playlist into:
//! - a proxied playlist whose every URL points at this proxy, and
//! - a [`RouteTable`] mapping each proxy path back to its upstream track.
//!
//! The pass is a strictly sequential fold over the ordered track list; the
//! identifier set threaded through it is what keeps proxy paths unique.
//!
//! ```text
//! track ──► HashMethod::resolve ──► IdentifierSet::assign ──► build_path
//!                                                              │
//!        RouteTable::build ◄── marshal (rewrite_url per track) ◄┘
//! ```

pub mod collision;
pub mod identity;
pub mod marshal;
pub mod path;
pub mod rewrite;
pub mod routes;

use std::borrow::Cow;
use std::sync::Arc;
use thiserror::Error;

use crate::models::{Playlist, TrackConfig};
use crate::services::xtream::XtreamCredentials;

pub use collision::IdentifierSet;
pub use identity::HashMethod;
pub use marshal::{marshal, persist_playlist, MarshalMode, MarshalledPlaylist};
pub use path::build_path;
pub use rewrite::{rewrite_url, PathSource};
pub use routes::{RouteTable, RouteTarget};

/// Errors raised while rewriting a playlist
#[derive(Debug, Error)]
pub enum RewriteError {
    /// Upstream URI of a single track cannot be parsed; the track is dropped
    #[error("malformed upstream URL {uri:?}: {source}")]
    MalformedUpstreamUrl {
        uri: String,
        #[source]
        source: url::ParseError,
    },
    /// A proxy URL we built does not parse; aborts the pass
    #[error("built an invalid proxy URL {url:?}: {source}")]
    InvalidProxyUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
}

impl RewriteError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, RewriteError::InvalidProxyUrl { .. })
    }
}

/// How proxy paths and URLs of this instance are shaped
#[derive(Debug, Clone)]
pub struct ProxyIdentity {
    pub user: String,
    pub password: String,
    /// Advertised host
    pub hostname: String,
    pub advertised_port: u16,
    /// TLS is terminated in front of the proxy
    pub https: bool,
    /// Custom URL prefix without surrounding slashes, may be empty
    pub custom_endpoint: String,
    /// Anti-collision token scoping this instance's routes
    pub namespace: String,
    pub hash_method: HashMethod,
    /// Upstream Xtream account, used by passthrough rewriting
    pub upstream: Option<XtreamCredentials>,
}

impl ProxyIdentity {
    pub fn scheme(&self) -> &'static str {
        if self.https {
            "https"
        } else {
            "http"
        }
    }

    /// `/<custom>` or empty
    pub fn custom_prefix(&self) -> String {
        if self.custom_endpoint.is_empty() {
            String::new()
        } else {
            format!("/{}", self.custom_endpoint)
        }
    }

    /// `scheme://host:port[/custom]`
    pub fn origin(&self) -> String {
        format!(
            "{}://{}:{}{}",
            self.scheme(),
            self.hostname,
            self.advertised_port,
            self.custom_prefix()
        )
    }

    pub fn escaped_user(&self) -> Cow<'_, str> {
        urlencoding::encode(&self.user)
    }

    pub fn escaped_password(&self) -> Cow<'_, str> {
        urlencoding::encode(&self.password)
    }

    pub fn escaped_namespace(&self) -> Cow<'_, str> {
        urlencoding::encode(&self.namespace)
    }

    /// `/<namespace>/<user>/<password>`, each segment escaped
    pub fn route_prefix(&self) -> String {
        format!(
            "/{}/{}/{}",
            self.escaped_namespace(),
            self.escaped_user(),
            self.escaped_password()
        )
    }
}

/// Result of one rewrite pass
#[derive(Debug)]
pub struct RewriteOutcome {
    /// Only the tracks that were rewritten, in order
    pub playlist: Playlist,
    pub track_configs: Vec<TrackConfig>,
    /// Rendered proxy playlist
    pub content: String,
    pub dropped: usize,
}

/// Bind every track to a unique proxy path, in playlist order
pub fn compute_track_configs(playlist: &Playlist, identity: &ProxyIdentity) -> Vec<TrackConfig> {
    let mut issued = IdentifierSet::new();

    playlist
        .tracks
        .iter()
        .enumerate()
        .map(|(index, track)| {
            let relative_path = if track.is_nested_playlist() {
                path::nested_path(index, identity)
            } else {
                let candidate = identity.hash_method.resolve(track);
                let identifier = issued.assign(candidate, index, track);
                build_path(track, index, &identifier, identity)
            };

            TrackConfig {
                index,
                track: Arc::new(track.clone()),
                relative_path,
            }
        })
        .collect()
}

/// Run a full rewrite pass over `playlist`
pub fn run_pass(playlist: &Playlist, identity: &ProxyIdentity) -> Result<RewriteOutcome, RewriteError> {
    let configs = compute_track_configs(playlist, identity);
    let MarshalledPlaylist {
        content,
        kept,
        dropped,
    } = marshal(configs, identity, MarshalMode::Proxied)?;

    if dropped > 0 {
        tracing::info!(
            "Rewrite pass dropped {} of {} tracks",
            dropped,
            playlist.len()
        );
    }

    let playlist = Playlist {
        tracks: kept.iter().map(|config| (*config.track).clone()).collect(),
    };

    Ok(RewriteOutcome {
        playlist,
        track_configs: kept,
        content,
        dropped,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::{Tag, Track};
    use std::collections::HashSet;

    pub(crate) fn identity() -> ProxyIdentity {
        ProxyIdentity {
            user: "user".to_string(),
            password: "pass".to_string(),
            hostname: "proxy.local".to_string(),
            advertised_port: 8080,
            https: false,
            custom_endpoint: String::new(),
            namespace: "ns".to_string(),
            hash_method: HashMethod::None,
            upstream: None,
        }
    }

    fn track(uri: &str, name: &str) -> Track {
        Track {
            uri: uri.to_string(),
            name: name.to_string(),
            length: -1,
            tags: vec![],
        }
    }

    fn identity_with(method: HashMethod) -> ProxyIdentity {
        ProxyIdentity {
            hash_method: method,
            ..identity()
        }
    }

    #[test]
    fn test_origin() {
        let mut id = identity();
        assert_eq!(id.origin(), "http://proxy.local:8080");

        id.https = true;
        id.custom_endpoint = "tv".to_string();
        assert_eq!(id.origin(), "https://proxy.local:8080/tv");
    }

    #[test]
    fn test_positional_identifiers() {
        let playlist = Playlist {
            tracks: vec![
                track("http://up.example/a.ts", "A"),
                track("http://up.example/b.ts", "B"),
            ],
        };

        let configs = compute_track_configs(&playlist, &identity());
        assert_eq!(configs[0].relative_path, "/ns/user/pass/0/a.ts");
        assert_eq!(configs[1].relative_path, "/ns/user/pass/1/b.ts");
    }

    #[test]
    fn test_id_scenario() {
        let playlist = Playlist {
            tracks: vec![Track {
                uri: "http://up.example/x.ts?id=7".to_string(),
                name: "Ch".to_string(),
                length: -1,
                tags: vec![Tag::new("tvg-id", "7")],
            }],
        };

        let outcome = run_pass(&playlist, &identity_with(HashMethod::Id)).unwrap();
        let expected = format!("/{}/x.ts", identity::hex_hash("7"));

        assert!(outcome.track_configs[0].relative_path.ends_with(&expected));
        assert!(outcome.content.contains(&format!("http://proxy.local:8080/ns/user/pass{}", expected)));
    }

    #[test]
    fn test_identical_uris_stay_unique() {
        let playlist = Playlist {
            tracks: vec![
                track("http://up.example/a.ts", "First"),
                track("http://up.example/a.ts", "Second"),
            ],
        };

        let configs = compute_track_configs(&playlist, &identity_with(HashMethod::Url));
        assert_ne!(configs[0].relative_path, configs[1].relative_path);
    }

    #[test]
    fn test_nested_playlist_path() {
        let playlist = Playlist {
            tracks: vec![
                track("http://up.example/a.ts", "Leaf"),
                track("http://up.example/hls/master.m3u8", "Nested"),
            ],
        };

        for method in [HashMethod::None, HashMethod::Url, HashMethod::Smart] {
            let configs = compute_track_configs(&playlist, &identity_with(method));
            assert_eq!(configs[1].relative_path, "/ns/user/pass/1/:id");
        }
    }

    #[test]
    fn test_paths_unique_across_methods() {
        let tracks: Vec<Track> = (0..50)
            .map(|i| {
                let mut t = track(&format!("http://up.example/live/{}.ts?id={}", i % 7, i % 5), &format!("Ch {}", i));
                if i % 3 == 0 {
                    t.tags.push(Tag::new("tvg-id", format!("{}", i % 4)));
                }
                t
            })
            .collect();
        let playlist = Playlist { tracks };

        for method in [
            HashMethod::None,
            HashMethod::Url,
            HashMethod::Id,
            HashMethod::Tags,
            HashMethod::Smart,
        ] {
            let outcome = run_pass(&playlist, &identity_with(method)).unwrap();
            let unique: HashSet<_> = outcome
                .track_configs
                .iter()
                .map(|c| c.relative_path.as_str())
                .collect();
            assert_eq!(unique.len(), 50, "duplicate paths with {}", method);
        }
    }

    #[test]
    fn test_malformed_track_dropped_from_pass() {
        let playlist = Playlist {
            tracks: vec![
                track("http://up.example/a.ts", "Good"),
                track("::not a url", "Broken"),
            ],
        };

        let outcome = run_pass(&playlist, &identity_with(HashMethod::Url)).unwrap();

        assert_eq!(outcome.dropped, 1);
        assert_eq!(outcome.playlist.len(), 1);
        assert_eq!(outcome.playlist.tracks[0].name, "Good");
        assert!(!outcome.content.contains("Broken"));
    }

    #[test]
    fn test_namespace_with_reserved_characters_still_routes() {
        let mut id = identity();
        id.namespace = "my \"ns\"".to_string();

        let playlist = Playlist {
            tracks: vec![track("http://up.example/a.ts", "A")],
        };
        let outcome = run_pass(&playlist, &id).unwrap();
        let table = RouteTable::build(
            "iptv.m3u",
            std::path::PathBuf::from("/tmp/x.m3u"),
            &outcome.track_configs,
            &id,
        );

        let line = outcome
            .content
            .lines()
            .find(|line| line.starts_with("http://"))
            .unwrap();
        let requested = url::Url::parse(line).unwrap();

        assert_eq!(requested.path(), "/my%20%22ns%22/user/pass/0/a.ts");
        assert!(matches!(
            table.resolve(requested.path()),
            Some(RouteTarget::Track(_))
        ));
    }

    #[test]
    fn test_route_table_from_pass() {
        let playlist = Playlist {
            tracks: vec![
                track("http://up.example/a.ts", "Leaf"),
                track("::not a url", "Broken"),
                track("http://up.example/hls/master.m3u8", "Nested"),
            ],
        };

        let outcome = run_pass(&playlist, &identity()).unwrap();
        let table = RouteTable::build(
            "iptv.m3u",
            std::path::PathBuf::from("/tmp/x.m3u"),
            &outcome.track_configs,
            &identity(),
        );

        assert_eq!(table.len(), 2);
        assert!(matches!(
            table.resolve("/ns/user/pass/0/a.ts"),
            Some(RouteTarget::Track(_))
        ));
        assert!(table.resolve("/ns/user/pass/1/a").is_none());
        assert!(matches!(
            table.resolve("/ns/user/pass/2/:id"),
            Some(RouteTarget::Nested { index: 2, .. })
        ));
    }
}
