use url::Url;

use super::ProxyIdentity;
use crate::models::Track;

/// Placeholder segment of nested playlist routes
pub const NESTED_ID_PLACEHOLDER: &str = ":id";

/// Used when an upstream URI has no usable last segment
const DEFAULT_BASENAME: &str = "stream";

/// Relative proxy path for the track at `index`
///
/// Leaf tracks: `/<namespace>/<user>/<password>/<identifier>/<basename>`.
/// Nested playlists: `/<namespace>/<user>/<password>/<index>/:id`.
pub fn build_path(track: &Track, index: usize, identifier: &str, identity: &ProxyIdentity) -> String {
    if track.is_nested_playlist() {
        return nested_path(index, identity);
    }

    format!(
        "{}/{}/{}",
        identity.route_prefix(),
        identifier,
        basename(&track.uri)
    )
}

/// `/<namespace>/<user>/<password>/<index>/:id`
pub fn nested_path(index: usize, identity: &ProxyIdentity) -> String {
    format!(
        "{}/{}",
        nested_prefix(index, identity),
        NESTED_ID_PLACEHOLDER
    )
}

/// `/<namespace>/<user>/<password>/<index>`
pub fn nested_prefix(index: usize, identity: &ProxyIdentity) -> String {
    format!("{}/{}", identity.route_prefix(), index)
}

/// Last path segment of the parsed URI, or of the raw string when it does not
/// parse
fn basename(uri: &str) -> String {
    let segment = match Url::parse(uri) {
        Ok(url) => last_segment(url.path()).to_string(),
        Err(_) => last_segment(uri).to_string(),
    };

    if segment.is_empty() {
        DEFAULT_BASENAME.to_string()
    } else {
        segment
    }
}

fn last_segment(path: &str) -> &str {
    path.trim_end_matches('/').rsplit('/').next().unwrap_or_default()
}
