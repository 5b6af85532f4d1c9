//! Nested playlist rewriting
//!
//! A nested entry is served under `/<namespace>/<user>/<password>/<index>/<id>`.
//! When its upstream document is fetched, relative URIs inside it are rewritten
//! under the same positional prefix, so segments and variant playlists go
//! back through the same route.

use url::Url;

use crate::services::proxyfier::path::NESTED_ID_PLACEHOLDER;

/// Upstream URL of a nested route: the track itself for the placeholder id,
/// otherwise `id` resolved relative to the track URI
pub fn resolve_nested_upstream(track_uri: &str, id: &str, query: Option<&str>) -> Result<Url, url::ParseError> {
    let base = Url::parse(track_uri)?;
    if id == NESTED_ID_PLACEHOLDER {
        return Ok(base);
    }

    let mut url = base.join(id)?;
    if let Some(query) = query.filter(|q| !q.is_empty()) {
        url.set_query(Some(query));
    }
    Ok(url)
}

/// Whether an upstream response is a playlist document to rewrite
pub fn is_playlist_document(url: &Url, content_type: Option<&str>) -> bool {
    let by_type = content_type.map_or(false, |ct| {
        let ct = ct.to_ascii_lowercase();
        ct.contains("mpegurl") || ct.contains("m3u")
    });
    by_type || url.path().ends_with(".m3u8") || url.path().ends_with(".m3u")
}

/// Rewrite relative URIs of an HLS document served as `id` under
/// `proxy_prefix` (`<origin>/<namespace>/<user>/<password>/<index>`).
///
/// Relative URIs resolve against the directory of `id`, root-relative URIs
/// against the nested route itself. Absolute URIs are left untouched.
pub fn rewrite_nested_playlist(body: &str, proxy_prefix: &str, id: &str) -> String {
    let document_prefix = match id_directory(id) {
        Some(dir) => format!("{}/{}", proxy_prefix, dir),
        None => proxy_prefix.to_string(),
    };
    let mut output = String::with_capacity(body.len());

    for line in body.lines() {
        if line.starts_with('#') {
            output.push_str(&rewrite_uri_attribute(line, proxy_prefix, &document_prefix));
        } else {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                output.push_str(line);
            } else {
                output.push_str(&proxied(trimmed, proxy_prefix, &document_prefix));
            }
        }
        output.push('\n');
    }

    output
}

/// Directory part of a nested id, `None` for the placeholder and top-level ids
fn id_directory(id: &str) -> Option<&str> {
    if id == NESTED_ID_PLACEHOLDER {
        return None;
    }
    id.rsplit_once('/')
        .map(|(dir, _)| dir)
        .filter(|dir| !dir.is_empty())
}

fn proxied(uri: &str, proxy_prefix: &str, document_prefix: &str) -> String {
    if Url::parse(uri).is_ok() {
        uri.to_string()
    } else if uri.starts_with('/') {
        // `<prefix>//path` keeps the leading slash in the id, which joins from the host root
        format!("{}/{}", proxy_prefix, uri)
    } else {
        format!("{}/{}", document_prefix, uri)
    }
}

/// Rewrite any `URI="..."` values found in an HLS tag line
fn rewrite_uri_attribute(line: &str, proxy_prefix: &str, document_prefix: &str) -> String {
    let pattern = "URI=\"";
    let mut result = String::with_capacity(line.len());
    let mut remaining = line;

    while let Some(start) = remaining.find(pattern) {
        result.push_str(&remaining[..start + pattern.len()]);
        remaining = &remaining[start + pattern.len()..];

        if let Some(end) = remaining.find('"') {
            result.push_str(&proxied(&remaining[..end], proxy_prefix, document_prefix));
            result.push('"');
            remaining = &remaining[end + 1..];
        } else {
            result.push_str(remaining);
            remaining = "";
        }
    }

    result.push_str(remaining);
    result
}
