//! Playlist and track routes
//!
//! Everything under the custom prefix that is not an explicit route lands
//! here and is resolved against the live route table.

use axum::{
    extract::{OriginalUri, State},
    http::{HeaderMap, StatusCode},
};
use std::path::Path;
use std::sync::Arc;

use super::proxy::{self, api_error, ProxyResult};
use crate::models::Track;
use crate::services::hls::{is_playlist_document, resolve_nested_upstream, rewrite_nested_playlist};
use crate::services::proxyfier::{path::nested_prefix, RouteTarget};
use crate::AppState;

const PLAYLIST_CONTENT_TYPE: &str = "audio/x-mpegurl";
const HLS_CONTENT_TYPE: &str = "application/vnd.apple.mpegurl";

/// Fallback handler resolving proxy paths through the route table
pub async fn dispatch(
    State(state): State<Arc<AppState>>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
) -> ProxyResult {
    let prefix = state.identity.custom_prefix();
    let Some(path) = uri.path().strip_prefix(prefix.as_str()) else {
        return Err(api_error(StatusCode::NOT_FOUND, "not found"));
    };

    // Clone the Arc so a concurrent refresh never blocks on this request
    let snapshot = Arc::clone(&*state.snapshot.read().await);

    match snapshot.routes.resolve(path) {
        Some(RouteTarget::Playlist(file)) => {
            proxy::require_auth(uri.query(), &state.identity)?;
            serve_playlist_file(file).await
        }
        Some(RouteTarget::Track(track)) => {
            proxy::forward(&state.http, &track.uri, &headers, "track").await
        }
        Some(RouteTarget::Nested { index, track, id }) => {
            serve_nested(&state, index, track, id, uri.query(), &headers).await
        }
        None => Err(api_error(StatusCode::NOT_FOUND, "not found")),
    }
}

async fn serve_playlist_file(file: &Path) -> ProxyResult {
    match tokio::fs::read(file).await {
        Ok(content) => proxy::playlist_response(content, PLAYLIST_CONTENT_TYPE),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(api_error(StatusCode::NOT_FOUND, "playlist not available"))
        }
        Err(e) => {
            tracing::error!("Failed to read proxied playlist {}: {}", file.display(), e);
            Err(api_error(StatusCode::INTERNAL_SERVER_ERROR, "internal error"))
        }
    }
}

async fn serve_nested(
    state: &AppState,
    index: usize,
    track: &Track,
    id: &str,
    query: Option<&str>,
    headers: &HeaderMap,
) -> ProxyResult {
    let upstream_url = resolve_nested_upstream(&track.uri, id, query).map_err(|e| {
        tracing::warn!(track = %track.name, "cannot resolve nested upstream for {}: {}", id, e);
        api_error(StatusCode::BAD_GATEWAY, "invalid upstream URL")
    })?;

    let upstream = proxy::send_upstream(&state.http, upstream_url.as_str(), headers, "nested").await?;
    let content_type = proxy::upstream_content_type(&upstream);

    if !upstream.status().is_success()
        || !is_playlist_document(upstream.url(), content_type.as_deref())
    {
        return proxy::stream_response(upstream, upstream_url.as_str());
    }

    let body = upstream.text().await.map_err(|e| {
        tracing::error!("Failed to read nested playlist {}: {}", upstream_url, e);
        api_error(StatusCode::BAD_GATEWAY, "failed to read upstream playlist")
    })?;

    let proxy_prefix = format!(
        "{}{}",
        state.identity.origin(),
        nested_prefix(index, &state.identity)
    );
    proxy::playlist_response(rewrite_nested_playlist(&body, &proxy_prefix, id), HLS_CONTENT_TYPE)
}
