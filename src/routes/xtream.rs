//! Xtream Codes Proxy Routes
//!
//! These routes present the proxy's own credentials and host to Xtream
//! clients while forwarding to the upstream server with upstream credentials.

use axum::{
    extract::{Path, RawQuery, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Form, Json,
};
use std::sync::Arc;

use super::proxy::{self, api_error, require_auth, ApiError, ProxyResult};
use crate::models::Playlist;
use crate::services::m3u_parser::{parse_playlist, trim_tag_strings};
use crate::services::proxyfier::{compute_track_configs, marshal, MarshalMode, ProxyIdentity};
use crate::services::xtream::{XtreamCatalogue, XtreamClient, XtreamCredentials};
use crate::AppState;

const PLAYLIST_CONTENT_TYPE: &str = "audio/x-mpegurl";

/// Query pairs without the client's credentials
fn forwarded_pairs(query: Option<&str>) -> Vec<(String, String)> {
    url::form_urlencoded::parse(query.unwrap_or_default().as_bytes())
        .filter(|(key, _)| key != "username" && key != "password")
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect()
}

fn upstream_credentials(state: &AppState) -> Result<&XtreamCredentials, ApiError> {
    state
        .identity
        .upstream
        .as_ref()
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "xtream is not configured"))
}

/// Fetch upstream get.php and rewrite it with passthrough URLs
async fn xtream_playlist(state: &AppState, extra: &[(String, String)]) -> ProxyResult {
    let creds = upstream_credentials(state)?;
    let url = creds
        .get_php_url(extra)
        .map_err(|e| api_error(StatusCode::BAD_GATEWAY, format!("invalid xtream base URL: {}", e)))?;

    let text = state.fetcher.fetch_text(url.as_str()).await.map_err(|e| {
        tracing::error!("Xtream get.php fetch failed: {:#}", e);
        api_error(StatusCode::BAD_GATEWAY, "failed to fetch upstream playlist")
    })?;

    let playlist = parse_playlist(&text).map(trim_tag_strings).map_err(|e| {
        tracing::error!("Xtream get.php parse failed: {:#}", e);
        api_error(StatusCode::BAD_GATEWAY, "invalid upstream playlist")
    })?;

    render_passthrough(state, &playlist)
}

/// Generate the playlist from the Player API catalogue
async fn api_playlist(state: &AppState) -> ProxyResult {
    let creds = upstream_credentials(state)?;
    let client = XtreamClient::new(state.http.clone(), creds);

    let catalogue = XtreamCatalogue::fetch(&client).await.map_err(|e| {
        tracing::error!("Xtream catalogue fetch failed: {}", e);
        api_error(StatusCode::BAD_GATEWAY, "failed to fetch upstream catalogue")
    })?;

    render_passthrough(state, &catalogue.to_playlist(creds))
}

/// Marshal with upstream paths and swapped credentials
fn render_passthrough(state: &AppState, playlist: &Playlist) -> ProxyResult {
    let configs = compute_track_configs(playlist, &state.identity);
    let rendered = marshal(configs, &state.identity, MarshalMode::Xtream).map_err(|e| {
        tracing::error!("Xtream playlist rewrite aborted: {}", e);
        api_error(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
    })?;

    if rendered.dropped > 0 {
        tracing::info!("Xtream playlist dropped {} tracks", rendered.dropped);
    }

    proxy::playlist_response(rendered.content, PLAYLIST_CONTENT_TYPE)
}

/// GET|POST /get.php
pub async fn get_php(State(state): State<Arc<AppState>>, RawQuery(query): RawQuery) -> ProxyResult {
    require_auth(query.as_deref(), &state.identity)?;
    if state.config.xtream_api_get {
        return api_playlist(&state).await;
    }
    let extra = forwarded_pairs(query.as_deref());
    xtream_playlist(&state, &extra).await
}

/// GET /apiget
pub async fn api_get(State(state): State<Arc<AppState>>, RawQuery(query): RawQuery) -> ProxyResult {
    require_auth(query.as_deref(), &state.identity)?;
    api_playlist(&state).await
}

/// GET|POST /<m3u_file_name> when the M3U source is the Xtream get.php itself
pub async fn get_auto(State(state): State<Arc<AppState>>, RawQuery(query): RawQuery) -> ProxyResult {
    require_auth(query.as_deref(), &state.identity)?;
    let source_query = url::Url::parse(&state.config.m3u_url)
        .ok()
        .and_then(|u| u.query().map(str::to_string));
    let extra = forwarded_pairs(source_query.as_deref());
    xtream_playlist(&state, &extra).await
}

/// GET /player_api.php
pub async fn player_api(
    State(state): State<Arc<AppState>>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    player_api_request(&state, query.as_deref(), &headers).await
}

/// POST /player_api.php, credentials and parameters in a form body
pub async fn player_api_post(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Form(fields): Form<Vec<(String, String)>>,
) -> Result<Response, ApiError> {
    let query = url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(&fields)
        .finish();
    player_api_request(&state, Some(&query), &headers).await
}

async fn player_api_request(
    state: &AppState,
    query: Option<&str>,
    headers: &HeaderMap,
) -> Result<Response, ApiError> {
    require_auth(query, &state.identity)?;
    let creds = upstream_credentials(state)?;

    let mut url = creds.api_url();
    for (key, value) in forwarded_pairs(query) {
        url.push_str(&format!("&{}={}", urlencoding::encode(&key), urlencoding::encode(&value)));
    }

    let upstream = proxy::send_upstream(&state.http, &url, headers, "player_api").await?;
    if !upstream.status().is_success() {
        return Err(api_error(
            StatusCode::BAD_GATEWAY,
            format!("upstream returned {}", upstream.status().as_u16()),
        ));
    }

    let mut body: serde_json::Value = upstream.json().await.map_err(|e| {
        tracing::error!("Invalid player_api.php response: {}", e);
        api_error(StatusCode::BAD_GATEWAY, "invalid upstream response")
    })?;

    rewrite_player_api(&mut body, &state.identity);
    Ok(Json(body).into_response())
}

/// Replace upstream account and server details with the proxy's own
fn rewrite_player_api(body: &mut serde_json::Value, identity: &ProxyIdentity) {
    if let Some(user_info) = body.get_mut("user_info").and_then(|v| v.as_object_mut()) {
        user_info.insert("username".into(), identity.user.clone().into());
        user_info.insert("password".into(), identity.password.clone().into());
    }

    if let Some(server_info) = body.get_mut("server_info").and_then(|v| v.as_object_mut()) {
        let port = identity.advertised_port.to_string();
        server_info.insert("url".into(), identity.hostname.clone().into());
        server_info.insert("server_protocol".into(), identity.scheme().into());
        if identity.https {
            server_info.insert("https_port".into(), port.into());
        } else {
            server_info.insert("port".into(), port.into());
        }
    }
}

/// GET /xmltv.php
pub async fn xmltv(
    State(state): State<Arc<AppState>>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
) -> ProxyResult {
    require_auth(query.as_deref(), &state.identity)?;
    let creds = upstream_credentials(&state)?;
    proxy::forward(&state.http, &creds.epg_url(), &headers, "xmltv").await
}

async fn stream(state: &AppState, kind: &str, id: &str, headers: &HeaderMap) -> ProxyResult {
    let creds = upstream_credentials(state)?;
    proxy::forward(&state.http, &creds.stream_url(kind, id), headers, "xtream_stream").await
}

/// GET /play/:token/:type, authorized by the upstream token
pub async fn play(
    State(state): State<Arc<AppState>>,
    Path((token, kind)): Path<(String, String)>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
) -> ProxyResult {
    let creds = upstream_credentials(&state)?;
    let url = creds.play_url(&token, &kind, query.as_deref());
    proxy::forward(&state.http, &url, &headers, "xtream_play").await
}

/// GET /<user>/<password>/:id
pub async fn stream_plain(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> ProxyResult {
    stream(&state, "", &id, &headers).await
}

/// GET /live/<user>/<password>/:id
pub async fn stream_live(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> ProxyResult {
    stream(&state, "live", &id, &headers).await
}

/// GET /movie/<user>/<password>/:id
pub async fn stream_movie(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> ProxyResult {
    stream(&state, "movie", &id, &headers).await
}

/// GET /series/<user>/<password>/:id
pub async fn stream_series(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> ProxyResult {
    stream(&state, "series", &id, &headers).await
}
