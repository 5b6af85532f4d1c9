use axum::{
    body::Body,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::Response,
    Json,
};
use reqwest::Client;

use crate::metrics;
use crate::services::proxyfier::ProxyIdentity;

// Re-export reqwest header module to avoid version conflicts
mod reqwest_header {
    pub use reqwest::header::{
        ACCEPT, ACCEPT_RANGES, CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE, ETAG, LAST_MODIFIED,
        RANGE,
    };
}

pub type ApiError = (StatusCode, Json<serde_json::Value>);
pub type ProxyResult = Result<Response, ApiError>;

pub fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(serde_json::json!({ "error": message.into() })))
}

/// The request carries the proxy's username and password as query parameters
pub fn authorized(query: Option<&str>, identity: &ProxyIdentity) -> bool {
    let mut username = None;
    let mut password = None;
    for (key, value) in url::form_urlencoded::parse(query.unwrap_or_default().as_bytes()) {
        match key.as_ref() {
            "username" => username = Some(value.into_owned()),
            "password" => password = Some(value.into_owned()),
            _ => {}
        }
    }

    username.as_deref() == Some(identity.user.as_str())
        && password.as_deref() == Some(identity.password.as_str())
}

pub fn require_auth(query: Option<&str>, identity: &ProxyIdentity) -> Result<(), ApiError> {
    if authorized(query, identity) {
        Ok(())
    } else {
        Err(api_error(StatusCode::UNAUTHORIZED, "invalid credentials"))
    }
}

/// Guess content type from URL
fn guess_content_type(url: &str) -> &'static str {
    let lower = url.to_lowercase();
    if lower.contains(".m3u8") {
        "application/vnd.apple.mpegurl"
    } else if lower.contains(".mp4") {
        "video/mp4"
    } else if lower.contains(".mkv") {
        "video/x-matroska"
    } else if lower.contains(".avi") {
        "video/x-msvideo"
    } else {
        "video/MP2T"
    }
}

/// Send a GET upstream, forwarding `Accept` and `Range`
pub async fn send_upstream(
    client: &Client,
    url: &str,
    headers: &HeaderMap,
    kind: &str,
) -> Result<reqwest::Response, ApiError> {
    metrics::UPSTREAM_REQUESTS.with_label_values(&[kind]).inc();

    let mut request = client.get(url);

    if let Some(accept) = headers.get(header::ACCEPT) {
        if let Ok(accept_str) = accept.to_str() {
            request = request.header(reqwest_header::ACCEPT, accept_str);
        }
    } else {
        request = request.header(reqwest_header::ACCEPT, "*/*");
    }

    // Forward Range header for partial content requests
    if let Some(range) = headers.get(header::RANGE) {
        if let Ok(range_str) = range.to_str() {
            request = request.header(reqwest_header::RANGE, range_str);
        }
    }

    request.send().await.map_err(|e| {
        let status = if e.is_timeout() {
            StatusCode::GATEWAY_TIMEOUT
        } else {
            StatusCode::BAD_GATEWAY
        };
        tracing::error!("Upstream {} request failed: {}", kind, e);
        api_error(status, format!("upstream request failed: {}", e))
    })
}

/// Content type reported by the upstream, if any
pub fn upstream_content_type(upstream: &reqwest::Response) -> Option<String> {
    upstream
        .headers()
        .get(reqwest_header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}

/// Stream an upstream response back to the client
pub fn stream_response(upstream: reqwest::Response, url: &str) -> ProxyResult {
    let upstream_status = upstream.status();

    let content_type = upstream_content_type(&upstream)
        .unwrap_or_else(|| guess_content_type(url).to_string());

    let mut response = Response::builder()
        .status(StatusCode::from_u16(upstream_status.as_u16()).unwrap_or(StatusCode::OK))
        .header(header::CACHE_CONTROL, "no-store");

    if let Ok(value) = HeaderValue::from_str(&content_type) {
        response = response.header(header::CONTENT_TYPE, value);
    }

    // Forward optional headers from upstream (reqwest constants for reading, axum for writing)
    let passthrough = [
        (reqwest_header::CONTENT_LENGTH, header::CONTENT_LENGTH),
        (reqwest_header::CONTENT_RANGE, header::CONTENT_RANGE),
        (reqwest_header::ACCEPT_RANGES, header::ACCEPT_RANGES),
        (reqwest_header::ETAG, header::ETAG),
        (reqwest_header::LAST_MODIFIED, header::LAST_MODIFIED),
    ];
    for (from, to) in passthrough {
        if let Some(value) = upstream.headers().get(from).and_then(|v| v.to_str().ok()) {
            if let Ok(parsed) = HeaderValue::from_str(value) {
                response = response.header(to, parsed);
            }
        }
    }

    let body = Body::from_stream(upstream.bytes_stream());

    response.body(body).map_err(|e| {
        tracing::error!("Failed to build response: {}", e);
        api_error(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
    })
}

/// Reverse proxy `url` to the client
pub async fn forward(client: &Client, url: &str, headers: &HeaderMap, kind: &str) -> ProxyResult {
    let upstream = send_upstream(client, url, headers, kind).await?;
    stream_response(upstream, url)
}

/// Plain-text playlist response
pub fn playlist_response(content: impl Into<Body>, content_type: &'static str) -> ProxyResult {
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CACHE_CONTROL, "no-cache")
        .body(content.into())
        .map_err(|e| {
            tracing::error!("Failed to build playlist response: {}", e);
            api_error(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
        })
}
