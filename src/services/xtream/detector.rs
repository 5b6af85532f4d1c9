//! Xtream Codes URL Detection
//!
//! Detects if an M3U URL is the `get.php` endpoint of an Xtream Codes server.

use super::types::XtreamCredentials;
use tracing::debug;
use url::Url;

/// Extract Xtream credentials from an M3U URL
///
/// Supported URL patterns:
/// - `http://server:port/get.php?username=X&password=Y&...`
/// - `http://server:port/get.php?username=X&password=Y&type=m3u_plus&output=ts`
///
/// # Returns
/// - `Some(XtreamCredentials)` if URL matches Xtream pattern
/// - `None` if URL is not an Xtream M3U URL
pub fn extract_credentials(m3u_url: &str) -> Option<XtreamCredentials> {
    let parsed = match Url::parse(m3u_url) {
        Ok(url) => url,
        Err(e) => {
            debug!("Failed to parse URL: {}", e);
            return None;
        }
    };

    // Check if it's a get.php endpoint (typical Xtream pattern)
    let path = parsed.path().to_lowercase();
    if !path.contains("/get.php") {
        debug!("URL path does not contain /get.php: {}", path);
        return None;
    }

    let params: std::collections::HashMap<_, _> = parsed.query_pairs().collect();

    // Must have both username and password
    let username = params.get("username")?.to_string();
    let password = params.get("password")?.to_string();

    if username.is_empty() || password.is_empty() {
        debug!("Empty username or password in URL");
        return None;
    }

    // Reconstruct server base URL
    let host = parsed.host_str()?;
    let scheme = parsed.scheme();
    let port_suffix = parsed
        .port()
        .map(|p| format!(":{}", p))
        .unwrap_or_default();

    let server = format!("{}://{}{}", scheme, host, port_suffix);

    debug!(
        "Extracted Xtream credentials: server={}, username={}",
        server, username
    );

    Some(XtreamCredentials {
        server,
        username,
        password,
    })
}

/// Whether `m3u_url` is the `get.php` playlist of the configured Xtream
/// account: same host, same username and same password.
pub fn is_same_xtream_source(m3u_url: &str, upstream: &XtreamCredentials) -> bool {
    let Some(found) = extract_credentials(m3u_url) else {
        return false;
    };

    let host = Url::parse(&found.server)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_default();

    !host.is_empty()
        && upstream.server.contains(&host)
        && found.username == upstream.username
        && found.password == upstream.password
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upstream() -> XtreamCredentials {
        XtreamCredentials {
            server: "http://example.com:8080".to_string(),
            username: "user".to_string(),
            password: "pass".to_string(),
        }
    }

    #[test]
    fn test_extract_credentials_valid() {
        let url = "http://example.com:8080/get.php?username=testuser&password=testpass&type=m3u_plus&output=ts";
        let creds = extract_credentials(url).expect("Should extract credentials");

        assert_eq!(creds.server, "http://example.com:8080");
        assert_eq!(creds.username, "testuser");
        assert_eq!(creds.password, "testpass");
    }

    #[test]
    fn test_extract_credentials_not_xtream() {
        let url = "http://example.com/playlist.m3u";
        assert!(extract_credentials(url).is_none());

        let url = "http://example.com/api/streams?username=user&password=pass";
        assert!(extract_credentials(url).is_none());
    }

    #[test]
    fn test_extract_credentials_missing_params() {
        let url = "http://example.com/get.php?username=user";
        assert!(extract_credentials(url).is_none());

        let url = "http://example.com/get.php?password=pass";
        assert!(extract_credentials(url).is_none());
    }

    #[test]
    fn test_same_source() {
        let url = "http://example.com:8080/get.php?username=user&password=pass&type=m3u_plus";
        assert!(is_same_xtream_source(url, &upstream()));
    }

    #[test]
    fn test_different_account_is_not_same_source() {
        let url = "http://example.com:8080/get.php?username=other&password=pass";
        assert!(!is_same_xtream_source(url, &upstream()));

        let url = "http://elsewhere.net/get.php?username=user&password=pass";
        assert!(!is_same_xtream_source(url, &upstream()));
    }

    #[test]
    fn test_credentials_url_builders() {
        let creds = upstream();

        assert_eq!(
            creds.api_url(),
            "http://example.com:8080/player_api.php?username=user&password=pass"
        );
        assert_eq!(
            creds.stream_url("live", "123.ts"),
            "http://example.com:8080/live/user/pass/123.ts"
        );
        assert_eq!(
            creds.stream_url("", "9"),
            "http://example.com:8080/user/pass/9"
        );
        assert_eq!(
            creds.epg_url(),
            "http://example.com:8080/xmltv.php?username=user&password=pass"
        );

        let extra = vec![("type".to_string(), "m3u_plus".to_string())];
        assert_eq!(
            creds.get_php_url(&extra).unwrap().as_str(),
            "http://example.com:8080/get.php?username=user&password=pass&type=m3u_plus"
        );
    }
}
