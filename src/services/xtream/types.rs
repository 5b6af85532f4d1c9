//! Xtream Codes credential types
//!
//! Upstream access used to forward Xtream Player API calls and to swap the
//! proxy's own credentials for upstream ones in passthrough paths.

use serde::{Deserialize, Deserializer};
use url::Url;

/// Upstream Xtream server and account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XtreamCredentials {
    /// Server base URL (e.g., "http://example.com:8080")
    pub server: String,
    /// Username for authentication
    pub username: String,
    /// Password for authentication
    pub password: String,
}

impl XtreamCredentials {
    /// Build the player_api.php base URL
    pub fn api_url(&self) -> String {
        format!(
            "{}/player_api.php?username={}&password={}",
            self.server,
            urlencoding::encode(&self.username),
            urlencoding::encode(&self.password)
        )
    }

    /// Build the get.php playlist URL, forwarding extra query pairs
    pub fn get_php_url(&self, extra: &[(String, String)]) -> Result<Url, url::ParseError> {
        let mut url = Url::parse(&format!("{}/get.php", self.server))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("username", &self.username);
            query.append_pair("password", &self.password);
            for (key, value) in extra {
                query.append_pair(key, value);
            }
        }
        Ok(url)
    }

    /// Build a stream URL for `kind` ("live", "movie", "series" or empty)
    pub fn stream_url(&self, kind: &str, id: &str) -> String {
        let kind = if kind.is_empty() {
            String::new()
        } else {
            format!("/{}", kind)
        };
        format!(
            "{}{}/{}/{}/{}",
            self.server,
            kind,
            urlencoding::encode(&self.username),
            urlencoding::encode(&self.password),
            id
        )
    }

    /// Build a tokenized `/play/<token>/<type>` URL
    pub fn play_url(&self, token: &str, kind: &str, query: Option<&str>) -> String {
        let mut url = format!("{}/play/{}/{}", self.server, token, kind);
        if let Some(query) = query.filter(|q| !q.is_empty()) {
            url.push('?');
            url.push_str(query);
        }
        url
    }

    /// Build EPG XML URL
    pub fn epg_url(&self) -> String {
        format!(
            "{}/xmltv.php?username={}&password={}",
            self.server,
            urlencoding::encode(&self.username),
            urlencoding::encode(&self.password)
        )
    }
}

// ============================================================================
// Player API catalogue types
// ============================================================================

/// Stream category (from get_live_categories / get_vod_categories)
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct XtreamCategory {
    #[serde(deserialize_with = "string_or_number")]
    pub category_id: String,
    pub category_name: String,
}

/// Live stream (from get_live_streams)
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct XtreamLiveStream {
    #[serde(default)]
    pub name: String,
    #[serde(deserialize_with = "string_or_number")]
    pub stream_id: String,
    #[serde(default)]
    pub stream_icon: Option<String>,
    #[serde(default)]
    pub epg_channel_id: Option<String>,
    #[serde(default, deserialize_with = "optional_string_or_number")]
    pub category_id: Option<String>,
}

/// VOD stream (from get_vod_streams)
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct XtreamVodStream {
    #[serde(default)]
    pub name: String,
    #[serde(deserialize_with = "string_or_number")]
    pub stream_id: String,
    #[serde(default)]
    pub stream_icon: Option<String>,
    #[serde(default, deserialize_with = "optional_string_or_number")]
    pub category_id: Option<String>,
    #[serde(default)]
    pub container_extension: Option<String>,
}

/// Panels disagree on whether ids are JSON strings or numbers
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number, got {}",
            other
        ))),
    }
}

fn optional_string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<serde_json::Value>::deserialize(deserializer)? {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}
