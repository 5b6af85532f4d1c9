use std::env;
use std::path::PathBuf;

use crate::services::proxyfier::{HashMethod, ProxyIdentity};
use crate::services::xtream::{is_same_xtream_source, XtreamCredentials};

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    // Server
    pub port: u16,
    pub hostname: String,
    pub advertised_port: u16,
    pub https: bool,
    pub custom_endpoint: String,
    pub custom_id: String,

    // Proxy credentials
    pub user: String,
    pub password: String,

    // M3U upstream
    pub m3u_url: String,
    pub m3u_file_name: String,
    pub url_hash_method: HashMethod,
    pub playlist_path: PathBuf,
    pub refresh_interval_secs: u64,

    // Xtream upstream
    pub xtream_user: String,
    pub xtream_password: String,
    pub xtream_base_url: String,
    /// Serve `get.php` from the Player API catalogue
    pub xtream_api_get: bool,

    // Fetching
    pub user_agent: String,
    pub fetch_timeout_ms: u64,
    pub max_retries: u32,
    pub max_m3u_size_mb: usize,
    pub proxy_timeout_ms: u64,
}

impl Config {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());
        let flag = |key: &str| {
            lookup(key)
                .map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
                .unwrap_or(false)
        };

        let port: u16 = var("PORT", "8080").parse().unwrap_or(8080);

        Self {
            // Server
            port,
            hostname: var("PROXY_HOSTNAME", "localhost"),
            advertised_port: lookup("ADVERTISED_PORT")
                .and_then(|v| v.parse().ok())
                .unwrap_or(port),
            https: flag("HTTPS"),
            custom_endpoint: var("CUSTOM_ENDPOINT", ""),
            custom_id: var("CUSTOM_ID", ""),

            // Proxy credentials
            user: var("PROXY_USER", "usertest"),
            password: var("PROXY_PASSWORD", "passwordtest"),

            // M3U upstream
            m3u_url: var("M3U_URL", ""),
            m3u_file_name: var("M3U_FILE_NAME", "iptv.m3u"),
            url_hash_method: var("URL_HASH_METHOD", "")
                .parse()
                .unwrap_or(HashMethod::None),
            playlist_path: lookup("PLAYLIST_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(default_playlist_path),
            refresh_interval_secs: var("REFRESH_INTERVAL_SECS", "0").parse().unwrap_or(0),

            // Xtream upstream
            xtream_user: var("XTREAM_USER", ""),
            xtream_password: var("XTREAM_PASSWORD", ""),
            xtream_base_url: var("XTREAM_BASE_URL", ""),
            xtream_api_get: flag("XTREAM_API_GET"),

            // Fetching - VLC user agent avoids IPTV server blocks
            user_agent: var("USER_AGENT", "VLC/3.0.20 LibVLC/3.0.20"),
            fetch_timeout_ms: var("FETCH_TIMEOUT_MS", "300000")
                .parse()
                .unwrap_or(300_000), // 5 minutes
            max_retries: var("MAX_RETRIES", "3").parse().unwrap_or(3),
            max_m3u_size_mb: var("MAX_M3U_SIZE_MB", "500").parse().unwrap_or(500),
            proxy_timeout_ms: var("PROXY_TIMEOUT_MS", "15000")
                .parse()
                .unwrap_or(15_000), // 15 seconds
        }
    }

    /// Anti-collision token segmenting this instance's routes
    pub fn namespace(&self) -> String {
        let trimmed = self.custom_id.trim_matches('/');
        if trimmed.is_empty() {
            random_namespace()
        } else {
            trimmed.to_string()
        }
    }

    /// Upstream Xtream access, if configured
    pub fn xtream_credentials(&self) -> Option<XtreamCredentials> {
        if self.xtream_base_url.is_empty() {
            return None;
        }

        Some(XtreamCredentials {
            server: self.xtream_base_url.trim_end_matches('/').to_string(),
            username: self.xtream_user.clone(),
            password: self.xtream_password.clone(),
        })
    }

    /// The M3U source is the upstream Xtream `get.php` itself, so the
    /// playlist endpoint is generated from Xtream on demand.
    pub fn xtream_auto(&self) -> bool {
        !self.m3u_url.is_empty()
            && self.xtream_credentials().map_or(false, |creds| {
                is_same_xtream_source(&self.m3u_url, &creds)
            })
    }

    /// Build the identity shaping every proxy path of this process
    pub fn proxy_identity(&self) -> ProxyIdentity {
        ProxyIdentity {
            user: self.user.clone(),
            password: self.password.clone(),
            hostname: self.hostname.clone(),
            advertised_port: self.advertised_port,
            https: self.https,
            custom_endpoint: self.custom_endpoint.trim_matches('/').to_string(),
            namespace: self.namespace(),
            hash_method: self.url_hash_method,
            upstream: self.xtream_credentials(),
        }
    }
}

fn random_namespace() -> String {
    uuid::Uuid::new_v4()
        .to_string()
        .split('-')
        .next()
        .unwrap_or_default()
        .to_string()
}

fn default_playlist_path() -> PathBuf {
    env::temp_dir().join(format!("{}.iptv-proxy.m3u", uuid::Uuid::new_v4()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_with(pairs: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_with(&[]);

        assert_eq!(config.port, 8080);
        assert_eq!(config.advertised_port, 8080);
        assert_eq!(config.m3u_file_name, "iptv.m3u");
        assert_eq!(config.url_hash_method, HashMethod::None);
        assert!(!config.https);
        assert!(config
            .playlist_path
            .to_string_lossy()
            .ends_with(".iptv-proxy.m3u"));
        assert!(config.xtream_credentials().is_none());
        assert!(!config.xtream_api_get);
    }

    #[test]
    fn test_xtream_api_get_flag() {
        assert!(config_with(&[("XTREAM_API_GET", "true")]).xtream_api_get);
        assert!(config_with(&[("XTREAM_API_GET", "1")]).xtream_api_get);
        assert!(!config_with(&[("XTREAM_API_GET", "no")]).xtream_api_get);
    }

    #[test]
    fn test_advertised_port_follows_port() {
        let config = config_with(&[("PORT", "9000")]);
        assert_eq!(config.advertised_port, 9000);

        let config = config_with(&[("PORT", "9000"), ("ADVERTISED_PORT", "443")]);
        assert_eq!(config.advertised_port, 443);
    }

    #[test]
    fn test_custom_namespace_is_trimmed() {
        let config = config_with(&[("CUSTOM_ID", "/mine/")]);
        assert_eq!(config.namespace(), "mine");
    }

    #[test]
    fn test_random_namespace_is_first_uuid_group() {
        let config = config_with(&[]);
        let ns = config.namespace();
        assert_eq!(ns.len(), 8);
        assert!(ns.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_proxy_identity() {
        let config = config_with(&[
            ("PROXY_HOSTNAME", "proxy.example"),
            ("HTTPS", "true"),
            ("CUSTOM_ENDPOINT", "/tv/"),
            ("URL_HASH_METHOD", "smart"),
            ("CUSTOM_ID", "abc"),
        ]);
        let identity = config.proxy_identity();

        assert_eq!(identity.hostname, "proxy.example");
        assert!(identity.https);
        assert_eq!(identity.custom_endpoint, "tv");
        assert_eq!(identity.namespace, "abc");
        assert_eq!(identity.hash_method, HashMethod::Smart);
    }

    #[test]
    fn test_xtream_auto() {
        let config = config_with(&[
            (
                "M3U_URL",
                "http://up.example:8080/get.php?username=xu&password=xp&type=m3u_plus",
            ),
            ("XTREAM_BASE_URL", "http://up.example:8080/"),
            ("XTREAM_USER", "xu"),
            ("XTREAM_PASSWORD", "xp"),
        ]);
        assert!(config.xtream_auto());
        assert_eq!(
            config.xtream_credentials().unwrap().server,
            "http://up.example:8080"
        );

        let config = config_with(&[
            ("M3U_URL", "http://up.example:8080/playlist.m3u"),
            ("XTREAM_BASE_URL", "http://up.example:8080"),
            ("XTREAM_USER", "xu"),
            ("XTREAM_PASSWORD", "xp"),
        ]);
        assert!(!config.xtream_auto());
    }
}
