use anyhow::{anyhow, bail, Context, Result};
use lazy_static::lazy_static;
use regex::Regex;
use reqwest::{Client, Response};
use std::time::Duration;
use tokio::time::sleep;
use tokio_stream::StreamExt;

use crate::models::{Playlist, Tag, Track};

lazy_static! {
    /// Regex to parse EXTINF attributes (tvg-id="...", group-title="...", etc)
    static ref ATTR_REGEX: Regex = Regex::new(r#"([\w.]+(?:-[\w.]+)*)="([^"]*)""#).unwrap();

    /// Regex to extract duration from EXTINF line
    static ref DURATION_REGEX: Regex = Regex::new(r"^\s*(-?\d+)").unwrap();
}

/// Parsed EXTINF line data
#[derive(Debug, Default)]
struct ExtinfData {
    duration: i64,
    tags: Vec<Tag>,
    title: String,
}

/// Parse an EXTINF line
/// Format: #EXTINF:duration tvg-id="..." tvg-name="..." tvg-logo="..." group-title="...",Title
fn parse_extinf(line: &str) -> Option<ExtinfData> {
    let content = line.strip_prefix("#EXTINF:")?;

    // Header ends at the first comma outside a quoted value
    let mut in_quotes = false;
    let split = content.char_indices().find_map(|(i, c)| match c {
        '"' => {
            in_quotes = !in_quotes;
            None
        }
        ',' if !in_quotes => Some(i),
        _ => None,
    })?;

    let header = &content[..split];
    let title = content[split + 1..].trim().to_string();

    let duration = DURATION_REGEX
        .captures(header)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(-1);

    // Attributes keep their source order
    let tags = ATTR_REGEX
        .captures_iter(header)
        .map(|caps| {
            let key = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
            let value = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
            Tag::new(key, value)
        })
        .collect();

    Some(ExtinfData {
        duration,
        tags,
        title,
    })
}

/// Parse M3U text into an ordered playlist
pub fn parse_playlist(text: &str) -> Result<Playlist> {
    let mut lines = text
        .lines()
        .map(|line| line.trim_start_matches('\u{feff}').trim())
        .filter(|line| !line.is_empty());

    match lines.next() {
        Some(first) if first.starts_with("#EXTM3U") => {}
        _ => bail!("invalid m3u file format: missing #EXTM3U header"),
    }

    let mut tracks = Vec::new();
    let mut current_extinf: Option<ExtinfData> = None;

    for line in lines {
        if line.starts_with("#EXTINF:") {
            current_extinf = parse_extinf(line);
            if current_extinf.is_none() {
                tracing::debug!("Skipping EXTINF without title separator: {}", line);
            }
            continue;
        }

        if line.starts_with('#') {
            continue;
        }

        let track = match current_extinf.take() {
            Some(extinf) => Track {
                uri: line.to_string(),
                name: extinf.title,
                length: extinf.duration,
                tags: extinf.tags,
            },
            None => Track {
                uri: line.to_string(),
                name: String::new(),
                length: -1,
                tags: Vec::new(),
            },
        };
        tracks.push(track);
    }

    Ok(Playlist { tracks })
}

/// Trim surrounding whitespace of every tag name and value
pub fn trim_tag_strings(playlist: Playlist) -> Playlist {
    let tracks = playlist
        .tracks
        .into_iter()
        .map(|mut track| {
            for tag in &mut track.tags {
                let name = tag.name.trim();
                if name.len() != tag.name.len() {
                    tag.name = name.to_string();
                }
                let value = tag.value.trim();
                if value.len() != tag.value.len() {
                    tag.value = value.to_string();
                }
            }
            track
        })
        .collect();

    Playlist { tracks }
}

/// Loads upstream playlists from HTTP(S) or the local filesystem
pub struct PlaylistFetcher {
    client: Client,
    max_retries: u32,
    max_m3u_size_mb: usize,
}

impl PlaylistFetcher {
    /// Create a new playlist fetcher
    pub fn new(
        user_agent: &str,
        timeout_ms: u64,
        max_retries: u32,
        max_m3u_size_mb: usize,
    ) -> Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_millis(timeout_ms))
            .gzip(true)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            max_retries,
            max_m3u_size_mb,
        })
    }

    fn max_bytes(&self) -> u64 {
        (self.max_m3u_size_mb as u64) * 1024 * 1024
    }

    /// Fetch, parse and normalize the playlist at `source`
    pub async fn load(&self, source: &str) -> Result<Playlist> {
        let text = self.fetch_text(source).await?;
        let playlist = parse_playlist(&text)
            .with_context(|| format!("Failed to parse playlist from {}", source))?;

        tracing::info!("Loaded {} tracks from {}", playlist.len(), source);
        Ok(trim_tag_strings(playlist))
    }

    /// Raw playlist text from a URL or a local path
    pub async fn fetch_text(&self, source: &str) -> Result<String> {
        if source.starts_with("http://") || source.starts_with("https://") {
            let response = self
                .fetch_with_retry(source)
                .await
                .context("Failed to fetch playlist")?;
            return self.read_limited(response).await;
        }

        let metadata = tokio::fs::metadata(source)
            .await
            .with_context(|| format!("Failed to open playlist file {}", source))?;
        if metadata.len() > self.max_bytes() {
            bail!(
                "Playlist too large: {:.1}MB (limit {}MB)",
                metadata.len() as f64 / 1024f64 / 1024f64,
                self.max_m3u_size_mb
            );
        }

        tokio::fs::read_to_string(source)
            .await
            .with_context(|| format!("Failed to read playlist file {}", source))
    }

    async fn read_limited(&self, response: Response) -> Result<String> {
        let max_bytes = self.max_bytes();
        let mut body = Vec::new();
        let mut stream = Box::pin(response.bytes_stream());

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.context("Failed to read playlist body")?;
            body.extend_from_slice(&chunk);
            if body.len() as u64 > max_bytes {
                bail!("Playlist too large (limit {}MB)", self.max_m3u_size_mb);
            }
        }

        String::from_utf8(body).context("Playlist is not valid UTF-8")
    }

    async fn fetch_with_retry(&self, url: &str) -> Result<Response> {
        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            match self.client.get(url).send().await {
                Ok(resp) => {
                    if resp.status().is_success() {
                        if let Some(len) = resp.content_length() {
                            if len > self.max_bytes() {
                                bail!(
                                    "Playlist too large: {:.1}MB (limit {}MB)",
                                    len as f64 / 1024f64 / 1024f64,
                                    self.max_m3u_size_mb
                                );
                            }
                        }

                        return Ok(resp);
                    }

                    let status = resp.status();
                    if status == reqwest::StatusCode::TOO_MANY_REQUESTS && attempt < self.max_retries {
                        let backoff_ms = (1u64 << attempt).saturating_mul(500).min(10_000);
                        tracing::warn!("fetch_retry" = attempt + 1, "reason" = "429", "backoff_ms" = backoff_ms);
                        sleep(Duration::from_millis(backoff_ms)).await;
                        continue;
                    }

                    let friendly: String = match status {
                        reqwest::StatusCode::NOT_FOUND => "Playlist not found (404)".to_string(),
                        reqwest::StatusCode::FORBIDDEN => {
                            "Access denied (403), the playlist may require authentication".to_string()
                        }
                        reqwest::StatusCode::TOO_MANY_REQUESTS => {
                            "Too many requests (429), upstream is rate limiting".to_string()
                        }
                        _ => {
                            let reason = status.canonical_reason().unwrap_or("Error");
                            format!("HTTP {}: {}", status.as_u16(), reason)
                        }
                    };

                    bail!("{}", friendly);
                }
                Err(err) => {
                    if attempt < self.max_retries {
                        let backoff_ms = (1u64 << attempt).saturating_mul(500).min(10_000);
                        tracing::warn!("fetch_retry" = attempt + 1, "reason" = "network", "backoff_ms" = backoff_ms);
                        last_err = Some(err);
                        sleep(Duration::from_millis(backoff_ms)).await;
                        continue;
                    }
                    return Err(err.into());
                }
            }
        }

        match last_err {
            Some(e) => Err(e.into()),
            None => Err(anyhow!("Unknown fetch error")),
        }
    }
}
