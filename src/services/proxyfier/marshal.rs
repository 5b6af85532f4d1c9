use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;

use super::rewrite::{rewrite_url, PathSource};
use super::{ProxyIdentity, RewriteError};
use crate::models::TrackConfig;

/// How track URLs are rewritten when marshalling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarshalMode {
    /// Each track points at its precomputed proxy path
    Proxied,
    /// Each track keeps its upstream Xtream path with swapped credentials
    Xtream,
}

/// Rendered proxy playlist
#[derive(Debug)]
pub struct MarshalledPlaylist {
    pub content: String,
    /// Track configs that made it into `content`, in order
    pub kept: Vec<TrackConfig>,
    pub dropped: usize,
}

/// Render track configs as M3U text
///
/// Tracks whose URL cannot be rewritten are left out and counted. An invalid
/// proxy URL aborts the whole render.
pub fn marshal(
    configs: Vec<TrackConfig>,
    identity: &ProxyIdentity,
    mode: MarshalMode,
) -> Result<MarshalledPlaylist, RewriteError> {
    let mut content = String::from("#EXTM3U\n");
    let mut kept = Vec::with_capacity(configs.len());
    let mut dropped = 0usize;

    for config in configs {
        let source = match mode {
            MarshalMode::Proxied => PathSource::Relative(&config.relative_path),
            MarshalMode::Xtream => PathSource::XtreamPassthrough,
        };

        let uri = match rewrite_url(&config.track.uri, source, identity) {
            Ok(uri) => uri,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                dropped += 1;
                tracing::warn!(track = %config.track.name, "dropping track: {}", e);
                continue;
            }
        };

        content.push_str(&extinf_line(&config));
        content.push('\n');
        content.push_str(&uri);
        content.push('\n');
        kept.push(config);
    }

    Ok(MarshalledPlaylist {
        content,
        kept,
        dropped,
    })
}

fn extinf_line(config: &TrackConfig) -> String {
    let track = &config.track;
    let mut line = format!("#EXTINF:{}", track.length);

    let tags: Vec<String> = track
        .tags
        .iter()
        .map(|tag| format!("{}=\"{}\"", tag.name, tag.value))
        .collect();
    if !tags.is_empty() {
        line.push(' ');
        line.push_str(&tags.join(" "));
    }

    line.push(',');
    line.push_str(&track.name);
    line
}

/// Write the playlist next to `path`, sync, then rename over `path`
pub async fn persist_playlist(path: &Path, content: &str) -> Result<()> {
    let tmp_path = temp_path(path);

    let mut file = File::create(&tmp_path)
        .await
        .with_context(|| format!("Failed to create {}", tmp_path.display()))?;
    let written = async {
        file.write_all(content.as_bytes()).await?;
        file.flush().await?;
        file.sync_all().await
    }
    .await;
    drop(file);

    if let Err(e) = written {
        let _ = fs::remove_file(&tmp_path).await;
        return Err(e).with_context(|| format!("Failed to write {}", tmp_path.display()));
    }

    fs::rename(&tmp_path, path)
        .await
        .with_context(|| format!("Failed to move playlist into {}", path.display()))?;

    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".tmp");
    PathBuf::from(name)
}
