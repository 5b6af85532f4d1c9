//! Playlist initialization and periodic refresh
//!
//! Each refresh runs a fresh, independent rewrite pass, persists the new
//! playlist via temp-then-rename and swaps the route table in one write, so
//! requests always observe a complete snapshot.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time;

use crate::config::Config;
use crate::metrics;
use crate::services::m3u_parser::PlaylistFetcher;
use crate::services::proxyfier::{persist_playlist, run_pass, ProxyIdentity, RouteTable};
use crate::AppState;

/// Read-only artifacts of one rewrite pass
#[derive(Debug)]
pub struct ProxySnapshot {
    pub routes: RouteTable,
    pub tracks: usize,
    pub dropped: usize,
    /// Unix millis of the pass
    pub generated_at: i64,
}

impl ProxySnapshot {
    /// Snapshot with only the playlist endpoint bound
    pub fn empty(playlist_name: &str, playlist_file: PathBuf) -> Self {
        Self {
            routes: RouteTable::playlist_only(playlist_name, playlist_file),
            tracks: 0,
            dropped: 0,
            generated_at: chrono::Utc::now().timestamp_millis(),
        }
    }
}

/// Fetch the upstream playlist, rewrite it and persist the result
pub async fn build_snapshot(
    fetcher: &PlaylistFetcher,
    config: &Config,
    identity: &ProxyIdentity,
) -> Result<ProxySnapshot> {
    if config.m3u_url.is_empty() {
        return Ok(ProxySnapshot::empty(
            &config.m3u_file_name,
            config.playlist_path.clone(),
        ));
    }

    let playlist = fetcher
        .load(&config.m3u_url)
        .await
        .context("Failed to load upstream playlist")?;

    let outcome = run_pass(&playlist, identity).context("Rewrite pass aborted")?;

    persist_playlist(&config.playlist_path, &outcome.content)
        .await
        .context("Failed to persist proxied playlist")?;

    let routes = RouteTable::build(
        &config.m3u_file_name,
        config.playlist_path.clone(),
        &outcome.track_configs,
        identity,
    );

    metrics::REWRITE_PASSES.inc();
    metrics::TRACKS_DROPPED.inc_by(outcome.dropped as u64);
    metrics::ROUTES_INSTALLED.set(routes.len() as i64);

    tracing::info!(
        "Proxied playlist written to {} ({} tracks, {} dropped)",
        config.playlist_path.display(),
        outcome.playlist.len(),
        outcome.dropped
    );

    Ok(ProxySnapshot {
        routes,
        tracks: outcome.playlist.len(),
        dropped: outcome.dropped,
        generated_at: chrono::Utc::now().timestamp_millis(),
    })
}

/// Run a single refresh cycle, keeping the previous snapshot on failure
pub async fn run_refresh(state: &AppState) -> Result<()> {
    let snapshot = build_snapshot(&state.fetcher, &state.config, &state.identity).await?;

    let mut current = state.snapshot.write().await;
    *current = Arc::new(snapshot);
    Ok(())
}

/// Start the background refresh task
///
/// The first pass already ran during startup, so this waits one interval
/// before refreshing. Spawn with `tokio::spawn`.
pub async fn start_refresh_task(state: Arc<AppState>, interval_secs: u64) {
    tracing::info!("Starting playlist refresh task (interval: {}s)", interval_secs);

    let mut interval = time::interval(Duration::from_secs(interval_secs));
    // first tick completes immediately
    interval.tick().await;

    loop {
        interval.tick().await;

        match run_refresh(&state).await {
            Ok(()) => tracing::info!("Playlist refreshed"),
            Err(e) => tracing::warn!("Playlist refresh failed, keeping previous routes: {:#}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Playlist, Track};
    use crate::services::proxyfier::tests::identity;

    #[test]
    fn test_empty_snapshot_binds_playlist_only() {
        let snapshot = ProxySnapshot::empty("iptv.m3u", PathBuf::from("/tmp/x.m3u"));
        assert!(snapshot.routes.is_empty());
        assert_eq!(snapshot.routes.playlist_route(), "/iptv.m3u");
    }

    #[tokio::test]
    async fn test_build_snapshot_from_local_file() {
        let dir = std::env::temp_dir();
        let source = dir.join(format!("{}.m3u", uuid::Uuid::new_v4()));
        let target = dir.join(format!("{}.iptv-proxy.m3u", uuid::Uuid::new_v4()));
        tokio::fs::write(
            &source,
            "#EXTM3U\n#EXTINF:-1,A\nhttp://up.example/a.ts\n#EXTINF:-1,Bad\n::not a url\n",
        )
        .await
        .unwrap();

        let mut config = Config::from_lookup(|_| None);
        config.m3u_url = source.to_string_lossy().into_owned();
        config.playlist_path = target.clone();

        let fetcher = PlaylistFetcher::new("test", 1_000, 0, 1).unwrap();
        let snapshot = build_snapshot(&fetcher, &config, &identity()).await.unwrap();

        assert_eq!(snapshot.tracks, 1);
        assert_eq!(snapshot.dropped, 1);
        assert_eq!(snapshot.routes.len(), 1);

        let written = tokio::fs::read_to_string(&target).await.unwrap();
        let reparsed = crate::services::m3u_parser::parse_playlist(&written).unwrap();
        assert_eq!(
            reparsed,
            Playlist {
                tracks: vec![Track {
                    uri: "http://proxy.local:8080/ns/user/pass/0/a.ts".to_string(),
                    name: "A".to_string(),
                    length: -1,
                    tags: vec![],
                }]
            }
        );

        let _ = tokio::fs::remove_file(&source).await;
        let _ = tokio::fs::remove_file(&target).await;
    }
}
