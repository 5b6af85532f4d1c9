mod config;
mod metrics;
mod models;
mod routes;
mod services;

use anyhow::Context;
use axum::{routing::get, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::services::{
    m3u_parser::PlaylistFetcher,
    proxyfier::ProxyIdentity,
    refresh::{build_snapshot, start_refresh_task, ProxySnapshot},
};

/// Application state shared across handlers
pub struct AppState {
    pub config: Config,
    pub identity: ProxyIdentity,
    /// Swapped as a whole by each refresh
    pub snapshot: RwLock<Arc<ProxySnapshot>>,
    pub fetcher: PlaylistFetcher,
    /// Client for proxied streams
    pub http: reqwest::Client,
    pub start_time: Instant,
}

impl AppState {
    /// State with only the playlist endpoint bound
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let identity = config.proxy_identity();

        let fetcher = PlaylistFetcher::new(
            &config.user_agent,
            config.fetch_timeout_ms,
            config.max_retries,
            config.max_m3u_size_mb,
        )?;

        let http = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .connect_timeout(Duration::from_millis(config.proxy_timeout_ms))
            .build()
            .context("Failed to create proxy HTTP client")?;

        let snapshot = ProxySnapshot::empty(&config.m3u_file_name, config.playlist_path.clone());

        Ok(Self {
            config,
            identity,
            snapshot: RwLock::new(Arc::new(snapshot)),
            fetcher,
            http,
            start_time: Instant::now(),
        })
    }
}

/// Build the application router
pub fn app(state: Arc<AppState>) -> Router {
    let prefix = state.identity.custom_prefix();

    let mut router = Router::new()
        // Health endpoints
        .route("/", get(routes::health::root))
        .route("/health", get(routes::health::health_check))
        .route("/metrics", get(routes::health::metrics))
        .route("/ready", get(routes::health::ready))
        .route("/live", get(routes::health::live));

    if state.identity.upstream.is_some() {
        let creds = format!(
            "{}/{}",
            state.identity.escaped_user(),
            state.identity.escaped_password()
        );

        router = router
            .route(
                &format!("{}/get.php", prefix),
                get(routes::xtream::get_php).post(routes::xtream::get_php),
            )
            .route(&format!("{}/apiget", prefix), get(routes::xtream::api_get))
            .route(
                &format!("{}/player_api.php", prefix),
                get(routes::xtream::player_api).post(routes::xtream::player_api_post),
            )
            .route(&format!("{}/xmltv.php", prefix), get(routes::xtream::xmltv))
            .route(
                &format!("{}/play/:token/:type", prefix),
                get(routes::xtream::play),
            )
            .route(
                &format!("{}/live/{}/:id", prefix, creds),
                get(routes::xtream::stream_live),
            )
            .route(
                &format!("{}/movie/{}/:id", prefix, creds),
                get(routes::xtream::stream_movie),
            )
            .route(
                &format!("{}/series/{}/:id", prefix, creds),
                get(routes::xtream::stream_series),
            )
            .route(
                &format!("{}/{}/:id", prefix, creds),
                get(routes::xtream::stream_plain),
            );

        if state.config.xtream_auto() {
            router = router.route(
                &format!("{}/{}", prefix, state.config.m3u_file_name.trim_start_matches('/')),
                get(routes::xtream::get_auto).post(routes::xtream::get_auto),
            );
        }
    }

    router
        // Playlist, tracks and nested playlists
        .fallback(routes::tracks::dispatch)
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing/logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "iptv_proxy=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    // Load configuration
    let config = Config::from_env();
    let port = config.port;
    let refresh_interval = config.refresh_interval_secs;
    let xtream_auto = config.xtream_auto();

    tracing::info!("Starting iptv-proxy v{}", env!("CARGO_PKG_VERSION"));

    let state = AppState::new(config)?;
    tracing::info!(
        "Advertising {} (namespace {}, hash method {})",
        state.identity.origin(),
        state.identity.namespace,
        state.identity.hash_method
    );

    if xtream_auto {
        tracing::info!("M3U source is the Xtream get.php, playlist served on demand");
    } else {
        // A failed initial pass is fatal
        let snapshot = build_snapshot(&state.fetcher, &state.config, &state.identity)
            .await
            .context("Initial playlist rewrite failed")?;
        tracing::info!("Installed {} track routes", snapshot.routes.len());
        *state.snapshot.write().await = Arc::new(snapshot);
    }

    let state = Arc::new(state);

    if refresh_interval > 0 && !xtream_auto {
        tokio::spawn(start_refresh_task(Arc::clone(&state), refresh_interval));
    }

    let router = app(state);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}
