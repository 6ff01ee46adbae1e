//! HTTP surface: the score proxy, the card renderer and the page shells.
mod error;
mod pages;
mod routes;

use std::future::Future;
use std::sync::Arc;

use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::Method;
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;

use crate::config::Config;
use crate::fetch::http_client;
use crate::og::Renderer;
use crate::score::NeynarClient;
use crate::Result;

pub use routes::{
    FALLBACK_OG_CACHE_CONTROL, OG_CACHE_CONTROL, SCORE_CACHE_CONTROL,
};

pub struct AppState {
    pub config: Config,
    pub scores: NeynarClient,
    pub renderer: Renderer,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self> {
        let client = http_client()?;
        let scores = NeynarClient::new(
            client.clone(),
            config.neynar_api_base.clone(),
            config.neynar_api_key.clone(),
        );
        if !scores.is_configured() {
            log::warn!("NEYNAR_API_KEY is not set, score requests will fail");
        }
        let renderer = Renderer::new(
            client,
            config.og_font_url.clone(),
            config.render_cache_bytes,
        )
        .allow_private_avatars(config.allow_private_avatars);
        Ok(Self {
            config,
            scores,
            renderer,
        })
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION]);

    let assets = ServeDir::new(&state.config.public_dir);

    Router::new()
        .route("/", get(pages::home))
        .route("/share", get(pages::share))
        .route("/share/:score/:username", get(pages::share_path))
        .route("/api/score", get(routes::score))
        .route("/api/neynar/score", get(routes::score))
        .route("/api/og", get(routes::og))
        .fallback_service(assets)
        .layer(cors)
        .with_state(state)
}

/// Binds the configured address and serves until Ctrl+C or SIGTERM.
pub async fn serve(config: Config) -> Result<()> {
    let address = config.socket_addr();
    log::info!("Binding to {address}");
    let listener = TcpListener::bind(address).await?;
    let state = Arc::new(AppState::new(config)?);
    run(listener, state, shutdown_signal()).await
}

pub async fn run<F>(
    listener: TcpListener,
    state: Arc<AppState>,
    shutdown: F,
) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    log::info!(
        "Server running on {} for {}",
        listener.local_addr()?,
        state.config.public_url
    );
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await?;
    log::info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => log::info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                log::error!("Failed to install Ctrl+C handler: {e}");
                std::future::pending::<()>().await
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                log::info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                log::error!("Failed to install signal handler: {e}");
                std::future::pending::<()>().await
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
