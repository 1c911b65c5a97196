mod config;
mod errors;
mod export;
mod pagination;
mod routes;
mod state;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::export::SnapshotRasterizer;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on malformed env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting pager v{}", env!("CARGO_PKG_VERSION"));

    let page_config = config.page_config();
    let policy = config.pagination_policy();
    info!(
        "Page config: {:?} {:.1}x{:.1}mm printable, max {} pages",
        config.page_format,
        page_config.available_width_mm(),
        page_config.available_height_mm(),
        policy.max_iterations
    );

    // Build app state
    let state = AppState {
        config: config.clone(),
        rasterizer: Arc::new(SnapshotRasterizer::new(config.max_bitmap_pixels)),
        page_config,
        policy,
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict origins to the portal frontend

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
