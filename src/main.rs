// =============================================================================
// Volume Pulse — Main Entry Point
// =============================================================================
//
// KRW crypto volume change-rate tracker: polls the Upbit and Bithumb public
// APIs, normalizes tickers into a common record shape, and serves the
// filterable/sortable dashboard feed (table, top-10 chart, CSV export).
//
// Data refreshes only on cold start and on the manual refresh endpoint —
// there is no background polling.
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod aggregate;
mod api;
mod app_state;
mod config;
mod exchange;
mod export;
mod filter;
mod normalize;
mod refresh;
mod types;

use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::app_state::AppState;
use crate::config::RuntimeConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("╔══════════════════════════════════════════════════════════╗");
    info!("║        Volume Pulse — Starting Up                       ║");
    info!("╚══════════════════════════════════════════════════════════╝");

    let config = RuntimeConfig::from_env();
    info!(
        bind_addr = %config.bind_addr,
        upbit_baseline = %config.upbit_baseline,
        chunk_size = config.ticker_chunk_size,
        "configuration resolved"
    );

    // ── 2. Build shared state ────────────────────────────────────────────
    let state = Arc::new(AppState::new(config));

    // ── 3. Start the API server ──────────────────────────────────────────
    let api_state = state.clone();
    let bind_addr = state.config.bind_addr.clone();

    tokio::spawn(async move {
        let app = api::rest::router(api_state);
        let listener = tokio::net::TcpListener::bind(&bind_addr)
            .await
            .expect("Failed to bind API server");
        info!(addr = %bind_addr, "API server listening");
        axum::serve(listener, app).await.expect("API server failed");
    });

    // ── 4. Cold-start refresh ────────────────────────────────────────────
    let snapshot = refresh::run_refresh(&state).await;
    info!(
        records = snapshot.records.len(),
        warnings = snapshot.warnings.len(),
        "initial batch loaded — further refreshes via POST /api/v1/refresh"
    );

    info!("Tracker running. Press Ctrl+C to stop.");

    // ── 5. Graceful shutdown ─────────────────────────────────────────────
    tokio::signal::ctrl_c().await?;
    warn!("Shutdown signal received — stopping");

    Ok(())
}
