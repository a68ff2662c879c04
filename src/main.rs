// =============================================================================
// Tudengibaar TV Board — Main Entry Point
// =============================================================================
//
// Polls the POS backend for product/order snapshots, derives the live
// display state (price history, forecast overlay, grouped board, movers
// ticker, rotating selection), and serves it to TV clients over REST and a
// WebSocket push feed.
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod api;
mod app_state;
mod board;
mod forecast;
mod history;
mod poller;
mod pos_client;
mod runtime_config;
mod selection;
mod types;

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::app_state::AppState;
use crate::pos_client::PosClient;
use crate::runtime_config::RuntimeConfig;

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
    info!("║        Tudengibaar TV Board — Starting Up               ║");
    info!("╚══════════════════════════════════════════════════════════╝");

    let config_path = "board_config.json";
    let mut config = match RuntimeConfig::load(config_path) {
        Ok(config) => config,
        Err(e) => {
            warn!(error = %e, "Failed to load config, using defaults");
            let config = RuntimeConfig::default();
            // First run: write the defaults out so operators have a file to edit.
            if !std::path::Path::new(config_path).exists() {
                if let Err(e) = config.save(config_path) {
                    warn!(error = %e, "Failed to write default config");
                }
            }
            config
        }
    };

    // Override the POS backend URL from env if available.
    if let Ok(base) = std::env::var("BAARBOARD_API_BASE") {
        if !base.is_empty() {
            config.api_base_url = base;
        }
    }

    info!(
        api_base_url = %config.api_base_url,
        poll_interval_secs = config.poll_interval_secs,
        rotation_interval_secs = config.rotation_interval_secs,
        "Board configured"
    );

    // ── 2. Build shared state & POS client ───────────────────────────────
    let state = Arc::new(AppState::new(config));

    // An absent token still attempts the fetch; the server decides.
    let api_token = std::env::var("BAARBOARD_API_TOKEN").unwrap_or_default();
    if api_token.is_empty() {
        warn!("BAARBOARD_API_TOKEN is not set — fetching snapshots unauthenticated");
    }
    let base_url = state.runtime_config.read().api_base_url.clone();
    let pos_client = Arc::new(PosClient::new(base_url, api_token));

    // ── 3. Background loops (poll + rotation) ────────────────────────────
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let poll_handle = tokio::spawn(poller::run_poll_loop(
        state.clone(),
        pos_client.clone(),
        shutdown_rx.clone(),
    ));
    let rotation_handle = tokio::spawn(poller::run_rotation_loop(
        state.clone(),
        shutdown_rx,
    ));

    // ── 4. Start the API server ──────────────────────────────────────────
    let api_state = state.clone();
    let bind_addr =
        std::env::var("BAARBOARD_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3001".into());

    tokio::spawn(async move {
        let app = api::rest::router(api_state);
        let listener = tokio::net::TcpListener::bind(&bind_addr)
            .await
            .expect("Failed to bind API server");
        info!(addr = %bind_addr, "API server listening");
        axum::serve(listener, app)
            .await
            .expect("API server failed");
    });

    info!("All subsystems running. Press Ctrl+C to stop.");

    // ── 5. Graceful shutdown ─────────────────────────────────────────────
    tokio::signal::ctrl_c().await?;
    warn!("Shutdown signal received — stopping loops");

    // Stop both timers deterministically; a fetch completing after this
    // point is never applied.
    let _ = shutdown_tx.send(true);
    let _ = tokio::join!(poll_handle, rotation_handle);

    info!("Tudengibaar TV Board shut down complete.");
    Ok(())
}
