//! Getaway Server - headless simulation for an endless police-chase driving game
//!
//! This is the main entry point for the server. It handles:
//! - The fixed-rate session loop (road, traffic, police, coins, combat)
//! - The Arduino steering controller over UDP
//! - HTTP and WebSocket endpoints for the HUD

mod app;
mod config;
mod controller;
mod game;
mod http;
mod util;
mod ws;

use std::net::SocketAddr;

use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::app::AppState;
use crate::config::Config;
use crate::controller::ControllerListener;
use crate::game::{GameSession, GameTuning, SessionCommand};
use crate::http::build_router;
use crate::util::time::init_server_time;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Config::from_env()?;

    // Initialize tracing
    init_tracing(&config.log_level);

    // Initialize server time tracking
    init_server_time();

    info!("Starting Getaway Server");
    info!("Server address: {}", config.server_addr);

    // The game runs without the controller when the port is unavailable
    let (controller, controller_rx) = if config.controller_enabled {
        match ControllerListener::bind(config.controller_port).await {
            Ok((listener, rx)) => (Some(listener), Some(rx)),
            Err(e) => {
                warn!(error = %e, "Controller disabled");
                (None, None)
            }
        }
    } else {
        info!("Controller listener disabled by configuration");
        (None, None)
    };

    // Spawn the session loop
    let (session, handle) = GameSession::new(GameTuning::default(), config.game_seed, controller_rx)?;
    let session_task = tokio::spawn(session.run());

    // Build router
    let state = AppState::new(config.clone(), handle.clone());
    let router = build_router(state);

    // Start server
    let addr: SocketAddr = config.server_addr;
    let listener = TcpListener::bind(addr).await?;

    info!("Server listening on {}", addr);
    info!("Health check: http://{}/health", addr);
    info!("WebSocket endpoint: ws://{}/ws", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    handle.send(SessionCommand::Shutdown).await;
    if let Err(e) = session_task.await {
        warn!(error = %e, "Session task ended abnormally");
    }
    if let Some(controller) = controller {
        controller.shutdown().await;
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Initialize tracing/logging
fn init_tracing(log_level: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install terminate handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        }
        _ = terminate => {
            info!("Received terminate signal, starting graceful shutdown");
        }
    }
}
