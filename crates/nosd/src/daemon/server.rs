use std::net::SocketAddr;

use anyhow::{Context, Result};
use tokio::net::TcpListener;

use crate::api::build_router;
use crate::config::NosdConfig;
use crate::daemon::state::AppState;

/// Binds the HTTP listener and serves the API router until `shutdown_signal`
/// resolves. Unlike the agent, nosd talks plain HTTP: it's only ever reached
/// through the reverse proxy or directly on the LAN, never across a trust
/// boundary the way the privileged agent socket is.
pub async fn run_server(config: NosdConfig) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.http_host, config.http_port)
        .parse()
        .with_context(|| format!("invalid listen address {}:{}", config.http_host, config.http_port))?;

    let state = AppState::new(config)
        .await
        .context("initializing application state")?;

    let app = build_router(state);

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;

    tracing::info!(%addr, "nosd listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("serving nosd api")
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    #[cfg(unix)]
    let terminate = async {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("install SIGTERM handler");
        sigterm.recv().await;
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    tracing::info!("shutdown signal received");
}
