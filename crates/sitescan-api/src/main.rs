use anyhow::{Context, Result};
use sitescan_api::{router, state::AppState};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let bind_addr =
        std::env::var("SITESCAN_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());

    let state = AppState::in_memory();
    let app = router(state.clone());

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", bind_addr))?;
    info!(addr = %bind_addr, "SiteScan API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(state))
        .await
        .context("Server error")?;

    Ok(())
}

/// On ctrl-c, cancel every in-flight run so browser contexts and politeness
/// permits drain before the process exits.
async fn shutdown_signal(state: AppState) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        return;
    }
    info!(runs = state.runs.len(), "Shutting down, cancelling in-flight runs");
    for entry in state.runs.iter() {
        entry.value().cancel.cancel();
    }
}
