use anyhow::{Context, Result};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::config::Config;

pub fn init_tracing() {
    tracing_subscriber::fmt().init();
}

pub fn init_env() {
    dotenvy::dotenv().ok();
}

/// Binds the listener and runs the service until shutdown.
pub async fn serve(service_name: &str, app: Router, config: &Config) -> Result<()> {
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    tracing::info!("{service_name} listening on {addr}");
    axum::serve(listener, app.layer(TraceLayer::new_for_http()))
        .await
        .context("Server error")?;

    Ok(())
}
