use std::net::SocketAddr;
use tracing_subscriber::{fmt, EnvFilter};

use collage_gateway::{config::Config, routes::{router, AppState}};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    // Init tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    let config = Config::from_env()?;
    tracing::info!(
        "Using API key: {} against {} (prompt profile: {})",
        config.masked_api_key(),
        config.openai_api_base,
        config.profile
    );
    if let Some(dir) = &config.static_dir {
        tracing::info!("Serving static files from {}", dir.display());
    }

    let port = config.port;
    let state = AppState::from_config(config)?;
    let app = router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!(%addr, "Starting server");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
