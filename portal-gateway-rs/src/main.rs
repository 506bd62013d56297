// portal-gateway-rs/src/main.rs
// Employee portal gateway: AI relay endpoints, leave balance lookup and the
// built single-page app, all on one port.

use std::sync::Arc;

use config_rs::PortalConfig;
use portal_gateway::PortalGateway;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file
    let env_file = config_rs::load_dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if let Some(path) = env_file {
        tracing::info!("Loaded environment from {}", path.display());
    }

    let config = PortalConfig::from_env();
    tracing::info!("Using bind address: {}", config.bind_addr);
    tracing::info!("Using model: {}", config.upstream.model);
    tracing::info!("Serving static files from {}", config.static_dir.display());

    let gateway = Arc::new(PortalGateway::from_config(&config)?);
    if !config.has_api_key() {
        tracing::warn!("Starting without GEMINI_API_KEY; /health reports DEGRADED");
    }

    let app = gateway.create_router();
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;

    tracing::info!("Portal gateway listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
