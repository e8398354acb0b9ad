use std::sync::Arc;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

use cu_client::{CuClient, CuConfig};
use cu_server::{presets::PresetRegistry, router, AppState, ServerConfig};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("cu=info".parse()?))
        .init();

    let cu_config = CuConfig::from_env()?;
    let config = ServerConfig::from_env()?;

    let state = Arc::new(AppState::new(
        CuClient::from_config(&cu_config)?,
        PresetRegistry::new(&config.template_dir),
    ));
    let app = router(state);

    let addr = config.addr();
    info!("CU tool server starting on {addr}");
    info!("Preset templates loaded from {}", config.template_dir);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
