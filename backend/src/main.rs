use anyhow::Context;
use attendance_portal::config::PortalConfig;
use attendance_portal::{create_router, init_tracing, initialize_backend};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config_path = PortalConfig::default_path();
    let config = PortalConfig::load_or_default(&config_path);

    let app_state = initialize_backend(&config).await?;
    let app = create_router(app_state, &config.server)?;

    let listener = tokio::net::TcpListener::bind(&config.server.bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind_address))?;
    info!("Listening on {}", config.server.bind_address);

    axum::serve(listener, app).await?;

    Ok(())
}
