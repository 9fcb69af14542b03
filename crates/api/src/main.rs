use std::net::SocketAddr;

use anyhow::Context;

use pilgrim_api::config::ApiConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    pilgrim_observability::init();

    let config = ApiConfig::from_env().context("invalid configuration")?;

    let app = pilgrim_api::app::build_app(&config).context("failed to build application")?;

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    // Peer addresses key the auth rate limiter.
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;
    Ok(())
}
