use std::sync::Arc;

use anyhow::Context;

use authkit_api::config::ApiConfig;
use authkit_core::LoggingEmailService;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    authkit_observability::init();

    let config = ApiConfig::from_env().context("invalid AUTHKIT_* configuration")?;
    let kit = authkit_api::app::services::build_kit(&config, Arc::new(LoggingEmailService))
        .context("failed to initialise recipes")?;
    let app = authkit_api::app::build_app(kit);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
