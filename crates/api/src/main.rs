use anyhow::Context;

use tableforge_engine::EngineConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tableforge_observability::init();

    let config = EngineConfig::from_env();
    let app = tableforge_api::app::build_app(config).await;

    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
