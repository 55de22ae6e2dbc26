use std::net::SocketAddr;
use std::sync::Arc;

use api::{build_router, ApiState};
use auth::TokenIssuer;
use common::{logging, AppConfig, AppError, Result};
use db::pg::PgDatabase;
use db::Repositories;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load()?;
    logging::init_tracing(
        "softdesk-api",
        &config.observability.log_level,
        config.observability.otlp,
    )?;

    let tokens =
        TokenIssuer::from_config(&config.auth).map_err(|err| AppError::Other(err.into()))?;

    let database = PgDatabase::connect_with(&config.database.url, config.database.max_connections)
        .await
        .map_err(AppError::db)?;
    let repositories: Arc<dyn Repositories> = Arc::new(database);

    let state = Arc::new(ApiState {
        repositories,
        tokens,
        metrics_path: config.observability.metrics_path.clone(),
        prefix: config.api.prefix.clone(),
    });
    let app = build_router(state);

    let addr: SocketAddr = config
        .api
        .bind
        .parse()
        .map_err(|err| AppError::Other(anyhow::anyhow!("invalid api.bind: {err}")))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|err| AppError::Other(err.into()))?;
    info!(%addr, "api listening");

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;
    logging::shutdown_tracer_provider();
    served.map_err(|err| AppError::Other(err.into()))
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "failed to listen for shutdown signal");
    }
    info!("shutdown signal received");
}
