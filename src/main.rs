use std::sync::Arc;

use tokio::time::Duration;
use tracing_subscriber::EnvFilter;

use parcel_engine::api;
use parcel_engine::config::Config;
use parcel_engine::engine::conversion::{Collaborators, OrderConversionService};
use parcel_engine::engine::distance::CoordinateResolver;
use parcel_engine::engine::housekeeping::run_housekeeping;
use parcel_engine::error::AppError;
use parcel_engine::observability::metrics::Metrics;
use parcel_engine::state::AppState;
use parcel_engine::store::memory::{MemoryTable, StaticSettings};
use parcel_engine::store::schema::{PACKAGES, PENDING_ORDERS};

const HOUSEKEEPING_EVERY: Duration = Duration::from_secs(300);

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let config = Config::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(config.log_level.clone()))
        .with_target(false)
        .compact()
        .init();

    let metrics = Metrics::new();
    let collaborators = Collaborators {
        resolver: Arc::new(CoordinateResolver::default()),
        settings: Arc::new(StaticSettings::default()),
        pending_orders: Arc::new(MemoryTable::with_full_schema(&PENDING_ORDERS)),
        packages: Arc::new(MemoryTable::with_full_schema(&PACKAGES)),
    };
    let service =
        OrderConversionService::connect(config.engine.clone(), collaborators, metrics.clone())
            .await;

    let shared_state = Arc::new(AppState::new(service, metrics));
    let app = api::rest::router(shared_state.clone());

    tokio::spawn(run_housekeeping(shared_state.clone(), HOUSEKEEPING_EVERY));

    let bind_addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|err| AppError::Internal(format!("failed to bind {bind_addr}: {err}")))?;

    tracing::info!(
        http_port = config.http_port,
        qr_payments = config.engine.qr_payments_enabled,
        "http server started"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| AppError::Internal(format!("server error: {err}")))?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
}
