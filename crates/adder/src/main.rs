//! adder-server
//!
//! Composition root for the producing side: HTTP entry point,
//! transactional outbox, and the background relay.

use std::sync::Arc;

use tracing::info;

use sumline_adder::api::{self, AppState};
use sumline_adder::messaging::{NatsEventPublisher, TOPIC};
use sumline_adder::persistence::PostgresOutboxRepository;
use sumline_adder::relay::{OutboxRelay, RelayConfig};
use sumline_adder::service::SumService;
use sumline_shared::config::ConfigLoader;
use sumline_shared::shutdown::{GracefulShutdown, ShutdownConfig, start_signal_handler};
use sumline_shared::telemetry::tracing::{TracingConfig, init_tracing};
use sumline_shared::telemetry::PipelineMetrics;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = ConfigLoader::new(None).load_adder_config()?;

    init_tracing(&TracingConfig::new("adder", &config.logging.level));
    info!("Starting adder service");

    let pool = sumline_shared::db::connect_pool(&config.database).await?;

    let repository = Arc::new(PostgresOutboxRepository::new(pool.clone()));
    repository.run_migrations().await?;
    info!("Database migrations completed");

    let publisher = Arc::new(NatsEventPublisher::connect(&config.nats).await?);
    let metrics = Arc::new(PipelineMetrics::new()?);

    let shutdown = GracefulShutdown::new(ShutdownConfig::default());
    start_signal_handler(&shutdown);

    let relay = OutboxRelay::new(
        repository.clone(),
        publisher,
        RelayConfig::from(&config.relay),
        metrics.clone(),
        TOPIC,
    );
    let relay_handle = relay.start(&shutdown);

    let state = AppState {
        sum_service: Arc::new(SumService::new(pool.clone(), repository.clone())),
        repository,
        metrics,
        max_retries: config.relay.max_retries,
    };

    let listener = tokio::net::TcpListener::bind(config.http.bind_address).await?;
    info!("Adder service listening on {}", config.http.bind_address);

    let mut http_shutdown = shutdown.subscribe();
    axum::serve(listener, api::router(state))
        .with_graceful_shutdown(async move {
            http_shutdown.recv().await;
        })
        .await?;

    // HTTP is drained; give the relay its deadline to finish the
    // in-flight batch item and the current cleanup pass
    let _ = tokio::time::timeout(shutdown.timeout(), relay_handle.join()).await;

    info!("Shutdown complete");
    Ok(())
}
