//! totalizer-server
//!
//! Composition root for the consuming side: log consumer, dedup
//! sweeper, and the read-side HTTP endpoint.

use std::sync::Arc;

use tracing::info;

use sumline_shared::config::ConfigLoader;
use sumline_shared::shutdown::{GracefulShutdown, ShutdownConfig, start_signal_handler};
use sumline_shared::telemetry::PipelineMetrics;
use sumline_shared::telemetry::tracing::{TracingConfig, init_tracing};
use sumline_totalizer::api::{self, AppState};
use sumline_totalizer::consumer::{ConsumerConfig, EventConsumer, EventProcessor, TOPIC};
use sumline_totalizer::persistence::{PostgresDedupStore, PostgresTotalsStore};
use sumline_totalizer::service::TotalizerService;
use sumline_totalizer::sweeper::{DedupSweeper, SweeperConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = ConfigLoader::new(None).load_totalizer_config()?;

    init_tracing(&TracingConfig::new("totalizer", &config.logging.level));
    info!("Starting totalizer service");

    let pool = sumline_shared::db::connect_pool(&config.database).await?;

    let dedup = Arc::new(PostgresDedupStore::new(pool.clone()));
    dedup.run_migrations().await?;
    let totals = Arc::new(PostgresTotalsStore::new(pool.clone()));
    totals.run_migrations().await?;
    info!("Database migrations completed");

    let metrics = Arc::new(PipelineMetrics::new()?);

    let shutdown = GracefulShutdown::new(ShutdownConfig::default());
    start_signal_handler(&shutdown);

    let processor = EventProcessor::new(
        pool.clone(),
        dedup.clone(),
        totals.clone(),
        metrics.clone(),
        TOPIC,
    );
    let consumer = EventConsumer::connect(
        &config.nats,
        ConsumerConfig::from(&config.consumer),
        processor,
    )
    .await?;
    let consumer_handle = consumer.start(&shutdown);

    let sweeper = DedupSweeper::new(dedup, SweeperConfig::from(&config.consumer));
    let sweeper_handle = sweeper.start(&shutdown);

    let state = AppState {
        service: Arc::new(TotalizerService::new(totals)),
        metrics,
    };

    let listener = tokio::net::TcpListener::bind(config.http.bind_address).await?;
    info!("Totalizer service listening on {}", config.http.bind_address);

    let mut http_shutdown = shutdown.subscribe();
    axum::serve(listener, api::router(state))
        .with_graceful_shutdown(async move {
            http_shutdown.recv().await;
        })
        .await?;

    // Let the consumer finish its transaction-plus-ack pair and the
    // sweeper its current pass, bounded by the shutdown deadline
    let _ = tokio::time::timeout(shutdown.timeout(), async {
        let _ = consumer_handle.await;
        let _ = sweeper_handle.await;
    })
    .await;

    info!("Shutdown complete");
    Ok(())
}
