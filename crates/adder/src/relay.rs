//! Outbox Relay
//!
//! Background service that drains the outbox table into the message log
//! with at-least-once delivery, preserving per-aggregate ordering, and
//! garbage-collecting published rows after a retention window.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use sumline_shared::config::RelaySettings;
use sumline_shared::shutdown::{GracefulShutdown, ShutdownReceiver};
use sumline_shared::telemetry::{PipelineMetrics, ProduceStatus};

use crate::domain::{EventPublisher, OutboxError, OutboxRepository};

/// Configuration for the Outbox Relay
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Cadence between publish batches
    pub poll_interval: Duration,
    /// Maximum rows claimed per batch
    pub batch_size: i64,
    /// Publish attempts before an event is quarantined
    pub max_retries: i32,
    /// Cadence of the garbage-collection loop
    pub cleanup_interval: Duration,
    /// Age threshold for deleting published rows
    pub retention: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            batch_size: 100,
            max_retries: 5,
            cleanup_interval: Duration::from_secs(60 * 60),
            retention: Duration::from_secs(7 * 24 * 60 * 60),
        }
    }
}

impl From<&RelaySettings> for RelayConfig {
    fn from(settings: &RelaySettings) -> Self {
        Self {
            poll_interval: settings.poll_interval(),
            batch_size: settings.batch_size,
            max_retries: settings.max_retries,
            cleanup_interval: settings.cleanup_interval(),
            retention: settings.retention(),
        }
    }
}

/// Join handle pair for the relay's two workers
pub struct RelayHandle {
    publish: JoinHandle<()>,
    cleanup: JoinHandle<()>,
}

impl RelayHandle {
    /// Wait for both workers to exit. Called after the shutdown signal
    /// has been broadcast.
    pub async fn join(self) {
        let _ = self.publish.await;
        let _ = self.cleanup.await;
    }
}

/// Outbox Relay Service
///
/// Reads pending events from the outbox table and publishes them to the
/// log. Two independent workers: the publish loop and the cleanup loop.
pub struct OutboxRelay<R, P> {
    repository: Arc<R>,
    publisher: Arc<P>,
    config: RelayConfig,
    metrics: Arc<PipelineMetrics>,
    topic: String,
}

impl<R, P> OutboxRelay<R, P>
where
    R: OutboxRepository + 'static,
    P: EventPublisher + 'static,
{
    pub fn new(
        repository: Arc<R>,
        publisher: Arc<P>,
        config: RelayConfig,
        metrics: Arc<PipelineMetrics>,
        topic: &str,
    ) -> Self {
        Self {
            repository,
            publisher,
            config,
            metrics,
            topic: topic.to_string(),
        }
    }

    /// Launch the publish and cleanup workers.
    ///
    /// Both exit on the next loop boundary once the coordinator
    /// broadcasts shutdown.
    pub fn start(self, shutdown: &GracefulShutdown) -> RelayHandle {
        info!(
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            batch_size = self.config.batch_size,
            max_retries = self.config.max_retries,
            "Starting outbox relay"
        );

        let relay = Arc::new(self);

        let publish = tokio::spawn({
            let relay = relay.clone();
            let rx = shutdown.subscribe();
            async move { relay.run_publish_loop(rx).await }
        });

        let cleanup = tokio::spawn({
            let relay = relay.clone();
            let rx = shutdown.subscribe();
            async move { relay.run_cleanup_loop(rx).await }
        });

        RelayHandle { publish, cleanup }
    }

    async fn run_publish_loop(&self, mut shutdown: ShutdownReceiver) {
        let mut interval = tokio::time::interval(self.config.poll_interval);

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    info!("Outbox relay publish loop shutting down");
                    break;
                }
                _ = interval.tick() => {
                    match self.process_batch().await {
                        Ok(published) if published > 0 => {
                            debug!(published, "Outbox batch published");
                        }
                        Ok(_) => {}
                        Err(e) => {
                            warn!(error = %e, "Error processing outbox batch");
                        }
                    }
                }
            }
        }
    }

    /// Claim and publish one batch of unpublished events.
    ///
    /// Events are sent serially in `created_at` order, which is what
    /// preserves per-aggregate ordering in the log. A publish failure
    /// marks the row failed and moves on; the row is retried next tick
    /// until its budget is exhausted.
    pub async fn process_batch(&self) -> Result<usize, OutboxError> {
        let events = self
            .repository
            .fetch_unpublished(self.config.batch_size)
            .await?;

        let mut published = 0usize;

        for mut event in events {
            if event.is_quarantined(self.config.max_retries) {
                warn!(
                    event_id = %event.id,
                    retry_count = event.retry_count,
                    "Event exceeded max retries, leaving for operator"
                );
                continue;
            }

            // Stamped before the log write: the wire envelope carries the
            // intent-to-publish instant the consumer measures against
            let published_at = Utc::now();
            event.published_at = Some(published_at);

            match self.publisher.publish(&event).await {
                Ok(()) => {
                    self.metrics.record_produced(&self.topic, ProduceStatus::Success);
                    if let Err(e) = self.repository.mark_published(event.id, published_at).await {
                        // The log already accepted the message; on the next
                        // tick the row is republished and the consumer's
                        // dedup store absorbs the duplicate
                        error!(event_id = %event.id, error = %e, "Failed to mark event published");
                        continue;
                    }
                    published += 1;
                }
                Err(e) => {
                    error!(event_id = %event.id, error = %e, "Failed to publish event");
                    self.metrics.record_produced(&self.topic, ProduceStatus::Error);
                    if let Err(mark_err) =
                        self.repository.mark_failed(event.id, &e.to_string()).await
                    {
                        error!(
                            event_id = %event.id,
                            error = %mark_err,
                            "Failed to record publish failure"
                        );
                    }
                }
            }
        }

        Ok(published)
    }

    async fn run_cleanup_loop(&self, mut shutdown: ShutdownReceiver) {
        let mut interval = tokio::time::interval(self.config.cleanup_interval);

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    info!("Outbox relay cleanup loop shutting down");
                    break;
                }
                _ = interval.tick() => {
                    match self.repository.cleanup_old_events(self.config.retention).await {
                        Ok(0) => {}
                        Ok(deleted) => {
                            info!(deleted, "Outbox cleanup removed published events");
                        }
                        Err(e) => {
                            warn!(error = %e, "Outbox cleanup failed");
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        OutboxEvent, OutboxRepositoryTx, OutboxStats, PublishError,
    };
    use chrono::{DateTime, Utc};
    use sqlx::PgTransaction;
    use std::collections::HashSet;
    use std::sync::Mutex;
    use uuid::Uuid;

    struct MockOutboxRepository {
        events: Mutex<Vec<OutboxEvent>>,
        fail_mark_published_once: Mutex<bool>,
    }

    impl MockOutboxRepository {
        fn new() -> Self {
            Self {
                events: Mutex::new(Vec::new()),
                fail_mark_published_once: Mutex::new(false),
            }
        }

        fn push(&self, event: OutboxEvent) {
            self.events.lock().unwrap().push(event);
        }

        fn get(&self, id: Uuid) -> OutboxEvent {
            self.events
                .lock()
                .unwrap()
                .iter()
                .find(|e| e.id == id)
                .cloned()
                .unwrap()
        }
    }

    #[async_trait::async_trait]
    impl OutboxRepositoryTx for MockOutboxRepository {
        async fn insert_in_tx(
            &self,
            _tx: &mut PgTransaction<'_>,
            event: &OutboxEvent,
        ) -> Result<(), OutboxError> {
            self.push(event.clone());
            Ok(())
        }
    }

    #[async_trait::async_trait]
    impl OutboxRepository for MockOutboxRepository {
        async fn fetch_unpublished(&self, limit: i64) -> Result<Vec<OutboxEvent>, OutboxError> {
            let mut pending: Vec<OutboxEvent> = self
                .events
                .lock()
                .unwrap()
                .iter()
                .filter(|e| e.published_at.is_none())
                .cloned()
                .collect();
            pending.sort_by_key(|e| e.created_at);
            pending.truncate(limit as usize);
            Ok(pending)
        }

        async fn mark_published(
            &self,
            id: Uuid,
            published_at: DateTime<Utc>,
        ) -> Result<(), OutboxError> {
            let mut fail_once = self.fail_mark_published_once.lock().unwrap();
            if *fail_once {
                *fail_once = false;
                return Err(OutboxError::Database(sqlx::Error::PoolClosed));
            }
            drop(fail_once);

            let mut events = self.events.lock().unwrap();
            if let Some(event) = events.iter_mut().find(|e| e.id == id) {
                event.published_at = Some(published_at);
            }
            Ok(())
        }

        async fn mark_failed(&self, id: Uuid, error: &str) -> Result<(), OutboxError> {
            let mut events = self.events.lock().unwrap();
            if let Some(event) = events.iter_mut().find(|e| e.id == id) {
                event.retry_count += 1;
                event.last_error = Some(error.to_string());
            }
            Ok(())
        }

        async fn cleanup_old_events(&self, retention: Duration) -> Result<u64, OutboxError> {
            let cutoff = Utc::now() - chrono::Duration::from_std(retention).unwrap();
            let mut events = self.events.lock().unwrap();
            let before = events.len();
            events.retain(|e| match e.published_at {
                Some(published_at) => published_at >= cutoff,
                None => true,
            });
            Ok((before - events.len()) as u64)
        }

        async fn fetch_quarantined(
            &self,
            max_retries: i32,
        ) -> Result<Vec<OutboxEvent>, OutboxError> {
            Ok(self
                .events
                .lock()
                .unwrap()
                .iter()
                .filter(|e| e.published_at.is_none() && e.retry_count >= max_retries)
                .cloned()
                .collect())
        }

        async fn requeue(&self, id: Uuid) -> Result<(), OutboxError> {
            let mut events = self.events.lock().unwrap();
            match events
                .iter_mut()
                .find(|e| e.id == id && e.published_at.is_none())
            {
                Some(event) => {
                    event.retry_count = 0;
                    event.last_error = None;
                    Ok(())
                }
                None => Err(OutboxError::NotFound(id)),
            }
        }

        async fn stats(&self, max_retries: i32) -> Result<OutboxStats, OutboxError> {
            let events = self.events.lock().unwrap();
            let pending = events
                .iter()
                .filter(|e| e.published_at.is_none() && e.retry_count < max_retries)
                .count() as u64;
            let published = events.iter().filter(|e| e.published_at.is_some()).count() as u64;
            let quarantined = events
                .iter()
                .filter(|e| e.published_at.is_none() && e.retry_count >= max_retries)
                .count() as u64;
            Ok(OutboxStats {
                pending_count: pending,
                published_count: published,
                quarantined_count: quarantined,
                oldest_pending_age_seconds: None,
            })
        }
    }

    struct MockEventPublisher {
        published: Mutex<Vec<OutboxEvent>>,
        fail_ids: Mutex<HashSet<Uuid>>,
    }

    impl MockEventPublisher {
        fn new() -> Self {
            Self {
                published: Mutex::new(Vec::new()),
                fail_ids: Mutex::new(HashSet::new()),
            }
        }

        fn fail_for(&self, id: Uuid) {
            self.fail_ids.lock().unwrap().insert(id);
        }

        fn published(&self) -> Vec<OutboxEvent> {
            self.published.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl EventPublisher for MockEventPublisher {
        async fn publish(&self, event: &OutboxEvent) -> Result<(), PublishError> {
            if self.fail_ids.lock().unwrap().contains(&event.id) {
                return Err(PublishError::Publish("broker unavailable".to_string()));
            }
            self.published.lock().unwrap().push(event.clone());
            Ok(())
        }
    }

    fn relay(
        repo: &Arc<MockOutboxRepository>,
        publisher: &Arc<MockEventPublisher>,
    ) -> OutboxRelay<MockOutboxRepository, MockEventPublisher> {
        OutboxRelay::new(
            repo.clone(),
            publisher.clone(),
            RelayConfig::default(),
            Arc::new(PipelineMetrics::new().unwrap()),
            "sums",
        )
    }

    fn staggered_event(x: i64, offset_ms: i64) -> OutboxEvent {
        let mut event = OutboxEvent::sum_calculated(x, 0, x).unwrap();
        event.created_at = Utc::now() + chrono::Duration::milliseconds(offset_ms);
        event
    }

    #[tokio::test]
    async fn test_batch_publishes_in_insertion_order() {
        let repo = Arc::new(MockOutboxRepository::new());
        let publisher = Arc::new(MockEventPublisher::new());

        for (i, result) in [1i64, 2, 3].iter().enumerate() {
            repo.push(staggered_event(*result, i as i64 * 10));
        }

        let published = relay(&repo, &publisher).process_batch().await.unwrap();
        assert_eq!(published, 3);

        let results: Vec<i64> = publisher
            .published()
            .iter()
            .map(|e| e.payload["result"].as_i64().unwrap())
            .collect();
        assert_eq!(results, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_wire_timestamp_matches_stored_timestamp() {
        let repo = Arc::new(MockOutboxRepository::new());
        let publisher = Arc::new(MockEventPublisher::new());

        let event = OutboxEvent::sum_calculated(5, 3, 8).unwrap();
        let id = event.id;
        repo.push(event);

        relay(&repo, &publisher).process_batch().await.unwrap();

        let on_wire = publisher.published()[0].published_at.unwrap();
        let stored = repo.get(id).published_at.unwrap();
        assert_eq!(on_wire, stored);
    }

    #[tokio::test]
    async fn test_publish_failure_marks_failed_and_continues() {
        let repo = Arc::new(MockOutboxRepository::new());
        let publisher = Arc::new(MockEventPublisher::new());

        let ok_before = staggered_event(1, 0);
        let failing = staggered_event(2, 10);
        let ok_after = staggered_event(3, 20);
        let failing_id = failing.id;
        publisher.fail_for(failing_id);

        repo.push(ok_before);
        repo.push(failing);
        repo.push(ok_after);

        let published = relay(&repo, &publisher).process_batch().await.unwrap();
        assert_eq!(published, 2);

        let failed = repo.get(failing_id);
        assert_eq!(failed.retry_count, 1);
        assert_eq!(failed.last_error.as_deref(), Some("broker unavailable"));
        assert!(failed.published_at.is_none());
    }

    #[tokio::test]
    async fn test_retry_budget_quarantines_event() {
        let repo = Arc::new(MockOutboxRepository::new());
        let publisher = Arc::new(MockEventPublisher::new());

        let event = OutboxEvent::sum_calculated(5, 3, 8).unwrap();
        let id = event.id;
        publisher.fail_for(id);
        repo.push(event);

        let relay = relay(&repo, &publisher);

        // Five failing rounds exhaust the budget
        for _ in 0..5 {
            relay.process_batch().await.unwrap();
        }
        let quarantined = repo.get(id);
        assert_eq!(quarantined.retry_count, 5);
        assert!(quarantined.published_at.is_none());
        assert!(quarantined.last_error.is_some());

        // Further rounds no longer attempt the event
        relay.process_batch().await.unwrap();
        assert_eq!(repo.get(id).retry_count, 5);
        assert_eq!(repo.fetch_quarantined(5).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_quarantined_event_does_not_block_others() {
        let repo = Arc::new(MockOutboxRepository::new());
        let publisher = Arc::new(MockEventPublisher::new());

        let mut stuck = staggered_event(1, 0);
        stuck.retry_count = 5;
        let flowing = staggered_event(2, 10);
        let flowing_id = flowing.id;

        repo.push(stuck);
        repo.push(flowing);

        let published = relay(&repo, &publisher).process_batch().await.unwrap();
        assert_eq!(published, 1);
        assert!(repo.get(flowing_id).published_at.is_some());
    }

    #[tokio::test]
    async fn test_mark_published_failure_causes_republish() {
        let repo = Arc::new(MockOutboxRepository::new());
        let publisher = Arc::new(MockEventPublisher::new());

        let event = OutboxEvent::sum_calculated(5, 3, 8).unwrap();
        let id = event.id;
        repo.push(event);
        *repo.fail_mark_published_once.lock().unwrap() = true;

        let relay = relay(&repo, &publisher);

        // The log accepted the message but the mark did not stick
        let published = relay.process_batch().await.unwrap();
        assert_eq!(published, 0);
        assert!(repo.get(id).published_at.is_none());

        // The next tick republishes: at-least-once, absorbed downstream
        let published = relay.process_batch().await.unwrap();
        assert_eq!(published, 1);

        let sent: Vec<Uuid> = publisher.published().iter().map(|e| e.id).collect();
        assert_eq!(sent, vec![id, id]);
    }

    #[tokio::test]
    async fn test_cleanup_spares_quarantined_rows() {
        let repo = Arc::new(MockOutboxRepository::new());
        let publisher = Arc::new(MockEventPublisher::new());

        let mut old_published = OutboxEvent::sum_calculated(1, 1, 2).unwrap();
        old_published.published_at = Some(Utc::now() - chrono::Duration::days(8));
        let mut quarantined = OutboxEvent::sum_calculated(2, 2, 4).unwrap();
        quarantined.retry_count = 5;
        quarantined.created_at = Utc::now() - chrono::Duration::days(30);

        repo.push(old_published);
        repo.push(quarantined);

        let relay = relay(&repo, &publisher);
        let deleted = repo
            .cleanup_old_events(relay.config.retention)
            .await
            .unwrap();

        assert_eq!(deleted, 1);
        assert_eq!(repo.fetch_quarantined(5).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_start_and_shutdown() {
        use sumline_shared::shutdown::{ShutdownConfig, ShutdownReason};

        let repo = Arc::new(MockOutboxRepository::new());
        let publisher = Arc::new(MockEventPublisher::new());
        repo.push(OutboxEvent::sum_calculated(5, 3, 8).unwrap());

        let shutdown = GracefulShutdown::new(ShutdownConfig {
            enable_signals: false,
            ..Default::default()
        });

        let mut config = RelayConfig::default();
        config.poll_interval = Duration::from_millis(10);
        let relay = OutboxRelay::new(
            repo.clone(),
            publisher.clone(),
            config,
            Arc::new(PipelineMetrics::new().unwrap()),
            "sums",
        );

        let handle = relay.start(&shutdown);
        tokio::time::sleep(Duration::from_millis(100)).await;
        shutdown.shutdown(ShutdownReason::Programmatic("test".to_string()));

        tokio::time::timeout(Duration::from_secs(1), handle.join())
            .await
            .expect("relay workers should exit on shutdown");

        assert_eq!(publisher.published().len(), 1);
    }
}
