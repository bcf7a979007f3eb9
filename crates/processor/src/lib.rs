//! SB Analytics - Event processor
//!
//! Consumes the domain queues and materializes hourly presence facts, the
//! customer snapshot, and license state.
//!
//! # Architecture
//!
//! ```text
//! [Broker queues]        [Workers]                 [Postgres]
//!   raw.q     ──┐                                   processed_events
//!   geo.q     ──┤   one task per queue,             presence + agg_* tables
//!   license.q ──┼─→ shared MessageHandler  ──tx──→  license_state
//!   session.q ──┤   (decode → dedup →               customer_360
//!   ...       ──┘    dispatch → ack)
//! ```
//!
//! Exclusion comes solely from the `processed_events` ledger; workers hold
//! no locks across messages and retries are paced by republishing with an
//! incremented header, never by nacking.

mod classify;
mod error;
mod geo;
mod handler;
mod license;
mod metrics;
mod worker;

pub use classify::{classify, classify_sqlstate, ErrorKind};
pub use error::{ProcessorError, Result};
pub use handler::{dispose_failure, retry_delay, Disposition, MessageHandler, Outcome};
pub use metrics::{ProcessorMetrics, ProcessorMetricsSnapshot};

use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use sb_config::{BrokerConfig, ProcessorConfig};
use sb_geo::GeoClassifier;
use sb_protocol::DOMAIN_TOPICS;
use sb_store::reference::load_reference_index;


/// The processor: a pool of queue workers plus a reference refresh task.
pub struct Processor {
    pool: PgPool,
    broker_config: BrokerConfig,
    config: ProcessorConfig,
    classifier: Arc<GeoClassifier>,
    handler: Arc<MessageHandler>,
}

impl Processor {
    /// Load the reference snapshot and build the shared handler.
    pub async fn new(
        pool: PgPool,
        broker_config: BrokerConfig,
        config: ProcessorConfig,
        strict_envelope: bool,
    ) -> Result<Self> {
        let mut conn = pool.acquire().await.map_err(sb_store::StoreError::from)?;
        let reference = load_reference_index(&mut *conn).await?;
        info!(
            places = reference.place_count(),
            admin_areas = reference.admin_area_count(),
            "reference geometries loaded"
        );

        let classifier = Arc::new(GeoClassifier::new(reference));
        let handler = Arc::new(MessageHandler::new(
            pool.clone(),
            Arc::clone(&classifier),
            config.clone(),
            strict_envelope,
        ));

        Ok(Self {
            pool,
            broker_config,
            config,
            classifier,
            handler,
        })
    }

    pub fn metrics(&self) -> Arc<ProcessorMetrics> {
        Arc::clone(&self.handler.metrics)
    }

    /// Run all workers until shutdown, then drain and report.
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            consumer_group = %self.config.consumer_group,
            prefetch = self.config.prefetch,
            queues = DOMAIN_TOPICS.len(),
            "processor starting"
        );

        let mut tasks = Vec::with_capacity(DOMAIN_TOPICS.len() + 1);

        for topic in DOMAIN_TOPICS {
            let tag = format!(
                "{}-{}",
                self.config.consumer_group,
                topic.rsplit('.').next().unwrap_or("queue")
            );
            tasks.push(tokio::spawn(worker::run_worker(
                Arc::clone(&self.handler),
                self.broker_config.clone(),
                topic,
                self.config.prefetch,
                tag,
                shutdown.clone(),
            )));
        }

        tasks.push(tokio::spawn(refresh_reference(
            self.pool.clone(),
            Arc::clone(&self.classifier),
            Duration::from_secs(self.config.reference_refresh_secs),
            shutdown.clone(),
        )));

        for task in tasks {
            let _ = task.await;
        }

        let snapshot = self.handler.metrics.snapshot();
        info!(
            consumed = snapshot.consumed,
            processed = snapshot.processed,
            deduped = snapshot.deduped,
            opted_out = snapshot.opted_out,
            retried = snapshot.retried,
            dlq = snapshot.dlq,
            requeued = snapshot.requeued,
            "processor shutting down"
        );
    }
}

/// Periodically reload the reference geometries and swap the snapshot.
async fn refresh_reference(
    pool: PgPool,
    classifier: Arc<GeoClassifier>,
    interval: Duration,
    shutdown: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.tick().await; // immediate first tick; boot already loaded

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let result = async {
            let mut conn = pool.acquire().await.map_err(sb_store::StoreError::from)?;
            load_reference_index(&mut *conn).await
        }
        .await;

        match result {
            Ok(reference) => {
                info!(
                    places = reference.place_count(),
                    admin_areas = reference.admin_area_count(),
                    "reference geometries refreshed"
                );
                classifier.swap_reference(reference);
            }
            Err(e) => warn!(error = %e, "reference refresh failed"),
        }
    }
}
