//! SB Analytics - Outbox publisher
//!
//! The only producer to the topic exchange. Drains the outbox in leased
//! batches:
//!
//! 1. **Lease** up to N pending rows (`FOR UPDATE SKIP LOCKED`, stamping
//!    `locked_at`); leases from dead replicas expire on a timeout.
//! 2. **Publish** each row persistently with a publisher confirm, headers
//!    carrying the event identity.
//! 3. **Finalize**: confirm marks the row `sent`; any failure schedules the
//!    next attempt with capped jittered exponential backoff, parking the row
//!    as `failed` when the retry cap is hit.
//!
//! Topology is re-declared on every (re)connect.

mod backoff;
mod metrics;

pub use backoff::next_attempt_delay;
pub use metrics::{PublisherMetrics, PublisherMetricsSnapshot};

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use sb_broker::{Broker, EventPublisher, MessageHeaders};
use sb_config::{BrokerConfig, PublisherConfig};
use sb_store::outbox::{self, OutboxRow};

/// Long-lived outbox drain loop
pub struct OutboxPublisher {
    pool: PgPool,
    broker_config: BrokerConfig,
    config: PublisherConfig,
    metrics: Arc<PublisherMetrics>,
}

impl OutboxPublisher {
    pub fn new(pool: PgPool, broker_config: BrokerConfig, config: PublisherConfig) -> Self {
        Self {
            pool,
            broker_config,
            config,
            metrics: Arc::new(PublisherMetrics::new()),
        }
    }

    pub fn metrics(&self) -> Arc<PublisherMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Run until shutdown. Broker loss is handled by reconnecting and
    /// re-declaring topology; rows touched in between simply retry later.
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            lease_size = self.config.lease_size,
            max_retries = self.config.max_retries,
            "outbox publisher starting"
        );

        'reconnect: while !shutdown.is_cancelled() {
            let publisher = match self.connect(&shutdown).await {
                Some(p) => p,
                None => break,
            };
            info!("broker online, topology declared");

            while !shutdown.is_cancelled() {
                let rows = match self.lease().await {
                    Ok(rows) => rows,
                    Err(e) => {
                        warn!(error = %e, "outbox lease failed");
                        if self.idle(&shutdown).await {
                            break 'reconnect;
                        }
                        continue;
                    }
                };

                if rows.is_empty() {
                    if self.idle(&shutdown).await {
                        break 'reconnect;
                    }
                    continue;
                }

                self.metrics.record_leased(rows.len() as u64);
                for row in rows {
                    if let Err(broken) = self.publish_row(&publisher, row).await {
                        if broken {
                            self.metrics.record_reconnect();
                            warn!("publish channel lost, reconnecting");
                            continue 'reconnect;
                        }
                    }
                }
            }
        }

        let snapshot = self.metrics.snapshot();
        info!(
            rows_leased = snapshot.rows_leased,
            rows_sent = snapshot.rows_sent,
            rows_retried = snapshot.rows_retried,
            rows_parked = snapshot.rows_parked,
            reconnects = snapshot.reconnects,
            "outbox publisher shutting down"
        );
    }

    /// Connect and open a confirming publisher, retrying until shutdown.
    async fn connect(&self, shutdown: &CancellationToken) -> Option<EventPublisher> {
        loop {
            match Broker::connect(&self.broker_config).await {
                Ok(broker) => match broker.publisher().await {
                    Ok(publisher) => return Some(publisher),
                    Err(e) => warn!(error = %e, "publisher channel setup failed"),
                },
                Err(e) => warn!(error = %e, "broker connect failed"),
            }

            let wait = Duration::from_secs(self.broker_config.reconnect_secs);
            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = shutdown.cancelled() => return None,
            }
        }
    }

    async fn lease(&self) -> sb_store::Result<Vec<OutboxRow>> {
        let mut conn = self.pool.acquire().await.map_err(sb_store::StoreError::from)?;
        outbox::lease_batch(
            &mut *conn,
            self.config.lease_size,
            self.config.lease_timeout_secs as f64,
        )
        .await
    }

    /// Publish one row and finalize its outbox state.
    ///
    /// `Err(true)` signals a broken channel that needs a reconnect.
    async fn publish_row(
        &self,
        publisher: &EventPublisher,
        row: OutboxRow,
    ) -> std::result::Result<(), bool> {
        let headers = MessageHeaders {
            app_uuid: row.app_uuid,
            event_id: row.event_id,
            trace_id: row.trace_id,
            occurred_at: row.occurred_at,
        };

        let publish_result = publisher
            .publish_json(&row.routing_key, &row.payload, headers.to_field_table())
            .await;

        match publish_result {
            Ok(()) => {
                if let Err(e) = self.finalize_sent(row.id).await {
                    // The broker has the message; the stale lease will retry
                    // the row and the consumer's ledger dedupes the repeat.
                    warn!(outbox_id = row.id, error = %e, "failed to mark row sent");
                } else {
                    debug!(outbox_id = row.id, routing_key = %row.routing_key, "row sent");
                    self.metrics.record_sent();
                }
                Ok(())
            }
            Err(e) => {
                let delay = next_attempt_delay(
                    row.retries,
                    Duration::from_secs(self.config.backoff_base_secs),
                    Duration::from_secs(self.config.backoff_max_secs),
                    &mut rand::rng(),
                );
                let next_attempt = Utc::now()
                    + chrono::Duration::from_std(delay).unwrap_or(chrono::Duration::zero());

                let parked = row.retries + 1 >= self.config.max_retries;
                if let Err(db_err) = self
                    .finalize_failed(row.id, &e.to_string(), next_attempt)
                    .await
                {
                    warn!(outbox_id = row.id, error = %db_err, "failed to record publish failure");
                } else if parked {
                    warn!(
                        outbox_id = row.id,
                        routing_key = %row.routing_key,
                        retries = row.retries + 1,
                        "row parked as failed"
                    );
                    self.metrics.record_parked();
                } else {
                    debug!(
                        outbox_id = row.id,
                        retries = row.retries + 1,
                        next_attempt = %next_attempt,
                        error = %e,
                        "publish failed, will retry"
                    );
                    self.metrics.record_retried();
                }

                Err(!publisher.is_open())
            }
        }
    }

    async fn finalize_sent(&self, id: i64) -> sb_store::Result<()> {
        let mut conn = self.pool.acquire().await.map_err(sb_store::StoreError::from)?;
        outbox::mark_sent(&mut *conn, id).await
    }

    async fn finalize_failed(
        &self,
        id: i64,
        error: &str,
        next_attempt: chrono::DateTime<Utc>,
    ) -> sb_store::Result<()> {
        let mut conn = self.pool.acquire().await.map_err(sb_store::StoreError::from)?;
        outbox::mark_attempt_failed(&mut *conn, id, error, next_attempt, self.config.max_retries)
            .await
    }

    /// Sleep the idle interval; returns true when shutdown fired.
    async fn idle(&self, shutdown: &CancellationToken) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_millis(self.config.idle_poll_ms)) => false,
            _ = shutdown.cancelled() => true,
        }
    }

}
