//! Per-message state machine
//!
//! `received → decoded → dedup-checked → dispatched → acked`, with side
//! exits to a retry republish (incremented `sb_retry` header) and the DLQ.
//! The terminal state is always an ack; broker-level redelivery is never
//! used for retry pacing.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use lapin::message::Delivery;
use parking_lot::Mutex;
use serde_json::Value;
use sqlx::PgPool;
use tracing::{debug, warn};
use uuid::Uuid;

use sb_broker::{retry_count, with_retry_headers, EventPublisher};
use sb_config::ProcessorConfig;
use sb_geo::GeoClassifier;
use sb_protocol::{
    DlqMessage, DlqReason, DlqSource, Envelope, EnvelopeMode, EventFamily, NormalizedEvent,
    TOPIC_GEO, TOPIC_LICENSE,
};
use sb_store::{customer, optout, processed};

use crate::classify::{classify, ErrorKind};
use crate::error::ProcessorError;
use crate::geo::{self, H3CellCache};
use crate::license;
use crate::metrics::ProcessorMetrics;

/// What the worker should do with the original delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Processing reached a terminal state; ack the delivery
    Ack,
    /// The retry republish itself failed; nack with requeue
    Requeue,
}

/// Side exit chosen for a failed message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// Republish with the retry header bumped after this delay
    Retry { delay: Duration, next_retry: u32 },
    /// Publish to the DLQ
    DeadLetter(DlqReason),
}

/// Decide the side exit for a failure.
pub fn dispose_failure(
    error: &ProcessorError,
    retry: u32,
    config: &ProcessorConfig,
) -> Disposition {
    match classify(error) {
        ErrorKind::Permanent => Disposition::DeadLetter(dlq_reason(error)),
        ErrorKind::Transient if retry < config.max_retries => Disposition::Retry {
            delay: retry_delay(retry, config),
            next_retry: retry + 1,
        },
        ErrorKind::Transient => Disposition::DeadLetter(DlqReason::PermanentBusiness),
    }
}

/// Exponential retry delay, capped.
pub fn retry_delay(retry: u32, config: &ProcessorConfig) -> Duration {
    let shift = retry.min(20);
    let ms = config.retry_base_ms.saturating_mul(1u64 << shift);
    Duration::from_millis(ms.min(config.retry_max_ms))
}

fn dlq_reason(error: &ProcessorError) -> DlqReason {
    match error {
        ProcessorError::Envelope(_) => DlqReason::MinimalEvent,
        _ => DlqReason::PermanentBusiness,
    }
}

/// How one message finished inside the transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Processed {
    Done,
    Deduped,
    OptedOut,
}

/// Connection-independent message processing state, shared by all workers
pub struct MessageHandler {
    pool: PgPool,
    classifier: Arc<GeoClassifier>,
    config: ProcessorConfig,
    mode: EnvelopeMode,
    optout_cache: Mutex<HashSet<(Uuid, String)>>,
    h3_cache: H3CellCache,
    pub metrics: Arc<ProcessorMetrics>,
}

impl MessageHandler {
    pub fn new(
        pool: PgPool,
        classifier: Arc<GeoClassifier>,
        config: ProcessorConfig,
        strict_envelope: bool,
    ) -> Self {
        Self {
            pool,
            classifier,
            config,
            mode: if strict_envelope {
                EnvelopeMode::Strict
            } else {
                EnvelopeMode::Lax
            },
            optout_cache: Mutex::new(HashSet::new()),
            h3_cache: H3CellCache::new(),
            metrics: Arc::new(ProcessorMetrics::new()),
        }
    }

    /// Drive one delivery through the state machine. The caller acks or
    /// nacks according to the returned outcome.
    pub async fn handle(
        &self,
        publisher: &EventPublisher,
        topic: &'static str,
        delivery: &Delivery,
    ) -> Outcome {
        self.metrics.record_consumed();

        let source = DlqSource {
            queue: sb_protocol::queue_name(topic),
            routing_key: delivery.routing_key.to_string(),
            delivery_tag: delivery.delivery_tag,
        };

        // received → decoded
        let doc: Value = match serde_json::from_slice(&delivery.data) {
            Ok(doc) => doc,
            Err(e) => {
                self.metrics.record_dlq();
                publisher
                    .publish_dlq(
                        &DlqMessage::new(DlqReason::JsonDecode, source, &delivery.data, None)
                            .with_error("JsonDecodeError", e.to_string()),
                    )
                    .await;
                return Outcome::Ack;
            }
        };
        if !doc.is_object() {
            self.metrics.record_dlq();
            publisher
                .publish_dlq(
                    &DlqMessage::new(
                        DlqReason::InvalidDocumentType,
                        source,
                        &delivery.data,
                        Some(doc.clone()),
                    )
                    .with_error(
                        "InvalidDocumentType",
                        "expected a JSON object".to_string(),
                    ),
                )
                .await;
            return Outcome::Ack;
        }

        // decoded → dedup-checked → dispatched
        match self.process(topic, &doc).await {
            Ok(Processed::Done) => {
                self.metrics.record_processed();
                Outcome::Ack
            }
            Ok(Processed::Deduped) => {
                self.metrics.record_deduped();
                debug!(queue = %source.queue, "duplicate delivery acked");
                Outcome::Ack
            }
            Ok(Processed::OptedOut) => {
                self.metrics.record_opted_out();
                Outcome::Ack
            }
            Err(error) => {
                let retry = retry_count(&delivery.properties);
                match dispose_failure(&error, retry, &self.config) {
                    Disposition::Retry { delay, next_retry } => {
                        warn!(
                            queue = %source.queue,
                            retry = next_retry,
                            max_retries = self.config.max_retries,
                            delay_ms = delay.as_millis(),
                            error = %error,
                            "transient failure, republishing"
                        );
                        tokio::time::sleep(delay).await;

                        let headers = with_retry_headers(
                            delivery.properties.headers().as_ref(),
                            next_retry,
                            chrono::Utc::now(),
                        );
                        match publisher
                            .publish(&source.routing_key, &delivery.data, headers)
                            .await
                        {
                            Ok(()) => {
                                self.metrics.record_retried();
                                Outcome::Ack
                            }
                            Err(e) => {
                                warn!(error = %e, "retry republish failed, requeueing");
                                self.metrics.record_requeued();
                                Outcome::Requeue
                            }
                        }
                    }
                    Disposition::DeadLetter(reason) => {
                        warn!(
                            queue = %source.queue,
                            reason = ?reason,
                            error = %error,
                            "dead-lettering message"
                        );
                        self.metrics.record_dlq();
                        publisher
                            .publish_dlq(
                                &DlqMessage::new(reason, source, &delivery.data, Some(doc))
                                    .with_error(error.kind_name(), error.to_string()),
                            )
                            .await;
                        Outcome::Ack
                    }
                }
            }
        }
    }

    /// Ledger identity for one queue's consumer.
    ///
    /// Scoped per queue, not per group: the same event fans out to the raw
    /// firehose and its family queue, and each materializer must run once.
    fn consumer_id(&self, topic: &str) -> String {
        let stem = topic.rsplit('.').next().unwrap_or(topic);
        format!("{}.{}", self.config.consumer_group, stem)
    }

    /// The transactional part: idempotency ledger, opt-out, dispatch.
    async fn process(&self, topic: &'static str, doc: &Value) -> crate::error::Result<Processed> {
        let mut tx = self.pool.begin().await.map_err(sb_store::StoreError::from)?;

        // Idempotency: claim the event for this queue's consumer before any
        // side effect. A collision means another delivery already won.
        if let Some((app_uuid, event_id)) = dedupe_identity(doc) {
            let claimed = processed::mark(
                &mut *tx,
                &self.consumer_id(topic),
                app_uuid,
                event_id,
            )
            .await?;
            if !claimed {
                return Ok(Processed::Deduped);
            }

            if self.is_opted_out(&mut tx, doc, app_uuid).await? {
                tx.commit().await.map_err(sb_store::StoreError::from)?;
                return Ok(Processed::OptedOut);
            }
        }

        let ev = Envelope::parse(doc, self.mode)?;
        self.dispatch(&mut tx, topic, &ev).await?;

        tx.commit().await.map_err(sb_store::StoreError::from)?;
        Ok(Processed::Done)
    }

    async fn dispatch(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        topic: &'static str,
        ev: &NormalizedEvent,
    ) -> crate::error::Result<()> {
        let family = ev.family();

        if topic == TOPIC_LICENSE || family == EventFamily::License {
            license::materialize(&mut **tx, ev).await
        } else if topic == TOPIC_GEO || family == EventFamily::Geo {
            geo::materialize(&mut **tx, &self.classifier, &self.h3_cache, ev).await
        } else {
            // raw / session / screen / ui / system: envelope minima are
            // verified by the parse; only the snapshot's last-event fields
            // move.
            customer::apply_event(&mut **tx, ev).await?;
            Ok(())
        }
    }

    async fn is_opted_out(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        doc: &Value,
        app_uuid: Uuid,
    ) -> crate::error::Result<bool> {
        let Some(anon_user_id) = doc.get("anon_user_id").and_then(Value::as_str) else {
            return Ok(false);
        };

        let key = (app_uuid, anon_user_id.to_string());
        if self.optout_cache.lock().contains(&key) {
            return Ok(true);
        }
        if optout::is_opted_out(&mut **tx, app_uuid, anon_user_id).await? {
            self.optout_cache.lock().insert(key);
            return Ok(true);
        }
        Ok(false)
    }
}

/// The `(app_uuid, event_id)` pair used for the idempotency ledger, when
/// both are present and well-formed. Documents without them fall through to
/// envelope validation.
fn dedupe_identity(doc: &Value) -> Option<(Uuid, Uuid)> {
    let app_uuid = doc
        .get("app_uuid")
        .and_then(Value::as_str)
        .and_then(|s| Uuid::parse_str(s.trim()).ok())?;
    let event_id = doc
        .get("event_id")
        .and_then(Value::as_str)
        .and_then(|s| Uuid::parse_str(s.trim()).ok())?;
    Some((app_uuid, event_id))
}
