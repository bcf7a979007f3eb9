//! Queue workers
//!
//! One worker per domain queue. Each worker owns its broker connection (one
//! consuming channel, one confirming publish channel for retries and DLQ)
//! and reconnects with a delay when either drops. On shutdown the worker
//! stops taking deliveries and finishes the one in flight.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use lapin::options::{BasicAckOptions, BasicNackOptions};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use sb_broker::Broker;
use sb_config::BrokerConfig;

use crate::handler::{MessageHandler, Outcome};

/// Consume one domain queue until shutdown.
pub async fn run_worker(
    handler: Arc<MessageHandler>,
    broker_config: BrokerConfig,
    topic: &'static str,
    prefetch: u16,
    consumer_tag: String,
    shutdown: CancellationToken,
) {
    'reconnect: while !shutdown.is_cancelled() {
        let session = match open_session(&broker_config, topic, prefetch, &consumer_tag).await {
            Ok(session) => session,
            Err(e) => {
                warn!(topic, error = %e, "worker connect failed");
                let wait = Duration::from_secs(broker_config.reconnect_secs);
                tokio::select! {
                    _ = tokio::time::sleep(wait) => continue 'reconnect,
                    _ = shutdown.cancelled() => break 'reconnect,
                }
            }
        };
        // The broker handle must outlive the channels it opened.
        let (_broker, publisher, mut consumer) = session;
        info!(topic, "worker consuming");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break 'reconnect,
                delivery = consumer.next() => {
                    let delivery = match delivery {
                        Some(Ok(delivery)) => delivery,
                        Some(Err(e)) => {
                            warn!(topic, error = %e, "consume stream error, reconnecting");
                            continue 'reconnect;
                        }
                        None => {
                            warn!(topic, "consume stream closed, reconnecting");
                            continue 'reconnect;
                        }
                    };

                    match handler.handle(&publisher, topic, &delivery).await {
                        Outcome::Ack => {
                            if let Err(e) = delivery.ack(BasicAckOptions::default()).await {
                                warn!(topic, error = %e, "ack failed, reconnecting");
                                continue 'reconnect;
                            }
                        }
                        Outcome::Requeue => {
                            let options = BasicNackOptions {
                                requeue: true,
                                ..Default::default()
                            };
                            if let Err(e) = delivery.nack(options).await {
                                warn!(topic, error = %e, "nack failed, reconnecting");
                                continue 'reconnect;
                            }
                        }
                    }
                }
            }
        }
    }

    info!(topic, "worker stopped");
}

async fn open_session(
    broker_config: &BrokerConfig,
    topic: &'static str,
    prefetch: u16,
    consumer_tag: &str,
) -> sb_broker::Result<(Broker, sb_broker::EventPublisher, lapin::Consumer)> {
    let broker = Broker::connect(broker_config).await?;
    let publisher = broker.publisher().await?;
    let channel = broker.consumer_channel(prefetch).await?;
    let consumer = Broker::consume(&channel, topic, consumer_tag).await?;
    Ok((broker, publisher, consumer))
}
