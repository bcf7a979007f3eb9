//! Topology declaration
//!
//! One durable topic exchange, one durable queue per domain routing key plus
//! the DLQ, bound with routing keys identical to the queue stems. The raw
//! firehose and the P2 queues carry a protective policy (24h TTL, bounded
//! length, drop-head overflow) so an absent consumer cannot grow them
//! without bound.
//!
//! Declaration is idempotent; the publisher declares authoritatively on boot
//! and after every reconnect, the processor asserts the same shape.

use lapin::options::{ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions};
use lapin::types::{AMQPValue, FieldTable};
use lapin::{Channel, ExchangeKind};
use tracing::debug;

use sb_protocol::{queue_name, DOMAIN_TOPICS, EXCHANGE, PROTECTED_TOPICS, TOPIC_DLQ};

use crate::error::Result;

/// Message TTL for protected queues: 24 hours
const PROTECTED_MESSAGE_TTL_MS: i64 = 24 * 60 * 60 * 1000;

/// Maximum queued messages on protected queues
const PROTECTED_MAX_LENGTH: i64 = 100_000;

/// Declare the exchange and all queues with their bindings.
pub async fn declare_topology(channel: &Channel) -> Result<()> {
    channel
        .exchange_declare(
            EXCHANGE,
            ExchangeKind::Topic,
            ExchangeDeclareOptions {
                durable: true,
                ..Default::default()
            },
            FieldTable::default(),
        )
        .await?;

    for topic in DOMAIN_TOPICS.iter().chain(std::iter::once(&TOPIC_DLQ)) {
        let queue = queue_name(topic);

        let args = if PROTECTED_TOPICS.contains(topic) {
            protective_policy()
        } else {
            FieldTable::default()
        };

        channel
            .queue_declare(
                &queue,
                QueueDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                args,
            )
            .await?;
        channel
            .queue_bind(
                &queue,
                EXCHANGE,
                topic,
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await?;

        debug!(queue = %queue, routing_key = %topic, "queue declared and bound");
    }

    Ok(())
}

/// Queue arguments for the raw firehose and P2 queues.
fn protective_policy() -> FieldTable {
    let mut args = FieldTable::default();
    args.insert("x-message-ttl".into(), AMQPValue::LongLongInt(PROTECTED_MESSAGE_TTL_MS));
    args.insert("x-max-length".into(), AMQPValue::LongLongInt(PROTECTED_MAX_LENGTH));
    args.insert("x-overflow".into(), AMQPValue::LongString("drop-head".into()));
    args
}
