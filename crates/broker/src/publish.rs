//! Confirmed publishing
//!
//! Every publish is persistent (delivery mode 2) and waits for a publisher
//! confirm; a nack surfaces as an error so the caller's retry machinery
//! takes over. The DLQ publisher swallows its own failures after logging:
//! dead-lettering must never take a worker down.

use lapin::options::{BasicPublishOptions, ConfirmSelectOptions};
use lapin::publisher_confirm::Confirmation;
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel};
use serde::Serialize;
use tracing::error;

use sb_protocol::{DlqMessage, EXCHANGE, TOPIC_DLQ};

use crate::error::{BrokerError, Result};

/// A confirming publisher on one channel
pub struct EventPublisher {
    channel: Channel,
}

impl EventPublisher {
    /// Enable confirms on the channel.
    pub(crate) async fn new(channel: Channel) -> Result<Self> {
        channel
            .confirm_select(ConfirmSelectOptions::default())
            .await?;
        Ok(Self { channel })
    }

    /// Whether the channel is still usable.
    pub fn is_open(&self) -> bool {
        self.channel.status().connected()
    }

    /// Publish raw bytes with persistent delivery and wait for the confirm.
    pub async fn publish(
        &self,
        routing_key: &str,
        payload: &[u8],
        headers: FieldTable,
    ) -> Result<()> {
        let properties = BasicProperties::default()
            .with_content_type("application/json".into())
            .with_delivery_mode(2)
            .with_headers(headers);

        let confirmation = self
            .channel
            .basic_publish(
                EXCHANGE,
                routing_key,
                BasicPublishOptions::default(),
                payload,
                properties,
            )
            .await?
            .await?;

        match confirmation {
            Confirmation::Nack(_) => Err(BrokerError::Nacked {
                routing_key: routing_key.to_string(),
            }),
            Confirmation::Ack(_) | Confirmation::NotRequested => Ok(()),
        }
    }

    /// Serialize and publish a JSON document.
    pub async fn publish_json<T: Serialize>(
        &self,
        routing_key: &str,
        value: &T,
        headers: FieldTable,
    ) -> Result<()> {
        let payload = serde_json::to_vec(value)?;
        self.publish(routing_key, &payload, headers).await
    }

    /// Publish a dead-letter document. Failures are logged and dropped.
    pub async fn publish_dlq(&self, message: &DlqMessage) {
        if let Err(e) = self
            .publish_json(TOPIC_DLQ, message, FieldTable::default())
            .await
        {
            error!(
                error = %e,
                reason = ?message.reason,
                source_queue = %message.source.queue,
                "failed to publish DLQ message"
            );
        }
    }
}
