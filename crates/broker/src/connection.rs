//! Broker connection management

use lapin::options::{BasicConsumeOptions, BasicQosOptions};
use lapin::types::FieldTable;
use lapin::{Channel, Connection, ConnectionProperties, Consumer};
use tracing::info;

use sb_config::BrokerConfig;
use sb_protocol::queue_name;

use crate::error::Result;
use crate::publish::EventPublisher;
use crate::topology::declare_topology;

/// One AMQP connection; channels are opened per role.
pub struct Broker {
    connection: Connection,
}

impl Broker {
    /// Connect to the broker.
    pub async fn connect(config: &BrokerConfig) -> Result<Self> {
        let connection =
            Connection::connect(&config.url, ConnectionProperties::default()).await?;
        info!("broker connected");
        Ok(Self { connection })
    }

    /// Whether the underlying connection is still usable.
    pub fn is_connected(&self) -> bool {
        self.connection.status().connected()
    }

    /// Open a publishing channel: topology declared, publisher confirms on.
    pub async fn publisher(&self) -> Result<EventPublisher> {
        let channel = self.connection.create_channel().await?;
        declare_topology(&channel).await?;
        EventPublisher::new(channel).await
    }

    /// Open a consuming channel with the given prefetch. Topology is
    /// asserted idempotently so a consumer can boot before the publisher.
    pub async fn consumer_channel(&self, prefetch: u16) -> Result<Channel> {
        let channel = self.connection.create_channel().await?;
        declare_topology(&channel).await?;
        channel
            .basic_qos(prefetch, BasicQosOptions::default())
            .await?;
        Ok(channel)
    }

    /// Start consuming one domain queue.
    pub async fn consume(channel: &Channel, topic: &str, consumer_tag: &str) -> Result<Consumer> {
        let consumer = channel
            .basic_consume(
                &queue_name(topic),
                consumer_tag,
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await?;
        Ok(consumer)
    }
}
