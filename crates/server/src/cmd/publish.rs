//! `sb-server publish` - the outbox publisher
//!
//! Asserts schema presence (ingest owns migration) and drains the outbox
//! until shutdown.

use std::time::Duration;

use anyhow::Result;
use tracing::info;

use sb_config::Config;
use sb_publisher::OutboxPublisher;

use super::{drain_within, shutdown_token};

pub async fn run(config: Config) -> Result<()> {
    let pool = sb_store::connect(&config.db).await?;
    sb_store::assert_schema(&pool).await?;

    let publisher = OutboxPublisher::new(pool, config.broker.clone(), config.publisher.clone());
    let metrics = publisher.metrics();

    let token = shutdown_token();

    let reporter_token = token.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(60));
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = reporter_token.cancelled() => break,
                _ = ticker.tick() => {
                    let s = metrics.snapshot();
                    info!(
                        leased = s.rows_leased,
                        sent = s.rows_sent,
                        retried = s.rows_retried,
                        parked = s.rows_parked,
                        "publisher metrics"
                    );
                }
            }
        }
    });

    let grace = Duration::from_secs(config.shutdown_grace_secs);
    drain_within(publisher.run(token.clone()), &token, grace).await;
    Ok(())
}
