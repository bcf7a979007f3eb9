//! `sb-server process` - the event processor
//!
//! Asserts schema presence, loads the reference geometries, and consumes
//! the domain queues until shutdown.

use std::time::Duration;

use anyhow::Result;
use tracing::info;

use sb_config::Config;
use sb_processor::Processor;

use super::{drain_within, shutdown_token};

pub async fn run(config: Config) -> Result<()> {
    let pool = sb_store::connect(&config.db).await?;
    sb_store::assert_schema(&pool).await?;

    let processor = Processor::new(
        pool,
        config.broker.clone(),
        config.processor.clone(),
        config.ingest.strict_envelope,
    )
    .await?;
    let metrics = processor.metrics();

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
                        consumed = s.consumed,
                        processed = s.processed,
                        deduped = s.deduped,
                        retried = s.retried,
                        dlq = s.dlq,
                        "processor metrics"
                    );
                }
            }
        }
    });

    let grace = Duration::from_secs(config.shutdown_grace_secs);
    drain_within(processor.run(token.clone()), &token, grace).await;
    Ok(())
}
