//! `sb-server ingest` - the HTTP front-end
//!
//! Ingest owns the schema: it migrates on boot (behind the advisory lock)
//! before accepting traffic. In-flight requests finish their transaction
//! during graceful shutdown.

use std::time::Duration;

use anyhow::Result;
use tracing::info;

use sb_config::Config;
use sb_ingest::{build_router, AppState};

use super::{drain_within, shutdown_token};

pub async fn run(config: Config) -> Result<()> {
    let pool = sb_store::connect(&config.db).await?;
    sb_store::migrate(&pool).await?;

    let state = AppState::new(pool, config.ingest.clone(), config.auth.clone());
    let metrics = state.metrics.clone();
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.ingest.bind).await?;
    info!(bind = %config.ingest.bind, strict = config.ingest.strict_envelope, "ingest listening");

    let token = shutdown_token();

    let reporter_token = token.clone();
    let reporter_metrics = metrics.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(60));
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = reporter_token.cancelled() => break,
                _ = ticker.tick() => {
                    let s = reporter_metrics.snapshot();
                    info!(
                        requests = s.requests,
                        accepted = s.items_accepted,
                        deduped = s.items_deduped,
                        rejected = s.items_rejected,
                        "ingest metrics"
                    );
                }
            }
        }
    });

    let serve = async {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(token.clone().cancelled_owned())
            .await
        {
            tracing::error!(error = %e, "ingest server failed");
        }
    };
    let grace = Duration::from_secs(config.shutdown_grace_secs);
    drain_within(serve, &token, grace).await;

    let s = metrics.snapshot();
    info!(
        requests = s.requests,
        accepted = s.items_accepted,
        deduped = s.items_deduped,
        rejected = s.items_rejected,
        opt_outs = s.opt_outs,
        privacy_deletes = s.privacy_deletes,
        "ingest shut down"
    );
    Ok(())
}
