//! Subcommand implementations

pub mod ingest;
pub mod migrate;
pub mod process;
pub mod publish;

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// A token cancelled on Ctrl-C / SIGTERM-equivalent.
pub fn shutdown_token() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
            trigger.cancel();
        }
    });
    token
}

/// Wait for `work`; once shutdown fires it gets at most `grace` to drain.
pub async fn drain_within<F>(work: F, token: &CancellationToken, grace: Duration)
where
    F: Future<Output = ()>,
{
    tokio::pin!(work);
    tokio::select! {
        _ = &mut work => {}
        _ = async {
            token.cancelled().await;
            tokio::time::sleep(grace).await;
        } => {
            warn!(grace_secs = grace.as_secs(), "drain deadline exceeded, exiting");
        }
    }
}
