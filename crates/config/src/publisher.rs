//! Outbox publisher settings

use crate::env::Env;
use crate::error::Result;

/// Outbox publisher behavior
#[derive(Debug, Clone)]
pub struct PublisherConfig {
    /// Rows leased per poll (`SB_OUTBOX_LEASE_SIZE`, default 50)
    pub lease_size: i64,

    /// Seconds after which a lease from a dead publisher is reclaimed
    /// (`SB_OUTBOX_LEASE_TIMEOUT_SECS`, default 300)
    pub lease_timeout_secs: u64,

    /// Publish attempts before a row is parked as failed
    /// (`SB_OUTBOX_MAX_RETRIES`, default 10)
    pub max_retries: i32,

    /// Backoff base, seconds (`SB_OUTBOX_BACKOFF_BASE_SECS`, default 2)
    pub backoff_base_secs: u64,

    /// Backoff cap, seconds (`SB_OUTBOX_BACKOFF_MAX_SECS`, default 300)
    pub backoff_max_secs: u64,

    /// Sleep between polls when the outbox is empty, milliseconds
    /// (`SB_OUTBOX_IDLE_POLL_MS`, default 1000)
    pub idle_poll_ms: u64,
}

impl PublisherConfig {
    pub(crate) fn load(env: &Env) -> Result<Self> {
        Ok(Self {
            lease_size: env.parse("SB_OUTBOX_LEASE_SIZE", 50)?,
            lease_timeout_secs: env.parse("SB_OUTBOX_LEASE_TIMEOUT_SECS", 300)?,
            max_retries: env.parse("SB_OUTBOX_MAX_RETRIES", 10)?,
            backoff_base_secs: env.parse("SB_OUTBOX_BACKOFF_BASE_SECS", 2)?,
            backoff_max_secs: env.parse("SB_OUTBOX_BACKOFF_MAX_SECS", 300)?,
            idle_poll_ms: env.parse("SB_OUTBOX_IDLE_POLL_MS", 1000)?,
        })
    }
}
