//! Event processor settings

use crate::env::Env;
use crate::error::Result;

/// Event processor behavior
#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    /// Stable consumer identity used as the `processed_events` ledger key
    /// (`SB_PROCESSOR_GROUP`, default "sb-processor")
    pub consumer_group: String,

    /// Transient-failure republish attempts before the message is dead-lettered
    /// (`SB_PROCESSOR_MAX_RETRIES`, default 5)
    pub max_retries: u32,

    /// Retry backoff base, milliseconds (`SB_PROCESSOR_RETRY_BASE_MS`, default 500)
    pub retry_base_ms: u64,

    /// Retry backoff cap, milliseconds (`SB_PROCESSOR_RETRY_MAX_MS`, default 10000)
    pub retry_max_ms: u64,

    /// Per-consumer broker prefetch (`SB_PROCESSOR_PREFETCH`, default 50)
    pub prefetch: u16,

    /// Seconds between reference geometry reloads
    /// (`SB_REFERENCE_REFRESH_SECS`, default 300)
    pub reference_refresh_secs: u64,
}

impl ProcessorConfig {
    pub(crate) fn load(env: &Env) -> Result<Self> {
        Ok(Self {
            consumer_group: env.string("SB_PROCESSOR_GROUP", "sb-processor"),
            max_retries: env.parse("SB_PROCESSOR_MAX_RETRIES", 5)?,
            retry_base_ms: env.parse("SB_PROCESSOR_RETRY_BASE_MS", 500)?,
            retry_max_ms: env.parse("SB_PROCESSOR_RETRY_MAX_MS", 10_000)?,
            prefetch: env.parse("SB_PROCESSOR_PREFETCH", 50)?,
            reference_refresh_secs: env.parse("SB_REFERENCE_REFRESH_SECS", 300)?,
        })
    }
}
