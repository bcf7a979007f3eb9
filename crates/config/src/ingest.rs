//! Ingest front-end settings

use crate::env::Env;
use crate::error::Result;

/// Ingest front-end behavior
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Listen address (`SB_INGEST_BIND`, default "0.0.0.0:8080")
    pub bind: String,

    /// Require the full envelope with no legacy aliases
    /// (`SB_STRICT_ENVELOPE`, default false)
    pub strict_envelope: bool,

    /// Reject events from opted-out identities with an `opted_out` item
    /// error; when false they are silently accepted and dropped
    /// (`SB_REJECT_OPTED_OUT`, default true)
    pub reject_opted_out: bool,

    /// Incoming header propagated into request logs
    /// (`SB_TRACE_ID_HEADER`, default "x-trace-id")
    pub trace_id_header: String,
}

impl IngestConfig {
    pub(crate) fn load(env: &Env) -> Result<Self> {
        Ok(Self {
            bind: env.string("SB_INGEST_BIND", "0.0.0.0:8080"),
            strict_envelope: env.flag("SB_STRICT_ENVELOPE", false)?,
            reject_opted_out: env.flag("SB_REJECT_OPTED_OUT", true)?,
            trace_id_header: env.string("SB_TRACE_ID_HEADER", "x-trace-id").to_ascii_lowercase(),
        })
    }
}
