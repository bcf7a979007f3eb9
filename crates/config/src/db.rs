//! Relational store connection settings

use crate::env::Env;
use crate::error::Result;

/// Postgres connection settings
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Connection string (`SB_POSTGRES_DSN`)
    pub dsn: String,

    /// Pool size (`SB_DB_MAX_CONNECTIONS`, default 10)
    pub max_connections: u32,

    /// Seconds to wait for a pooled connection before failing
    /// (`SB_DB_ACQUIRE_TIMEOUT_SECS`, default 5)
    pub acquire_timeout_secs: u64,
}

impl DbConfig {
    pub(crate) fn load(env: &Env) -> Result<Self> {
        Ok(Self {
            dsn: env.string(
                "SB_POSTGRES_DSN",
                "postgres://sb:sb@localhost:5432/sb_analytics",
            ),
            max_connections: env.parse("SB_DB_MAX_CONNECTIONS", 10)?,
            acquire_timeout_secs: env.parse("SB_DB_ACQUIRE_TIMEOUT_SECS", 5)?,
        })
    }
}
