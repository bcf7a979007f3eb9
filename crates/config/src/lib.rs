//! SB Analytics configuration
//!
//! Environment-based configuration with sensible defaults. The environment is
//! read exactly once, at the process entry point, via [`Config::from_env`];
//! every component receives its typed section through its constructor and
//! never touches the environment itself.
//!
//! All variables use the `SB_` prefix. A fresh dev setup with a local
//! Postgres and broker should work with no variables set at all.
//!
//! # Example
//!
//! ```
//! use sb_config::{Config, Env};
//!
//! let env = Env::from_pairs([("SB_LOG_LEVEL", "debug")]);
//! let config = Config::load(&env).unwrap();
//! assert_eq!(config.log_level, "debug");
//! ```

mod auth;
mod broker;
mod db;
mod env;
mod error;
mod ingest;
mod processor;
mod publisher;

pub use auth::{AuthConfig, AuthMode};
pub use broker::BrokerConfig;
pub use db::DbConfig;
pub use env::Env;
pub use error::{ConfigError, Result};
pub use ingest::IngestConfig;
pub use processor::ProcessorConfig;
pub use publisher::PublisherConfig;

/// Main configuration record
///
/// Assembled once at startup and handed down by value. Cloning is cheap
/// enough that each component keeps its own copy of its section.
#[derive(Debug, Clone)]
pub struct Config {
    /// Relational store connection
    pub db: DbConfig,

    /// Broker connection and exchange
    pub broker: BrokerConfig,

    /// HTTP authentication for the ingest surface
    pub auth: AuthConfig,

    /// Ingest front-end behavior
    pub ingest: IngestConfig,

    /// Outbox publisher behavior
    pub publisher: PublisherConfig,

    /// Event processor behavior
    pub processor: ProcessorConfig,

    /// Log level filter (`SB_LOG_LEVEL`, default "info")
    pub log_level: String,

    /// Bounded deadline for draining in-flight work on shutdown, seconds
    /// (`SB_SHUTDOWN_GRACE_SECS`, default 20)
    pub shutdown_grace_secs: u64,
}

impl Config {
    /// Build the configuration from the process environment.
    ///
    /// Call this once, in `main`, before constructing any component.
    pub fn from_env() -> Result<Self> {
        Self::load(&Env::process())
    }

    /// Build the configuration from an explicit environment source.
    pub fn load(env: &Env) -> Result<Self> {
        Ok(Self {
            db: DbConfig::load(env)?,
            broker: BrokerConfig::load(env)?,
            auth: AuthConfig::load(env)?,
            ingest: IngestConfig::load(env)?,
            publisher: PublisherConfig::load(env)?,
            processor: ProcessorConfig::load(env)?,
            log_level: env.string("SB_LOG_LEVEL", "info"),
            shutdown_grace_secs: env.parse("SB_SHUTDOWN_GRACE_SECS", 20)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_env_uses_defaults() {
        let config = Config::load(&Env::from_pairs::<[(&str, &str); 0]>([])).unwrap();
        assert_eq!(config.log_level, "info");
        assert_eq!(config.publisher.lease_size, 50);
        assert_eq!(config.processor.max_retries, 5);
        assert!(!config.ingest.strict_envelope);
    }

    #[test]
    fn test_overrides_apply() {
        let env = Env::from_pairs([
            ("SB_LOG_LEVEL", "trace"),
            ("SB_STRICT_ENVELOPE", "1"),
            ("SB_OUTBOX_LEASE_SIZE", "200"),
        ]);
        let config = Config::load(&env).unwrap();
        assert_eq!(config.log_level, "trace");
        assert!(config.ingest.strict_envelope);
        assert_eq!(config.publisher.lease_size, 200);
    }

    #[test]
    fn test_invalid_number_is_an_error() {
        let env = Env::from_pairs([("SB_OUTBOX_LEASE_SIZE", "many")]);
        let err = Config::load(&env).unwrap_err();
        assert!(err.to_string().contains("SB_OUTBOX_LEASE_SIZE"));
    }
}
