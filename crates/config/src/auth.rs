//! HTTP authentication settings

use crate::env::Env;
use crate::error::{ConfigError, Result};

/// Authentication mode for the ingest HTTP surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    /// No authentication (dev)
    Open,
    /// Shared API key required on every request
    ApiKey,
}

/// Authentication settings
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Mode (`SB_AUTH_MODE`: "open" or "api_key", default "open")
    pub mode: AuthMode,

    /// Shared key checked against `X-API-Key` / bearer tokens (`SB_API_KEY`)
    pub api_key: String,
}

impl AuthConfig {
    pub(crate) fn load(env: &Env) -> Result<Self> {
        let raw_mode = env.string("SB_AUTH_MODE", "open");
        let mode = match raw_mode.trim().to_ascii_lowercase().as_str() {
            "open" => AuthMode::Open,
            "api_key" => AuthMode::ApiKey,
            other => {
                return Err(ConfigError::Invalid {
                    key: "SB_AUTH_MODE".to_string(),
                    message: format!("expected \"open\" or \"api_key\", got {other:?}"),
                })
            }
        };

        let api_key = env.string("SB_API_KEY", "");
        if mode == AuthMode::ApiKey && api_key.is_empty() {
            return Err(ConfigError::Invalid {
                key: "SB_API_KEY".to_string(),
                message: "required when SB_AUTH_MODE=api_key".to_string(),
            });
        }

        Ok(Self { mode, api_key })
    }
}
