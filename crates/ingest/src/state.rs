//! Shared handler state

use std::sync::Arc;

use sqlx::PgPool;

use sb_config::{AuthConfig, IngestConfig};

use crate::metrics::IngestMetrics;

/// State shared by all handlers
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: IngestConfig,
    pub auth: AuthConfig,
    pub metrics: Arc<IngestMetrics>,
}

impl AppState {
    pub fn new(pool: PgPool, config: IngestConfig, auth: AuthConfig) -> Self {
        Self {
            pool,
            config,
            auth,
            metrics: Arc::new(IngestMetrics::new()),
        }
    }
}
