//! SB Analytics - Ingest front-end
//!
//! Accepts event batches over HTTP and commits each accepted envelope
//! together with its outbox fan-out in one transaction. The broker is never
//! contacted here; durability comes from the outbox and the publisher
//! drains it.
//!
//! # Endpoints
//!
//! - `POST /v1/events` - batch of envelopes; per-item accept/reject/dedup
//! - `POST /v1/opt-out` - register an (app, user) opt-out; idempotent
//! - `POST /v1/privacy/delete` - delete stored state for an identity
//! - `GET /health` - liveness

mod auth;
mod error;
mod handlers;
mod metrics;
mod routes;
mod state;
mod types;

pub use error::{ApiError, Result};
pub use metrics::{IngestMetrics, IngestMetricsSnapshot};
pub use routes::build_router;
pub use state::AppState;
pub use types::{IngestResponse, RejectedItem};

#[cfg(test)]
mod auth_test;
#[cfg(test)]
mod types_test;
