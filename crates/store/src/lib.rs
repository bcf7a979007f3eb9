//! SB Analytics - Relational store
//!
//! Postgres access for every component: the authoritative schema, the
//! transactional outbox, the idempotency ledger, the materialized fact
//! tables, and the privacy registry.
//!
//! # Architecture
//!
//! - `db` owns connection pooling and the boot-time schema migration. The
//!   migration runs behind an advisory lock so concurrent replicas cannot
//!   race DDL; components that do not own the schema only assert presence.
//! - One module per table group; functions take a `&mut PgConnection` so the
//!   caller decides transaction boundaries. Components never share state
//!   except through these tables.
//! - Update policies for presence, license state, and the customer snapshot
//!   are pure functions applied inside a row-locked read-modify-write, which
//!   keeps the materializers commutative and directly testable.

pub mod aggregates;
pub mod customer;
pub mod db;
mod error;
pub mod license;
pub mod optout;
pub mod outbox;
pub mod presence;
pub mod privacy;
pub mod processed;
pub mod raw_events;
pub mod reference;

pub use db::{assert_schema, connect, migrate};
pub use error::{Result, StoreError};

#[cfg(test)]
mod customer_test;
#[cfg(test)]
mod presence_test;
