//! Store error types

use thiserror::Error;

/// Relational store errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying database error
    #[error(transparent)]
    Db(#[from] sqlx::Error),

    /// A required table is absent; the owning component has not migrated yet
    #[error("schema not ready: table {0} is missing")]
    SchemaMissing(&'static str),
}

/// Result type for store operations
pub type Result<T> = std::result::Result<T, StoreError>;
