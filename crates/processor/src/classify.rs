//! Transient / permanent error classification
//!
//! Replaces catch-by-exception-name control flow with an explicit
//! classifier: transient errors are worth a republish with backoff,
//! permanent errors go straight to the DLQ.

use crate::error::ProcessorError;

/// How a failure should be handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Connection drops, timeouts, deadlocks: retry with backoff
    Transient,
    /// Schema, type, and business violations: dead-letter immediately
    Permanent,
}

/// Classify a processing failure.
pub fn classify(error: &ProcessorError) -> ErrorKind {
    match error {
        ProcessorError::Envelope(_) => ErrorKind::Permanent,
        ProcessorError::Geo(_) => ErrorKind::Permanent,
        // Republish failures are connection-shaped by construction.
        ProcessorError::Broker(_) => ErrorKind::Transient,
        ProcessorError::Store(store) => classify_store(store),
    }
}

fn classify_store(error: &sb_store::StoreError) -> ErrorKind {
    match error {
        // The owning component has not migrated yet; it will.
        sb_store::StoreError::SchemaMissing(_) => ErrorKind::Transient,
        sb_store::StoreError::Db(db) => classify_sqlx(db),
    }
}

fn classify_sqlx(error: &sqlx::Error) -> ErrorKind {
    match error {
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::Protocol(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => ErrorKind::Transient,
        sqlx::Error::Database(db) => classify_sqlstate(db.code().as_deref()),
        _ => ErrorKind::Permanent,
    }
}

/// Classify by SQLSTATE family.
///
/// Connection (08), resource (53), and operator-intervention (57) families
/// plus serialization/deadlock/lock-timeout codes are transient. Data (22),
/// integrity (23), and syntax (42) families are permanent. Anything
/// unrecognized is treated as transient; the retry cap turns a persistent
/// unknown into a DLQ entry anyway.
pub fn classify_sqlstate(code: Option<&str>) -> ErrorKind {
    let Some(code) = code else {
        return ErrorKind::Transient;
    };

    if code == "40001" || code == "40P01" || code == "55P03" {
        return ErrorKind::Transient;
    }
    if code.starts_with("08") || code.starts_with("53") || code.starts_with("57") {
        return ErrorKind::Transient;
    }
    if code.starts_with("22") || code.starts_with("23") || code.starts_with("42") {
        return ErrorKind::Permanent;
    }

    ErrorKind::Transient
}

#[cfg(test)]
mod tests {
    use super::*;
    use sb_protocol::EnvelopeError;

    #[test]
    fn test_envelope_errors_are_permanent() {
        let error = ProcessorError::Envelope(EnvelopeError::MissingField("app_uuid"));
        assert_eq!(classify(&error), ErrorKind::Permanent);
    }

    #[test]
    fn test_io_errors_are_transient() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        let error = ProcessorError::Store(sb_store::StoreError::Db(sqlx::Error::Io(io)));
        assert_eq!(classify(&error), ErrorKind::Transient);

        let error = ProcessorError::Store(sb_store::StoreError::Db(sqlx::Error::PoolTimedOut));
        assert_eq!(classify(&error), ErrorKind::Transient);
    }

    #[test]
    fn test_decode_errors_are_permanent() {
        let error = ProcessorError::Store(sb_store::StoreError::Db(sqlx::Error::RowNotFound));
        assert_eq!(classify(&error), ErrorKind::Permanent);
    }

    #[test]
    fn test_missing_schema_is_transient() {
        let error = ProcessorError::Store(sb_store::StoreError::SchemaMissing("raw_events"));
        assert_eq!(classify(&error), ErrorKind::Transient);
    }

    #[test]
    fn test_sqlstate_families() {
        // Deadlock, serialization, lock timeout
        assert_eq!(classify_sqlstate(Some("40P01")), ErrorKind::Transient);
        assert_eq!(classify_sqlstate(Some("40001")), ErrorKind::Transient);
        assert_eq!(classify_sqlstate(Some("55P03")), ErrorKind::Transient);
        // Connection / resources / shutdown
        assert_eq!(classify_sqlstate(Some("08006")), ErrorKind::Transient);
        assert_eq!(classify_sqlstate(Some("53300")), ErrorKind::Transient);
        assert_eq!(classify_sqlstate(Some("57P01")), ErrorKind::Transient);
        // Data, integrity, syntax
        assert_eq!(classify_sqlstate(Some("22P02")), ErrorKind::Permanent);
        assert_eq!(classify_sqlstate(Some("23505")), ErrorKind::Permanent);
        assert_eq!(classify_sqlstate(Some("42703")), ErrorKind::Permanent);
        // Unknown leans transient
        assert_eq!(classify_sqlstate(Some("XX000")), ErrorKind::Transient);
        assert_eq!(classify_sqlstate(None), ErrorKind::Transient);
    }
}
