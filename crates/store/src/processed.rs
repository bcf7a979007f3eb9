//! Per-consumer idempotency ledger
//!
//! The processor inserts here before committing any side effect for an
//! event; a conflict means another delivery already materialized it and the
//! message is acked without re-applying.

use sqlx::PgConnection;
use uuid::Uuid;

use crate::error::Result;

const MARK_SQL: &str = r#"
INSERT INTO processed_events (consumer, app_uuid, event_id)
VALUES ($1, $2, $3)
ON CONFLICT (consumer, app_uuid, event_id) DO NOTHING
"#;

/// Claim an event for this consumer. Returns `false` when it was already
/// processed.
pub async fn mark(
    conn: &mut PgConnection,
    consumer: &str,
    app_uuid: Uuid,
    event_id: Uuid,
) -> Result<bool> {
    let result = sqlx::query(MARK_SQL)
        .bind(consumer)
        .bind(app_uuid)
        .bind(event_id)
        .execute(conn)
        .await?;

    Ok(result.rows_affected() == 1)
}
