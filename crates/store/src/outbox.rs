//! Transactional outbox
//!
//! Rows are staged in the same transaction as their raw event and drained by
//! the publisher. Leasing selects pending rows with `FOR UPDATE SKIP LOCKED`
//! and stamps `locked_at` in the same statement, so publisher replicas scale
//! horizontally and a killed publisher's leases expire on their own.

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{FromRow, PgConnection};
use uuid::Uuid;

use sb_protocol::NormalizedEvent;

use crate::error::Result;

const STAGE_SQL: &str = r#"
INSERT INTO outbox_events (
    app_uuid, event_id, trace_id, occurred_at,
    routing_key, payload
)
VALUES ($1, $2, $3, $4, $5, $6)
ON CONFLICT (app_uuid, event_id, routing_key) DO NOTHING
"#;

const LEASE_SQL: &str = r#"
WITH cte AS (
    SELECT id
    FROM outbox_events
    WHERE status = 'pending'
      AND next_attempt_at <= now()
      AND (
        locked_at IS NULL
        OR locked_at < (now() - make_interval(secs => $2))
      )
    ORDER BY id
    FOR UPDATE SKIP LOCKED
    LIMIT $1
), locked AS (
    UPDATE outbox_events o
    SET locked_at = now()
    FROM cte
    WHERE o.id = cte.id
    RETURNING o.id, o.routing_key, o.payload, o.retries,
              o.app_uuid, o.event_id, o.trace_id, o.occurred_at
)
SELECT * FROM locked ORDER BY id
"#;

const MARK_SENT_SQL: &str = r#"
UPDATE outbox_events
SET status = 'sent', locked_at = NULL
WHERE id = $1
"#;

const MARK_ATTEMPT_FAILED_SQL: &str = r#"
UPDATE outbox_events
SET retries = retries + 1,
    last_error = $2,
    next_attempt_at = $3,
    locked_at = NULL,
    status = CASE WHEN retries + 1 >= $4 THEN 'failed' ELSE 'pending' END
WHERE id = $1
"#;

/// A leased outbox row, ready to publish
#[derive(Debug, Clone, FromRow)]
pub struct OutboxRow {
    pub id: i64,
    pub routing_key: String,
    pub payload: Value,
    pub retries: i32,
    pub app_uuid: Uuid,
    pub event_id: Option<Uuid>,
    pub trace_id: Option<Uuid>,
    pub occurred_at: DateTime<Utc>,
}

/// Stage one routing-key copy of an event. Returns `false` if this
/// destination was already staged.
pub async fn stage(
    conn: &mut PgConnection,
    ev: &NormalizedEvent,
    routing_key: &str,
    staged_payload: &Value,
) -> Result<bool> {
    let result = sqlx::query(STAGE_SQL)
        .bind(ev.app_uuid)
        .bind(ev.event_id)
        .bind(ev.trace_id)
        .bind(ev.occurred_at)
        .bind(routing_key)
        .bind(staged_payload)
        .execute(conn)
        .await?;

    Ok(result.rows_affected() == 1)
}

/// Atomically lock and return up to `limit` publishable rows.
///
/// Rows whose `locked_at` is older than `lease_timeout_secs` are treated as
/// abandoned and re-leased.
pub async fn lease_batch(
    conn: &mut PgConnection,
    limit: i64,
    lease_timeout_secs: f64,
) -> Result<Vec<OutboxRow>> {
    let rows = sqlx::query_as::<_, OutboxRow>(LEASE_SQL)
        .bind(limit)
        .bind(lease_timeout_secs)
        .fetch_all(conn)
        .await?;

    Ok(rows)
}

/// Broker confirmed the publish.
pub async fn mark_sent(conn: &mut PgConnection, id: i64) -> Result<()> {
    sqlx::query(MARK_SENT_SQL).bind(id).execute(conn).await?;
    Ok(())
}

/// Publish failed; schedule the next attempt or park the row as failed once
/// the retry cap is hit.
pub async fn mark_attempt_failed(
    conn: &mut PgConnection,
    id: i64,
    error: &str,
    next_attempt_at: DateTime<Utc>,
    max_retries: i32,
) -> Result<()> {
    sqlx::query(MARK_ATTEMPT_FAILED_SQL)
        .bind(id)
        .bind(error)
        .bind(next_attempt_at)
        .bind(max_retries)
        .execute(conn)
        .await?;
    Ok(())
}
