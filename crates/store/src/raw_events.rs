//! Immutable archive of accepted envelopes
//!
//! Owned by ingest. The unique index on `(app_uuid, event_id)` makes
//! re-submission a silent no-op; the caller learns whether the insert
//! happened so it can skip outbox staging for duplicates.

use serde_json::Value;
use sqlx::PgConnection;

use sb_protocol::NormalizedEvent;

use crate::error::Result;

const INSERT_SQL: &str = r#"
INSERT INTO raw_events (
    event_id, trace_id, producer, actor,
    app_uuid, event_type, event_ts,
    anon_user_id, device_id_hash, session_id,
    sdk_version, event_version,
    geo_lat, geo_lon, geo_accuracy_m, geo_source,
    payload, context, raw_doc
)
VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19)
ON CONFLICT (app_uuid, event_id) DO NOTHING
"#;

/// Insert an accepted envelope. Returns `false` when the event collided on
/// `(app_uuid, event_id)` and nothing was written.
pub async fn insert(
    conn: &mut PgConnection,
    ev: &NormalizedEvent,
    raw_doc: &Value,
) -> Result<bool> {
    let geo = ev.geo_context();

    let result = sqlx::query(INSERT_SQL)
        .bind(ev.event_id)
        .bind(ev.trace_id)
        .bind(&ev.producer)
        .bind(&ev.actor)
        .bind(ev.app_uuid)
        .bind(&ev.event_name)
        .bind(ev.occurred_at)
        .bind(&ev.anon_user_id)
        .bind(&ev.device_id_hash)
        .bind(&ev.session_id)
        .bind(&ev.sdk_version)
        .bind(&ev.event_version)
        .bind(geo.as_ref().map(|g| g.lat))
        .bind(geo.as_ref().map(|g| g.lon))
        .bind(geo.as_ref().and_then(|g| g.accuracy_m))
        .bind(geo.as_ref().and_then(|g| g.source.clone()))
        .bind(Value::Object(ev.payload.clone()))
        .bind(Value::Object(ev.context.clone()))
        .bind(raw_doc)
        .execute(conn)
        .await?;

    Ok(result.rows_affected() == 1)
}
