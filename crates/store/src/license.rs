//! Licensing snapshot
//!
//! Latest-wins per (app, user), gated on the event timestamp so late
//! deliveries never clobber newer state. `updated_at` stores the event
//! timestamp of the applied update, not the wall clock, because it is the
//! gate.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgConnection};
use uuid::Uuid;

use sb_protocol::NormalizedEvent;

use crate::error::Result;

/// One license event, extracted from the payload
#[derive(Debug, Clone, PartialEq)]
pub struct LicenseUpdate {
    pub app_uuid: Uuid,
    pub anon_user_id: String,
    pub device_id_hash: Option<String>,
    pub plan_type: String,
    pub license_status: String,
    pub started_at: Option<DateTime<Utc>>,
    pub renewed_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub event_ts: DateTime<Utc>,
}

impl LicenseUpdate {
    /// Extract licensing fields from an event payload. The payload is
    /// schema-light; unrecognized or absent fields degrade to "unknown".
    pub fn from_event(ev: &NormalizedEvent) -> Self {
        let field = |name: &str| {
            ev.payload
                .get(name)
                .and_then(serde_json::Value::as_str)
                .map(str::to_string)
        };
        let ts_field = |name: &str| {
            ev.payload
                .get(name)
                .and_then(serde_json::Value::as_str)
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|t| t.with_timezone(&Utc))
        };

        Self {
            app_uuid: ev.app_uuid,
            anon_user_id: ev.anon_user_id.clone(),
            device_id_hash: Some(ev.device_id_hash.clone()),
            plan_type: field("plan_type").unwrap_or_else(|| "unknown".to_string()),
            license_status: field("license_status").unwrap_or_else(|| "unknown".to_string()),
            started_at: ts_field("started_at"),
            renewed_at: ts_field("renewed_at"),
            expires_at: ts_field("expires_at"),
            event_ts: ev.occurred_at,
        }
    }
}

/// The stored snapshot
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct LicenseState {
    pub device_id_hash: Option<String>,
    pub plan_type: String,
    pub license_status: String,
    pub started_at: Option<DateTime<Utc>>,
    pub renewed_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl LicenseState {
    /// Settle an update against the existing snapshot.
    ///
    /// Returns the state the row ends up with and whether the update won.
    /// Newer wins; a tie on the stored timestamp keeps the existing state.
    /// Exact redeliveries never reach this gate (the processed-events
    /// ledger screens them), so a tie here is a distinct update that lost
    /// the race and must not overwrite.
    pub fn settle(existing: Option<Self>, update: &LicenseUpdate) -> (Self, bool) {
        if let Some(current) = existing {
            if update.event_ts <= current.updated_at {
                return (current, false);
            }
        }

        (
            Self {
                device_id_hash: update.device_id_hash.clone(),
                plan_type: update.plan_type.clone(),
                license_status: update.license_status.clone(),
                started_at: update.started_at,
                renewed_at: update.renewed_at,
                expires_at: update.expires_at,
                updated_at: update.event_ts,
            },
            true,
        )
    }
}

/// Neutral seed so the gate always runs against a locked row. Seeded in the
/// same transaction as the real update; `to_timestamp(0)` loses to any real
/// event timestamp.
const SEED_SQL: &str = r#"
INSERT INTO license_state (
    app_uuid, anon_user_id, plan_type, license_status, updated_at
)
VALUES ($1, $2, 'unknown', 'unknown', to_timestamp(0))
ON CONFLICT (app_uuid, anon_user_id) DO NOTHING
"#;

const SELECT_SQL: &str = r#"
SELECT device_id_hash, plan_type, license_status,
       started_at, renewed_at, expires_at, updated_at
FROM license_state
WHERE app_uuid = $1 AND anon_user_id = $2
FOR UPDATE
"#;

const UPDATE_SQL: &str = r#"
UPDATE license_state
SET device_id_hash = $3,
    plan_type = $4,
    license_status = $5,
    started_at = $6,
    renewed_at = $7,
    expires_at = $8,
    updated_at = $9
WHERE app_uuid = $1 AND anon_user_id = $2
"#;

/// Outcome of a gated license upsert
#[derive(Debug, Clone, PartialEq)]
pub struct LicenseSettled {
    /// The state now stored for this identity
    pub state: LicenseState,
    /// Whether the incoming update won the gate
    pub applied: bool,
}

/// Apply a license update under the timestamp gate.
///
/// Always returns the state the row settled on, so the caller can mirror it
/// into the customer snapshot whether or not the update won.
pub async fn upsert(conn: &mut PgConnection, update: &LicenseUpdate) -> Result<LicenseSettled> {
    sqlx::query(SEED_SQL)
        .bind(update.app_uuid)
        .bind(&update.anon_user_id)
        .execute(&mut *conn)
        .await?;

    let existing = sqlx::query_as::<_, LicenseState>(SELECT_SQL)
        .bind(update.app_uuid)
        .bind(&update.anon_user_id)
        .fetch_one(&mut *conn)
        .await?;

    let (state, applied) = LicenseState::settle(Some(existing), update);
    if !applied {
        return Ok(LicenseSettled {
            state,
            applied: false,
        });
    }

    sqlx::query(UPDATE_SQL)
        .bind(update.app_uuid)
        .bind(&update.anon_user_id)
        .bind(&state.device_id_hash)
        .bind(&state.plan_type)
        .bind(&state.license_status)
        .bind(state.started_at)
        .bind(state.renewed_at)
        .bind(state.expires_at)
        .bind(state.updated_at)
        .execute(&mut *conn)
        .await?;

    Ok(LicenseSettled {
        state,
        applied: true,
    })
}
