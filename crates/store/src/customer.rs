//! Customer 360 snapshot
//!
//! One row per (app, user) folding every event family into first/last seen,
//! last-event metadata, last geo dimensions, rolling counters, and license
//! mirrors.
//!
//! The "last X" fields each carry their own gate timestamp
//! (`last_event_ts`, `last_geo_event_ts`, and `license_state.updated_at` for
//! the mirrors) rather than sharing `last_seen_at`, so an event of one
//! family arriving late can never be shadowed by a newer event of a
//! different family. That is what keeps the fold commutative.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgConnection, Row};
use uuid::Uuid;

use sb_geo::GeoDimensions;
use sb_protocol::NormalizedEvent;

use crate::error::Result;
use crate::license::LicenseState;

/// Envelope metadata folded into the snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct EventSummary {
    pub app_uuid: Uuid,
    pub anon_user_id: String,
    pub device_id_hash: String,
    pub event_ts: DateTime<Utc>,
    pub event_type: String,
    pub session_id: String,
    pub sdk_version: String,
    pub event_version: String,
}

impl EventSummary {
    pub fn from_event(ev: &NormalizedEvent) -> Self {
        Self {
            app_uuid: ev.app_uuid,
            anon_user_id: ev.anon_user_id.clone(),
            device_id_hash: ev.device_id_hash.clone(),
            event_ts: ev.occurred_at,
            event_type: ev.event_name.clone(),
            session_id: ev.session_id.clone(),
            sdk_version: ev.sdk_version.clone(),
            event_version: ev.event_version.clone(),
        }
    }
}

/// The stored snapshot row
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct Customer360 {
    pub device_id_hash: Option<String>,

    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
    pub last_event_type: Option<String>,
    pub last_session_id: Option<String>,
    pub last_sdk_version: Option<String>,
    pub last_event_version: Option<String>,

    pub last_h3_r9: Option<String>,
    pub last_place_id: Option<String>,
    pub last_admin_country_code: Option<String>,
    pub last_admin_province_code: Option<String>,
    pub last_admin_municipality_code: Option<String>,
    pub last_admin_sector_code: Option<String>,

    pub geo_events_count: i64,
    pub license_events_count: i64,
    pub active_user_hours_count: i64,
    pub active_device_hours_count: i64,

    pub last_plan_type: Option<String>,
    pub last_license_status: Option<String>,
    pub license_started_at: Option<DateTime<Utc>>,
    pub license_renewed_at: Option<DateTime<Utc>>,
    pub license_expires_at: Option<DateTime<Utc>>,

    pub last_event_ts: Option<DateTime<Utc>>,
    pub last_geo_event_ts: Option<DateTime<Utc>>,
}

impl Customer360 {
    /// An empty snapshot, seen for the first time at `ev.event_ts`.
    fn seed(ev: &EventSummary) -> Self {
        Self {
            device_id_hash: None,
            first_seen_at: ev.event_ts,
            last_seen_at: ev.event_ts,
            last_event_type: None,
            last_session_id: None,
            last_sdk_version: None,
            last_event_version: None,
            last_h3_r9: None,
            last_place_id: None,
            last_admin_country_code: None,
            last_admin_province_code: None,
            last_admin_municipality_code: None,
            last_admin_sector_code: None,
            geo_events_count: 0,
            license_events_count: 0,
            active_user_hours_count: 0,
            active_device_hours_count: 0,
            last_plan_type: None,
            last_license_status: None,
            license_started_at: None,
            license_renewed_at: None,
            license_expires_at: None,
            last_event_ts: None,
            last_geo_event_ts: None,
        }
    }

    /// Fold envelope metadata common to every family.
    ///
    /// The last-event fields apply when `event_ts >=` their gate timestamp,
    /// ties included.
    pub fn fold_event(existing: Option<Self>, ev: &EventSummary) -> Self {
        let mut cust = existing.unwrap_or_else(|| Self::seed(ev));
        cust.first_seen_at = cust.first_seen_at.min(ev.event_ts);
        cust.last_seen_at = cust.last_seen_at.max(ev.event_ts);

        if cust.last_event_ts.is_none_or(|ts| ev.event_ts >= ts) {
            cust.device_id_hash = Some(ev.device_id_hash.clone());
            cust.last_event_type = Some(ev.event_type.clone());
            cust.last_session_id = Some(ev.session_id.clone());
            cust.last_sdk_version = Some(ev.sdk_version.clone());
            cust.last_event_version = Some(ev.event_version.clone());
            cust.last_event_ts = Some(ev.event_ts);
        }

        cust
    }

    /// Fold a geo event: envelope metadata, counter, and the last geo
    /// dimensions under their own gate. The dims apply when `event_ts >=`
    /// the last applied geo event, ties included.
    pub fn fold_geo(existing: Option<Self>, ev: &EventSummary, dims: &GeoDimensions) -> Self {
        let mut cust = Self::fold_event(existing, ev);
        cust.geo_events_count += 1;

        if cust.last_geo_event_ts.is_none_or(|ts| ev.event_ts >= ts) {
            cust.last_h3_r9 = Some(dims.h3_r9.clone());
            cust.last_place_id = dims.place_id.clone();
            cust.last_admin_country_code = dims.admin.country.clone();
            cust.last_admin_province_code = dims.admin.province.clone();
            cust.last_admin_municipality_code = dims.admin.municipality.clone();
            cust.last_admin_sector_code = dims.admin.sector.clone();
            cust.last_geo_event_ts = Some(ev.event_ts);
        }

        cust
    }

    /// Fold a license event. The mirrors copy whatever the license gate just
    /// settled on, so they inherit its ordering guarantees.
    pub fn fold_license(
        existing: Option<Self>,
        ev: &EventSummary,
        settled: &LicenseState,
    ) -> Self {
        let mut cust = Self::fold_event(existing, ev);
        cust.license_events_count += 1;

        cust.last_plan_type = Some(settled.plan_type.clone());
        cust.last_license_status = Some(settled.license_status.clone());
        cust.license_started_at = settled.started_at;
        cust.license_renewed_at = settled.renewed_at;
        cust.license_expires_at = settled.expires_at;

        cust
    }

    /// Overwrite the distinct-hours counters (recomputed from the presence
    /// tables after each geo materialization).
    pub fn with_hour_counts(mut self, user_hours: i64, device_hours: i64) -> Self {
        self.active_user_hours_count = user_hours;
        self.active_device_hours_count = device_hours;
        self
    }
}

// =============================================================================
// SQL
// =============================================================================

/// Neutral seed row, so the read below can always take a row lock. Folding
/// two concurrent events without the lock would lose counter increments.
const SEED_SQL: &str = r#"
INSERT INTO customer_360 (app_uuid, anon_user_id, first_seen_at, last_seen_at, updated_at)
VALUES ($1, $2, $3, $3, now())
ON CONFLICT (app_uuid, anon_user_id) DO NOTHING
"#;

const SELECT_SQL: &str = r#"
SELECT device_id_hash,
       first_seen_at, last_seen_at,
       last_event_type, last_session_id, last_sdk_version, last_event_version,
       last_h3_r9, last_place_id,
       last_admin_country_code, last_admin_province_code,
       last_admin_municipality_code, last_admin_sector_code,
       geo_events_count, license_events_count,
       active_user_hours_count, active_device_hours_count,
       last_plan_type, last_license_status,
       license_started_at, license_renewed_at, license_expires_at,
       last_event_ts, last_geo_event_ts
FROM customer_360
WHERE app_uuid = $1 AND anon_user_id = $2
FOR UPDATE
"#;

const UPDATE_SQL: &str = r#"
UPDATE customer_360
SET device_id_hash = $3,
    first_seen_at = $4,
    last_seen_at = $5,
    last_event_type = $6,
    last_session_id = $7,
    last_sdk_version = $8,
    last_event_version = $9,
    last_h3_r9 = $10,
    last_place_id = $11,
    last_admin_country_code = $12,
    last_admin_province_code = $13,
    last_admin_municipality_code = $14,
    last_admin_sector_code = $15,
    geo_events_count = $16,
    license_events_count = $17,
    active_user_hours_count = $18,
    active_device_hours_count = $19,
    last_plan_type = $20,
    last_license_status = $21,
    license_started_at = $22,
    license_renewed_at = $23,
    license_expires_at = $24,
    last_event_ts = $25,
    last_geo_event_ts = $26,
    updated_at = now()
WHERE app_uuid = $1 AND anon_user_id = $2
"#;

const USER_HOURS_SQL: &str =
    "SELECT COUNT(*) AS n FROM user_hourly_presence WHERE app_uuid = $1 AND anon_user_id = $2";

const DEVICE_HOURS_SQL: &str =
    "SELECT COUNT(*) AS n FROM device_hourly_presence WHERE app_uuid = $1 AND device_id_hash = $2";

/// Seed (if absent) and lock the snapshot row for this identity.
async fn lock_for_update(
    conn: &mut PgConnection,
    app_uuid: Uuid,
    anon_user_id: &str,
    event_ts: chrono::DateTime<chrono::Utc>,
) -> Result<Customer360> {
    sqlx::query(SEED_SQL)
        .bind(app_uuid)
        .bind(anon_user_id)
        .bind(event_ts)
        .execute(&mut *conn)
        .await?;

    let row = sqlx::query_as::<_, Customer360>(SELECT_SQL)
        .bind(app_uuid)
        .bind(anon_user_id)
        .fetch_one(conn)
        .await?;
    Ok(row)
}

async fn write(
    conn: &mut PgConnection,
    app_uuid: Uuid,
    anon_user_id: &str,
    cust: &Customer360,
) -> Result<()> {
    sqlx::query(UPDATE_SQL)
        .bind(app_uuid)
        .bind(anon_user_id)
        .bind(&cust.device_id_hash)
        .bind(cust.first_seen_at)
        .bind(cust.last_seen_at)
        .bind(&cust.last_event_type)
        .bind(&cust.last_session_id)
        .bind(&cust.last_sdk_version)
        .bind(&cust.last_event_version)
        .bind(&cust.last_h3_r9)
        .bind(&cust.last_place_id)
        .bind(&cust.last_admin_country_code)
        .bind(&cust.last_admin_province_code)
        .bind(&cust.last_admin_municipality_code)
        .bind(&cust.last_admin_sector_code)
        .bind(cust.geo_events_count)
        .bind(cust.license_events_count)
        .bind(cust.active_user_hours_count)
        .bind(cust.active_device_hours_count)
        .bind(&cust.last_plan_type)
        .bind(&cust.last_license_status)
        .bind(cust.license_started_at)
        .bind(cust.license_renewed_at)
        .bind(cust.license_expires_at)
        .bind(cust.last_event_ts)
        .bind(cust.last_geo_event_ts)
        .execute(conn)
        .await?;
    Ok(())
}

/// Fold a geo event into the snapshot, refreshing the distinct-hours
/// counters. Call after the presence upserts in the same transaction so the
/// counts include the new rows.
pub async fn apply_geo(
    conn: &mut PgConnection,
    ev: &NormalizedEvent,
    dims: &GeoDimensions,
) -> Result<()> {
    let summary = EventSummary::from_event(ev);

    let user_hours: i64 = sqlx::query(USER_HOURS_SQL)
        .bind(ev.app_uuid)
        .bind(&ev.anon_user_id)
        .fetch_one(&mut *conn)
        .await?
        .try_get("n")?;
    let device_hours: i64 = sqlx::query(DEVICE_HOURS_SQL)
        .bind(ev.app_uuid)
        .bind(&ev.device_id_hash)
        .fetch_one(&mut *conn)
        .await?
        .try_get("n")?;

    let existing =
        lock_for_update(&mut *conn, ev.app_uuid, &ev.anon_user_id, ev.occurred_at).await?;
    let cust = Customer360::fold_geo(Some(existing), &summary, dims)
        .with_hour_counts(user_hours, device_hours);
    write(conn, ev.app_uuid, &ev.anon_user_id, &cust).await
}

/// Fold a license event into the snapshot, mirroring the settled license
/// state.
pub async fn apply_license(
    conn: &mut PgConnection,
    ev: &NormalizedEvent,
    settled: &LicenseState,
) -> Result<()> {
    let summary = EventSummary::from_event(ev);
    let existing =
        lock_for_update(&mut *conn, ev.app_uuid, &ev.anon_user_id, ev.occurred_at).await?;
    let cust = Customer360::fold_license(Some(existing), &summary, settled);
    write(conn, ev.app_uuid, &ev.anon_user_id, &cust).await
}

/// Fold envelope metadata only (raw/session/screen/ui/system families).
pub async fn apply_event(conn: &mut PgConnection, ev: &NormalizedEvent) -> Result<()> {
    let summary = EventSummary::from_event(ev);
    let existing =
        lock_for_update(&mut *conn, ev.app_uuid, &ev.anon_user_id, ev.occurred_at).await?;
    let cust = Customer360::fold_event(Some(existing), &summary);
    write(conn, ev.app_uuid, &ev.anon_user_id, &cust).await
}
