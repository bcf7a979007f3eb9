//! Hourly presence facts
//!
//! At most one row per (app, hour, entity). The first observation in a
//! bucket inserts the row; later observations only refine it, under a
//! deterministic dominance order, so replays and reordered deliveries
//! converge to the same row.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgConnection};
use uuid::Uuid;

use sb_geo::{AdminCodes, GeoDimensions, PrecisionClass};

use crate::error::Result;

/// The policy-bearing columns of a presence row
#[derive(Debug, Clone, PartialEq)]
pub struct PresenceFacts {
    pub h3_r7: Option<String>,
    pub h3_r9: Option<String>,
    pub h3_r11: Option<String>,
    pub place_id: Option<String>,
    pub admin: AdminCodes,
    pub geo_accuracy_m: Option<f64>,
    pub precision: PrecisionClass,
    pub first_event_ts: DateTime<Utc>,
}

impl PresenceFacts {
    /// Facts carried by one classified observation.
    pub fn from_dimensions(dims: &GeoDimensions, event_ts: DateTime<Utc>) -> Self {
        Self {
            h3_r7: Some(dims.h3_r7.clone()),
            h3_r9: Some(dims.h3_r9.clone()),
            h3_r11: Some(dims.h3_r11.clone()),
            place_id: dims.place_id.clone(),
            admin: dims.admin.clone(),
            geo_accuracy_m: dims.accuracy_m,
            precision: dims.precision,
            first_event_ts: event_ts,
        }
    }

    /// Merge two observations of the same (app, hour, entity).
    ///
    /// `first_event_ts` is always the minimum. Geo dimensions come from the
    /// dominant observation: better precision class wins; within a class,
    /// better reported accuracy wins; remaining ties are broken on content
    /// so the merge is order-independent.
    pub fn merge(existing: &Self, incoming: &Self) -> Self {
        let first_event_ts = existing.first_event_ts.min(incoming.first_event_ts);

        let mut merged = if dominates(incoming, existing) {
            incoming.clone()
        } else {
            existing.clone()
        };
        merged.first_event_ts = first_event_ts;
        merged
    }
}

/// Whether `a` strictly dominates `b` in the dims ordering.
fn dominates(a: &PresenceFacts, b: &PresenceFacts) -> bool {
    if a.precision != b.precision {
        return a.precision > b.precision;
    }

    // Lower reported accuracy is better; unreported sorts last.
    let acc = |f: &PresenceFacts| f.geo_accuracy_m.unwrap_or(f64::INFINITY);
    match acc(a).total_cmp(&acc(b)) {
        std::cmp::Ordering::Less => return true,
        std::cmp::Ordering::Greater => return false,
        std::cmp::Ordering::Equal => {}
    }

    // Stable content tiebreak; which side wins is arbitrary but the same
    // regardless of arrival order.
    let key = |f: &PresenceFacts| {
        (
            f.h3_r11.clone(),
            f.place_id.clone(),
            f.admin.country.clone(),
            f.admin.province.clone(),
            f.admin.municipality.clone(),
            f.admin.sector.clone(),
        )
    };
    key(a) < key(b)
}

/// Outcome of a presence upsert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresenceWrite {
    /// True when a new (app, hour, entity) row was created; this is the
    /// delta fed into the hourly aggregates.
    pub inserted: bool,
}

// =============================================================================
// SQL
// =============================================================================

const INSERT_DEVICE_SQL: &str = r#"
INSERT INTO device_hourly_presence (
    app_uuid, hour_bucket, device_id_hash, anon_user_id,
    h3_r7, h3_r9, h3_r11, place_id,
    admin_country_code, admin_province_code, admin_municipality_code, admin_sector_code,
    geo_accuracy_m, geo_precision_class, first_event_ts
)
VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
ON CONFLICT (app_uuid, hour_bucket, device_id_hash) DO NOTHING
"#;

const SELECT_DEVICE_SQL: &str = r#"
SELECT h3_r7, h3_r9, h3_r11, place_id,
       admin_country_code, admin_province_code, admin_municipality_code, admin_sector_code,
       geo_accuracy_m, geo_precision_class, first_event_ts
FROM device_hourly_presence
WHERE app_uuid = $1 AND hour_bucket = $2 AND device_id_hash = $3
FOR UPDATE
"#;

const UPDATE_DEVICE_SQL: &str = r#"
UPDATE device_hourly_presence
SET h3_r7 = $4, h3_r9 = $5, h3_r11 = $6, place_id = $7,
    admin_country_code = $8, admin_province_code = $9,
    admin_municipality_code = $10, admin_sector_code = $11,
    geo_accuracy_m = $12, geo_precision_class = $13, first_event_ts = $14
WHERE app_uuid = $1 AND hour_bucket = $2 AND device_id_hash = $3
"#;

const INSERT_USER_SQL: &str = r#"
INSERT INTO user_hourly_presence (
    app_uuid, hour_bucket, anon_user_id,
    h3_r7, h3_r9, h3_r11, place_id,
    admin_country_code, admin_province_code, admin_municipality_code, admin_sector_code,
    geo_accuracy_m, geo_precision_class, first_event_ts
)
VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
ON CONFLICT (app_uuid, hour_bucket, anon_user_id) DO NOTHING
"#;

const SELECT_USER_SQL: &str = r#"
SELECT h3_r7, h3_r9, h3_r11, place_id,
       admin_country_code, admin_province_code, admin_municipality_code, admin_sector_code,
       geo_accuracy_m, geo_precision_class, first_event_ts
FROM user_hourly_presence
WHERE app_uuid = $1 AND hour_bucket = $2 AND anon_user_id = $3
FOR UPDATE
"#;

const UPDATE_USER_SQL: &str = r#"
UPDATE user_hourly_presence
SET h3_r7 = $4, h3_r9 = $5, h3_r11 = $6, place_id = $7,
    admin_country_code = $8, admin_province_code = $9,
    admin_municipality_code = $10, admin_sector_code = $11,
    geo_accuracy_m = $12, geo_precision_class = $13, first_event_ts = $14
WHERE app_uuid = $1 AND hour_bucket = $2 AND anon_user_id = $3
"#;

/// Row shape for the policy-bearing columns
#[derive(Debug, FromRow)]
struct FactsRow {
    h3_r7: Option<String>,
    h3_r9: Option<String>,
    h3_r11: Option<String>,
    place_id: Option<String>,
    admin_country_code: Option<String>,
    admin_province_code: Option<String>,
    admin_municipality_code: Option<String>,
    admin_sector_code: Option<String>,
    geo_accuracy_m: Option<f64>,
    geo_precision_class: String,
    first_event_ts: DateTime<Utc>,
}

impl From<FactsRow> for PresenceFacts {
    fn from(row: FactsRow) -> Self {
        Self {
            h3_r7: row.h3_r7,
            h3_r9: row.h3_r9,
            h3_r11: row.h3_r11,
            place_id: row.place_id,
            admin: AdminCodes {
                country: row.admin_country_code,
                province: row.admin_province_code,
                municipality: row.admin_municipality_code,
                sector: row.admin_sector_code,
            },
            geo_accuracy_m: row.geo_accuracy_m,
            // An unrecognized stored class is treated as coarse so any
            // well-formed observation can refine it.
            precision: PrecisionClass::parse(&row.geo_precision_class)
                .unwrap_or(PrecisionClass::Coarse),
            first_event_ts: row.first_event_ts,
        }
    }
}

// =============================================================================
// Upserts
// =============================================================================

/// Record a device observation for its hour bucket.
pub async fn upsert_device(
    conn: &mut PgConnection,
    app_uuid: Uuid,
    hour_bucket: DateTime<Utc>,
    device_id_hash: &str,
    anon_user_id: &str,
    incoming: &PresenceFacts,
) -> Result<PresenceWrite> {
    let inserted = sqlx::query(INSERT_DEVICE_SQL)
        .bind(app_uuid)
        .bind(hour_bucket)
        .bind(device_id_hash)
        .bind(anon_user_id)
        .bind(&incoming.h3_r7)
        .bind(&incoming.h3_r9)
        .bind(&incoming.h3_r11)
        .bind(&incoming.place_id)
        .bind(&incoming.admin.country)
        .bind(&incoming.admin.province)
        .bind(&incoming.admin.municipality)
        .bind(&incoming.admin.sector)
        .bind(incoming.geo_accuracy_m)
        .bind(incoming.precision.as_str())
        .bind(incoming.first_event_ts)
        .execute(&mut *conn)
        .await?
        .rows_affected()
        == 1;

    if inserted {
        return Ok(PresenceWrite { inserted: true });
    }

    let existing: PresenceFacts = sqlx::query_as::<_, FactsRow>(SELECT_DEVICE_SQL)
        .bind(app_uuid)
        .bind(hour_bucket)
        .bind(device_id_hash)
        .fetch_one(&mut *conn)
        .await?
        .into();

    let merged = PresenceFacts::merge(&existing, incoming);
    if merged != existing {
        sqlx::query(UPDATE_DEVICE_SQL)
            .bind(app_uuid)
            .bind(hour_bucket)
            .bind(device_id_hash)
            .bind(&merged.h3_r7)
            .bind(&merged.h3_r9)
            .bind(&merged.h3_r11)
            .bind(&merged.place_id)
            .bind(&merged.admin.country)
            .bind(&merged.admin.province)
            .bind(&merged.admin.municipality)
            .bind(&merged.admin.sector)
            .bind(merged.geo_accuracy_m)
            .bind(merged.precision.as_str())
            .bind(merged.first_event_ts)
            .execute(&mut *conn)
            .await?;
    }

    Ok(PresenceWrite { inserted: false })
}

/// Record a user observation for its hour bucket.
pub async fn upsert_user(
    conn: &mut PgConnection,
    app_uuid: Uuid,
    hour_bucket: DateTime<Utc>,
    anon_user_id: &str,
    incoming: &PresenceFacts,
) -> Result<PresenceWrite> {
    let inserted = sqlx::query(INSERT_USER_SQL)
        .bind(app_uuid)
        .bind(hour_bucket)
        .bind(anon_user_id)
        .bind(&incoming.h3_r7)
        .bind(&incoming.h3_r9)
        .bind(&incoming.h3_r11)
        .bind(&incoming.place_id)
        .bind(&incoming.admin.country)
        .bind(&incoming.admin.province)
        .bind(&incoming.admin.municipality)
        .bind(&incoming.admin.sector)
        .bind(incoming.geo_accuracy_m)
        .bind(incoming.precision.as_str())
        .bind(incoming.first_event_ts)
        .execute(&mut *conn)
        .await?
        .rows_affected()
        == 1;

    if inserted {
        return Ok(PresenceWrite { inserted: true });
    }

    let existing: PresenceFacts = sqlx::query_as::<_, FactsRow>(SELECT_USER_SQL)
        .bind(app_uuid)
        .bind(hour_bucket)
        .bind(anon_user_id)
        .fetch_one(&mut *conn)
        .await?
        .into();

    let merged = PresenceFacts::merge(&existing, incoming);
    if merged != existing {
        sqlx::query(UPDATE_USER_SQL)
            .bind(app_uuid)
            .bind(hour_bucket)
            .bind(anon_user_id)
            .bind(&merged.h3_r7)
            .bind(&merged.h3_r9)
            .bind(&merged.h3_r11)
            .bind(&merged.place_id)
            .bind(&merged.admin.country)
            .bind(&merged.admin.province)
            .bind(&merged.admin.municipality)
            .bind(&merged.admin.sector)
            .bind(merged.geo_accuracy_m)
            .bind(merged.precision.as_str())
            .bind(merged.first_event_ts)
            .execute(&mut *conn)
            .await?;
    }

    Ok(PresenceWrite { inserted: false })
}
