//! Hourly aggregate counters and lazy H3 cell geometry
//!
//! Aggregates are maintained as `count = count + delta`, where the delta is 1
//! exactly when the corresponding presence upsert created a new row. Distinct
//! counting therefore derives from the presence tables and survives
//! redeliveries.

use chrono::{DateTime, Utc};
use sqlx::PgConnection;
use uuid::Uuid;

use sb_geo::CellGeometry;

use crate::error::Result;

const BUMP_H3_SQL: &str = r#"
INSERT INTO agg_h3_r9_hourly (app_uuid, hour_bucket, h3_r9, devices_count, users_count, updated_at)
VALUES ($1, $2, $3, $4, $5, now())
ON CONFLICT (app_uuid, hour_bucket, h3_r9)
DO UPDATE SET
    devices_count = agg_h3_r9_hourly.devices_count + EXCLUDED.devices_count,
    users_count = agg_h3_r9_hourly.users_count + EXCLUDED.users_count,
    updated_at = now()
"#;

const BUMP_PLACE_SQL: &str = r#"
INSERT INTO agg_place_hourly (app_uuid, hour_bucket, place_id, devices_count, users_count, updated_at)
VALUES ($1, $2, $3, $4, $5, now())
ON CONFLICT (app_uuid, hour_bucket, place_id)
DO UPDATE SET
    devices_count = agg_place_hourly.devices_count + EXCLUDED.devices_count,
    users_count = agg_place_hourly.users_count + EXCLUDED.users_count,
    updated_at = now()
"#;

const BUMP_ADMIN_SQL: &str = r#"
INSERT INTO agg_admin_hourly (app_uuid, hour_bucket, level, code, devices_count, users_count, updated_at)
VALUES ($1, $2, $3, $4, $5, $6, now())
ON CONFLICT (app_uuid, hour_bucket, level, code)
DO UPDATE SET
    devices_count = agg_admin_hourly.devices_count + EXCLUDED.devices_count,
    users_count = agg_admin_hourly.users_count + EXCLUDED.users_count,
    updated_at = now()
"#;

const ENSURE_CELL_SQL: &str = r#"
INSERT INTO h3_cells (h3_cell, resolution, geom, centroid_lat, centroid_lon)
VALUES ($1, $2, $3, $4, $5)
ON CONFLICT (h3_cell) DO NOTHING
"#;

/// Bump the r9 cell counters for one hour bucket.
pub async fn bump_h3_hourly(
    conn: &mut PgConnection,
    app_uuid: Uuid,
    hour_bucket: DateTime<Utc>,
    h3_r9: &str,
    devices_inc: i64,
    users_inc: i64,
) -> Result<()> {
    sqlx::query(BUMP_H3_SQL)
        .bind(app_uuid)
        .bind(hour_bucket)
        .bind(h3_r9)
        .bind(devices_inc)
        .bind(users_inc)
        .execute(conn)
        .await?;
    Ok(())
}

/// Bump the place counters for one hour bucket.
pub async fn bump_place_hourly(
    conn: &mut PgConnection,
    app_uuid: Uuid,
    hour_bucket: DateTime<Utc>,
    place_id: &str,
    devices_inc: i64,
    users_inc: i64,
) -> Result<()> {
    sqlx::query(BUMP_PLACE_SQL)
        .bind(app_uuid)
        .bind(hour_bucket)
        .bind(place_id)
        .bind(devices_inc)
        .bind(users_inc)
        .execute(conn)
        .await?;
    Ok(())
}

/// Bump one admin level's counters for one hour bucket.
pub async fn bump_admin_hourly(
    conn: &mut PgConnection,
    app_uuid: Uuid,
    hour_bucket: DateTime<Utc>,
    level: &str,
    code: &str,
    devices_inc: i64,
    users_inc: i64,
) -> Result<()> {
    sqlx::query(BUMP_ADMIN_SQL)
        .bind(app_uuid)
        .bind(hour_bucket)
        .bind(level)
        .bind(code)
        .bind(devices_inc)
        .bind(users_inc)
        .execute(conn)
        .await?;
    Ok(())
}

/// Insert a cell's geometry if it is not present yet.
pub async fn ensure_h3_cell(conn: &mut PgConnection, geometry: &CellGeometry) -> Result<()> {
    sqlx::query(ENSURE_CELL_SQL)
        .bind(&geometry.cell)
        .bind(geometry.resolution as i32)
        .bind(&geometry.boundary_geojson)
        .bind(geometry.centroid_lat)
        .bind(geometry.centroid_lon)
        .execute(conn)
        .await?;
    Ok(())
}
