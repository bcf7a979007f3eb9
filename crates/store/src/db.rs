//! Database connection and schema management
//!
//! One authoritative migration, applied at boot by the ingest component
//! behind a Postgres advisory lock. Other components call [`assert_schema`]
//! and fail fast if the schema is not present; they never run DDL.

use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use std::time::Duration;
use tracing::info;

use sb_config::DbConfig;

use crate::error::{Result, StoreError};

/// Advisory lock key guarding the migration. Any value works as long as
/// every replica uses the same one.
const MIGRATION_LOCK_KEY: i64 = 0x5b_a11a_71c5;

/// Open the connection pool.
pub async fn connect(config: &DbConfig) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .connect(&config.dsn)
        .await?;

    Ok(pool)
}

/// Apply the schema idempotently.
///
/// Serialized across replicas via an advisory lock held on a dedicated
/// connection for the duration of the DDL.
pub async fn migrate(pool: &PgPool) -> Result<()> {
    let mut conn = pool.acquire().await?;

    sqlx::query("SELECT pg_advisory_lock($1)")
        .bind(MIGRATION_LOCK_KEY)
        .execute(&mut *conn)
        .await?;

    let ddl_result = async {
        for statement in SCHEMA_STATEMENTS {
            sqlx::query(statement).execute(&mut *conn).await?;
        }
        Ok::<(), StoreError>(())
    }
    .await;

    // Release the lock even when DDL failed; the error is what aborts boot.
    sqlx::query("SELECT pg_advisory_unlock($1)")
        .bind(MIGRATION_LOCK_KEY)
        .execute(&mut *conn)
        .await?;

    ddl_result?;
    info!(tables = REQUIRED_TABLES.len(), "schema migration applied");
    Ok(())
}

/// Verify every required table exists without touching DDL.
pub async fn assert_schema(pool: &PgPool) -> Result<()> {
    for table in REQUIRED_TABLES {
        let row = sqlx::query("SELECT to_regclass($1) IS NOT NULL AS present")
            .bind(table)
            .fetch_one(pool)
            .await?;
        let present: bool = row.try_get("present")?;
        if !present {
            return Err(StoreError::SchemaMissing(table));
        }
    }
    Ok(())
}

/// Tables whose presence every component depends on
const REQUIRED_TABLES: [&str; 14] = [
    "raw_events",
    "outbox_events",
    "processed_events",
    "device_hourly_presence",
    "user_hourly_presence",
    "license_state",
    "customer_360",
    "agg_h3_r9_hourly",
    "agg_place_hourly",
    "agg_admin_hourly",
    "h3_cells",
    "places",
    "admin_areas",
    "opt_out",
];

// =============================================================================
// Schema - event intake
// =============================================================================

const SCHEMA_RAW_EVENTS: &str = r#"
CREATE TABLE IF NOT EXISTS raw_events (
    id BIGINT GENERATED ALWAYS AS IDENTITY PRIMARY KEY,
    received_at TIMESTAMPTZ NOT NULL DEFAULT now(),

    event_id UUID,
    trace_id UUID,
    producer TEXT,
    actor TEXT,
    app_uuid UUID NOT NULL,
    event_type TEXT NOT NULL,
    event_ts TIMESTAMPTZ NOT NULL,

    anon_user_id TEXT NOT NULL,
    device_id_hash TEXT,
    session_id TEXT,
    sdk_version TEXT,
    event_version TEXT,

    geo_lat DOUBLE PRECISION,
    geo_lon DOUBLE PRECISION,
    geo_accuracy_m DOUBLE PRECISION,
    geo_source TEXT,

    payload JSONB NOT NULL,
    context JSONB NOT NULL,
    raw_doc JSONB NOT NULL
)
"#;

const SCHEMA_OUTBOX: &str = r#"
CREATE TABLE IF NOT EXISTS outbox_events (
    id BIGINT GENERATED ALWAYS AS IDENTITY PRIMARY KEY,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    locked_at TIMESTAMPTZ,

    app_uuid UUID NOT NULL,
    event_id UUID,
    trace_id UUID,
    occurred_at TIMESTAMPTZ NOT NULL,

    routing_key TEXT NOT NULL,
    payload JSONB NOT NULL,

    status TEXT NOT NULL DEFAULT 'pending' CHECK (status IN ('pending','sent','failed')),
    retries INT NOT NULL DEFAULT 0,
    next_attempt_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    last_error TEXT
)
"#;

const SCHEMA_PROCESSED: &str = r#"
CREATE TABLE IF NOT EXISTS processed_events (
    consumer TEXT NOT NULL,
    app_uuid UUID NOT NULL,
    event_id UUID NOT NULL,
    processed_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    PRIMARY KEY (consumer, app_uuid, event_id)
)
"#;

// =============================================================================
// Schema - materialized facts
// =============================================================================

const SCHEMA_DEVICE_PRESENCE: &str = r#"
CREATE TABLE IF NOT EXISTS device_hourly_presence (
    app_uuid UUID NOT NULL,
    hour_bucket TIMESTAMPTZ NOT NULL,
    device_id_hash TEXT NOT NULL,
    anon_user_id TEXT NOT NULL,

    h3_r7 TEXT,
    h3_r9 TEXT,
    h3_r11 TEXT,
    place_id TEXT,
    admin_country_code TEXT,
    admin_province_code TEXT,
    admin_municipality_code TEXT,
    admin_sector_code TEXT,

    geo_accuracy_m DOUBLE PRECISION,
    geo_precision_class TEXT NOT NULL,
    first_event_ts TIMESTAMPTZ NOT NULL,

    PRIMARY KEY (app_uuid, hour_bucket, device_id_hash)
)
"#;

const SCHEMA_USER_PRESENCE: &str = r#"
CREATE TABLE IF NOT EXISTS user_hourly_presence (
    app_uuid UUID NOT NULL,
    hour_bucket TIMESTAMPTZ NOT NULL,
    anon_user_id TEXT NOT NULL,

    h3_r7 TEXT,
    h3_r9 TEXT,
    h3_r11 TEXT,
    place_id TEXT,
    admin_country_code TEXT,
    admin_province_code TEXT,
    admin_municipality_code TEXT,
    admin_sector_code TEXT,

    geo_accuracy_m DOUBLE PRECISION,
    geo_precision_class TEXT NOT NULL,
    first_event_ts TIMESTAMPTZ NOT NULL,

    PRIMARY KEY (app_uuid, hour_bucket, anon_user_id)
)
"#;

const SCHEMA_LICENSE_STATE: &str = r#"
CREATE TABLE IF NOT EXISTS license_state (
    app_uuid UUID NOT NULL,
    anon_user_id TEXT NOT NULL,
    device_id_hash TEXT,

    plan_type TEXT NOT NULL,
    license_status TEXT NOT NULL,
    started_at TIMESTAMPTZ,
    renewed_at TIMESTAMPTZ,
    expires_at TIMESTAMPTZ,

    updated_at TIMESTAMPTZ NOT NULL,

    PRIMARY KEY (app_uuid, anon_user_id)
)
"#;

const SCHEMA_CUSTOMER_360: &str = r#"
CREATE TABLE IF NOT EXISTS customer_360 (
    app_uuid UUID NOT NULL,
    anon_user_id TEXT NOT NULL,
    device_id_hash TEXT,

    first_seen_at TIMESTAMPTZ NOT NULL,
    last_seen_at TIMESTAMPTZ NOT NULL,
    last_event_type TEXT,
    last_session_id TEXT,
    last_sdk_version TEXT,
    last_event_version TEXT,

    last_h3_r9 TEXT,
    last_place_id TEXT,
    last_admin_country_code TEXT,
    last_admin_province_code TEXT,
    last_admin_municipality_code TEXT,
    last_admin_sector_code TEXT,

    geo_events_count BIGINT NOT NULL DEFAULT 0,
    license_events_count BIGINT NOT NULL DEFAULT 0,
    active_user_hours_count BIGINT NOT NULL DEFAULT 0,
    active_device_hours_count BIGINT NOT NULL DEFAULT 0,

    last_plan_type TEXT,
    last_license_status TEXT,
    license_started_at TIMESTAMPTZ,
    license_renewed_at TIMESTAMPTZ,
    license_expires_at TIMESTAMPTZ,

    last_event_ts TIMESTAMPTZ,
    last_geo_event_ts TIMESTAMPTZ,

    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),

    PRIMARY KEY (app_uuid, anon_user_id)
)
"#;

// =============================================================================
// Schema - hourly aggregates and reference geometry
// =============================================================================

const SCHEMA_AGG_H3: &str = r#"
CREATE TABLE IF NOT EXISTS agg_h3_r9_hourly (
    app_uuid UUID NOT NULL,
    hour_bucket TIMESTAMPTZ NOT NULL,
    h3_r9 TEXT NOT NULL,
    devices_count BIGINT NOT NULL DEFAULT 0,
    users_count BIGINT NOT NULL DEFAULT 0,
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    PRIMARY KEY (app_uuid, hour_bucket, h3_r9)
)
"#;

const SCHEMA_AGG_PLACE: &str = r#"
CREATE TABLE IF NOT EXISTS agg_place_hourly (
    app_uuid UUID NOT NULL,
    hour_bucket TIMESTAMPTZ NOT NULL,
    place_id TEXT NOT NULL,
    devices_count BIGINT NOT NULL DEFAULT 0,
    users_count BIGINT NOT NULL DEFAULT 0,
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    PRIMARY KEY (app_uuid, hour_bucket, place_id)
)
"#;

const SCHEMA_AGG_ADMIN: &str = r#"
CREATE TABLE IF NOT EXISTS agg_admin_hourly (
    app_uuid UUID NOT NULL,
    hour_bucket TIMESTAMPTZ NOT NULL,
    level TEXT NOT NULL CHECK (level IN ('country','province','municipality','sector')),
    code TEXT NOT NULL,
    devices_count BIGINT NOT NULL DEFAULT 0,
    users_count BIGINT NOT NULL DEFAULT 0,
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    PRIMARY KEY (app_uuid, hour_bucket, level, code)
)
"#;

const SCHEMA_H3_CELLS: &str = r#"
CREATE TABLE IF NOT EXISTS h3_cells (
    h3_cell TEXT PRIMARY KEY,
    resolution INT NOT NULL,
    geom JSONB NOT NULL,
    centroid_lat DOUBLE PRECISION NOT NULL,
    centroid_lon DOUBLE PRECISION NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
)
"#;

const SCHEMA_PLACES: &str = r#"
CREATE TABLE IF NOT EXISTS places (
    place_id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    place_type TEXT NOT NULL,
    geofence JSONB NOT NULL,
    valid_from TIMESTAMPTZ,
    valid_to TIMESTAMPTZ
)
"#;

const SCHEMA_ADMIN_AREAS: &str = r#"
CREATE TABLE IF NOT EXISTS admin_areas (
    level TEXT NOT NULL CHECK (level IN ('country','province','municipality','sector')),
    code TEXT NOT NULL,
    name TEXT,
    parent_code TEXT,
    geom JSONB NOT NULL,
    valid_from TIMESTAMPTZ,
    valid_to TIMESTAMPTZ,
    PRIMARY KEY (level, code)
)
"#;

const SCHEMA_OPT_OUT: &str = r#"
CREATE TABLE IF NOT EXISTS opt_out (
    app_uuid UUID NOT NULL,
    anon_user_id TEXT NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    PRIMARY KEY (app_uuid, anon_user_id)
)
"#;

/// Every statement the migration applies, in order
const SCHEMA_STATEMENTS: [&str; 27] = [
    SCHEMA_RAW_EVENTS,
    "CREATE UNIQUE INDEX IF NOT EXISTS ux_raw_events_app_event_id ON raw_events (app_uuid, event_id)",
    "CREATE INDEX IF NOT EXISTS ix_raw_events_trace_id ON raw_events (trace_id)",
    "CREATE INDEX IF NOT EXISTS ix_raw_events_app_user ON raw_events (app_uuid, anon_user_id)",
    SCHEMA_OUTBOX,
    "CREATE UNIQUE INDEX IF NOT EXISTS ux_outbox_events_app_event_routing ON outbox_events (app_uuid, event_id, routing_key)",
    "CREATE INDEX IF NOT EXISTS ix_outbox_events_status_next ON outbox_events (status, next_attempt_at)",
    "CREATE INDEX IF NOT EXISTS ix_outbox_events_app_created ON outbox_events (app_uuid, created_at)",
    SCHEMA_PROCESSED,
    SCHEMA_DEVICE_PRESENCE,
    "CREATE INDEX IF NOT EXISTS ix_device_presence_user ON device_hourly_presence (app_uuid, anon_user_id)",
    SCHEMA_USER_PRESENCE,
    SCHEMA_LICENSE_STATE,
    SCHEMA_CUSTOMER_360,
    "CREATE INDEX IF NOT EXISTS ix_customer_360_last_seen ON customer_360 (last_seen_at)",
    "CREATE INDEX IF NOT EXISTS ix_customer_360_place ON customer_360 (last_place_id)",
    "CREATE INDEX IF NOT EXISTS ix_customer_360_h3r9 ON customer_360 (last_h3_r9)",
    SCHEMA_AGG_H3,
    "CREATE INDEX IF NOT EXISTS ix_agg_h3_r9_hourly_hour ON agg_h3_r9_hourly (hour_bucket)",
    SCHEMA_AGG_PLACE,
    "CREATE INDEX IF NOT EXISTS ix_agg_place_hourly_hour ON agg_place_hourly (hour_bucket)",
    SCHEMA_AGG_ADMIN,
    "CREATE INDEX IF NOT EXISTS ix_agg_admin_hourly_level_code ON agg_admin_hourly (level, code, hour_bucket)",
    SCHEMA_H3_CELLS,
    SCHEMA_PLACES,
    SCHEMA_ADMIN_AREAS,
    SCHEMA_OPT_OUT,
];
