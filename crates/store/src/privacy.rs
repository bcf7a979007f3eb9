//! Privacy deletion
//!
//! Removes all stored state for one identity within an app. Broker messages
//! already published are append-only and are not touched; this deletes
//! database state only.

use serde::Serialize;
use sqlx::PgConnection;
use uuid::Uuid;

use crate::error::Result;

/// Rows deleted per table
#[derive(Debug, Clone, Default, Serialize)]
pub struct DeleteCounts {
    pub customer_360: u64,
    pub license_state: u64,
    pub user_hourly_presence: u64,
    pub device_hourly_presence: u64,
    pub raw_events: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opt_out: Option<u64>,
}

const DELETE_STATEMENTS: [(&str, &str); 5] = [
    (
        "customer_360",
        "DELETE FROM customer_360 WHERE app_uuid = $1 AND anon_user_id = $2",
    ),
    (
        "license_state",
        "DELETE FROM license_state WHERE app_uuid = $1 AND anon_user_id = $2",
    ),
    (
        "user_hourly_presence",
        "DELETE FROM user_hourly_presence WHERE app_uuid = $1 AND anon_user_id = $2",
    ),
    (
        "device_hourly_presence",
        "DELETE FROM device_hourly_presence WHERE app_uuid = $1 AND anon_user_id = $2",
    ),
    (
        "raw_events",
        "DELETE FROM raw_events WHERE app_uuid = $1 AND anon_user_id = $2",
    ),
];

/// Delete everything stored for `(app_uuid, anon_user_id)`.
///
/// The opt-out row survives unless `delete_opt_out` is set, so a deleted
/// user does not silently start being collected again.
pub async fn delete_user(
    conn: &mut PgConnection,
    app_uuid: Uuid,
    anon_user_id: &str,
    delete_opt_out: bool,
) -> Result<DeleteCounts> {
    let mut counts = DeleteCounts::default();

    for (table, sql) in DELETE_STATEMENTS {
        let affected = sqlx::query(sql)
            .bind(app_uuid)
            .bind(anon_user_id)
            .execute(&mut *conn)
            .await?
            .rows_affected();

        match table {
            "customer_360" => counts.customer_360 = affected,
            "license_state" => counts.license_state = affected,
            "user_hourly_presence" => counts.user_hourly_presence = affected,
            "device_hourly_presence" => counts.device_hourly_presence = affected,
            "raw_events" => counts.raw_events = affected,
            _ => {}
        }
    }

    if delete_opt_out {
        let affected =
            sqlx::query("DELETE FROM opt_out WHERE app_uuid = $1 AND anon_user_id = $2")
                .bind(app_uuid)
                .bind(anon_user_id)
                .execute(&mut *conn)
                .await?
                .rows_affected();
        counts.opt_out = Some(affected);
    }

    Ok(counts)
}
