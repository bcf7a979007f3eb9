//! Opt-out registry
//!
//! Per-(app, user) privacy flag. Registration is idempotent; lookups are on
//! the ingest and processor hot paths and both keep small in-memory caches
//! of positive hits.

use sqlx::PgConnection;
use uuid::Uuid;

use crate::error::Result;

const INSERT_SQL: &str = r#"
INSERT INTO opt_out (app_uuid, anon_user_id)
VALUES ($1, $2)
ON CONFLICT (app_uuid, anon_user_id) DO NOTHING
"#;

const LOOKUP_SQL: &str = r#"
SELECT 1 AS hit
FROM opt_out
WHERE app_uuid = $1 AND anon_user_id = $2
LIMIT 1
"#;

/// Register an opt-out. Idempotent.
pub async fn register(conn: &mut PgConnection, app_uuid: Uuid, anon_user_id: &str) -> Result<()> {
    sqlx::query(INSERT_SQL)
        .bind(app_uuid)
        .bind(anon_user_id)
        .execute(conn)
        .await?;
    Ok(())
}

/// Whether this identity has opted out.
pub async fn is_opted_out(
    conn: &mut PgConnection,
    app_uuid: Uuid,
    anon_user_id: &str,
) -> Result<bool> {
    let row = sqlx::query(LOOKUP_SQL)
        .bind(app_uuid)
        .bind(anon_user_id)
        .fetch_optional(conn)
        .await?;

    Ok(row.is_some())
}
