//! Reference geometry loading
//!
//! Places and admin areas are populated by external importers; the processor
//! reads them into an in-process index at boot and on a refresh interval.
//! Rows with unparseable geometry are skipped with a warning rather than
//! failing the load; one bad import must not stop materialization.

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{FromRow, PgConnection};
use tracing::warn;

use sb_geo::{geometry_from_geojson, AdminArea, AdminLevel, PlaceGeofence, ReferenceIndex};

use crate::error::Result;

const PLACES_SQL: &str = "SELECT place_id, geofence, valid_from, valid_to FROM places";

const ADMIN_AREAS_SQL: &str = "SELECT level, code, geom, valid_from, valid_to FROM admin_areas";

#[derive(Debug, FromRow)]
struct PlaceRow {
    place_id: String,
    geofence: Value,
    valid_from: Option<DateTime<Utc>>,
    valid_to: Option<DateTime<Utc>>,
}

#[derive(Debug, FromRow)]
struct AdminAreaRow {
    level: String,
    code: String,
    geom: Value,
    valid_from: Option<DateTime<Utc>>,
    valid_to: Option<DateTime<Utc>>,
}

/// Load the current reference snapshot.
pub async fn load_reference_index(conn: &mut PgConnection) -> Result<ReferenceIndex> {
    let place_rows = sqlx::query_as::<_, PlaceRow>(PLACES_SQL)
        .fetch_all(&mut *conn)
        .await?;
    let admin_rows = sqlx::query_as::<_, AdminAreaRow>(ADMIN_AREAS_SQL)
        .fetch_all(&mut *conn)
        .await?;

    let mut places = Vec::with_capacity(place_rows.len());
    for row in place_rows {
        match geometry_from_geojson(&row.geofence) {
            Ok(geometry) => places.push(PlaceGeofence {
                place_id: row.place_id,
                geometry,
                valid_from: row.valid_from,
                valid_to: row.valid_to,
            }),
            Err(e) => warn!(place_id = %row.place_id, error = %e, "skipping place with bad geofence"),
        }
    }

    let mut admin_areas = Vec::with_capacity(admin_rows.len());
    for row in admin_rows {
        let Some(level) = AdminLevel::parse(&row.level) else {
            warn!(level = %row.level, code = %row.code, "skipping admin area with unknown level");
            continue;
        };
        match geometry_from_geojson(&row.geom) {
            Ok(geometry) => admin_areas.push(AdminArea {
                level,
                code: row.code,
                geometry,
                valid_from: row.valid_from,
                valid_to: row.valid_to,
            }),
            Err(e) => warn!(code = %row.code, error = %e, "skipping admin area with bad geometry"),
        }
    }

    Ok(ReferenceIndex::new(places, admin_areas))
}
