//! Geo family materializer
//!
//! One transaction per event: classify the point, persist any unseen H3
//! cell geometries, upsert both presence facts, feed the insert deltas into
//! the hourly aggregates, and fold the customer snapshot.

use std::collections::HashSet;

use parking_lot::Mutex;
use sqlx::PgConnection;
use tracing::debug;

use sb_geo::{hour_bucket, CellGeometry, GeoClassifier, GeoDimensions};
use sb_protocol::NormalizedEvent;
use sb_store::presence::PresenceFacts;
use sb_store::{aggregates, customer, presence};

use crate::error::Result;

/// In-process cache of cell ids already written to `h3_cells`, to keep the
/// hot loop from re-inserting the same geometry on every ping. Bounded by a
/// soft cap for long-running workers.
pub struct H3CellCache {
    seen: Mutex<HashSet<String>>,
}

const H3_CACHE_SOFT_CAP: usize = 20_000;

impl H3CellCache {
    pub fn new() -> Self {
        Self {
            seen: Mutex::new(HashSet::new()),
        }
    }

    /// True when the cell has not been seen yet (and is now marked seen).
    fn mark(&self, cell: &str) -> bool {
        let mut seen = self.seen.lock();
        if seen.contains(cell) {
            return false;
        }
        if seen.len() > H3_CACHE_SOFT_CAP {
            seen.clear();
        }
        seen.insert(cell.to_string());
        true
    }
}

impl Default for H3CellCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Materialize one geo event.
pub async fn materialize(
    conn: &mut PgConnection,
    classifier: &GeoClassifier,
    h3_cache: &H3CellCache,
    ev: &NormalizedEvent,
) -> Result<()> {
    // A geo event without usable coordinates has nothing to materialize.
    let Some(geo) = ev.geo_context() else {
        debug!(event = %ev.event_name, "geo event without coordinates, skipping");
        return Ok(());
    };

    let dims = classifier.classify(geo.lat, geo.lon, geo.accuracy_m, ev.occurred_at)?;
    ensure_cells(&mut *conn, classifier, h3_cache, geo.lat, geo.lon).await?;

    let bucket = hour_bucket(ev.occurred_at);
    let facts = PresenceFacts::from_dimensions(&dims, ev.occurred_at);

    let device = presence::upsert_device(
        &mut *conn,
        ev.app_uuid,
        bucket,
        &ev.device_id_hash,
        &ev.anon_user_id,
        &facts,
    )
    .await?;
    let user = presence::upsert_user(&mut *conn, ev.app_uuid, bucket, &ev.anon_user_id, &facts)
        .await?;

    let devices_inc = i64::from(device.inserted);
    let users_inc = i64::from(user.inserted);
    if devices_inc + users_inc > 0 {
        bump_aggregates(&mut *conn, ev, &dims, bucket, devices_inc, users_inc).await?;
    }

    customer::apply_geo(&mut *conn, ev, &dims).await?;
    Ok(())
}

/// Lazily persist the geometries of the cells this point landed in.
async fn ensure_cells(
    conn: &mut PgConnection,
    classifier: &GeoClassifier,
    h3_cache: &H3CellCache,
    lat: f64,
    lon: f64,
) -> Result<()> {
    for cell in classifier.cells(lat, lon)?.all() {
        let id = cell.to_string();
        if h3_cache.mark(&id) {
            aggregates::ensure_h3_cell(&mut *conn, &CellGeometry::of(cell)).await?;
        }
    }
    Ok(())
}

/// Apply the presence insert deltas to the r9/place/admin hourly counters.
async fn bump_aggregates(
    conn: &mut PgConnection,
    ev: &NormalizedEvent,
    dims: &GeoDimensions,
    bucket: chrono::DateTime<chrono::Utc>,
    devices_inc: i64,
    users_inc: i64,
) -> Result<()> {
    aggregates::bump_h3_hourly(
        &mut *conn,
        ev.app_uuid,
        bucket,
        &dims.h3_r9,
        devices_inc,
        users_inc,
    )
    .await?;

    if let Some(place_id) = &dims.place_id {
        aggregates::bump_place_hourly(
            &mut *conn,
            ev.app_uuid,
            bucket,
            place_id,
            devices_inc,
            users_inc,
        )
        .await?;
    }

    let levels = [
        ("country", dims.admin.country.as_ref()),
        ("province", dims.admin.province.as_ref()),
        ("municipality", dims.admin.municipality.as_ref()),
        ("sector", dims.admin.sector.as_ref()),
    ];
    for (level, code) in levels {
        if let Some(code) = code {
            aggregates::bump_admin_hourly(
                &mut *conn,
                ev.app_uuid,
                bucket,
                level,
                code,
                devices_inc,
                users_inc,
            )
            .await?;
        }
    }

    Ok(())
}
