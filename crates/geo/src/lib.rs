//! SB Analytics - Geospatial classifier
//!
//! Maps a point plus reported accuracy to the dimensions the materializers
//! store: H3 cells at three resolutions, the containing place geofence, the
//! administrative hierarchy, and a bucketed precision class.
//!
//! Reference geometries (places, admin areas) are plain GeoJSON loaded from
//! the relational store into an in-process [`ReferenceIndex`]; containment is
//! evaluated here rather than pushed into SQL so the classifier is a pure
//! function of its inputs.

mod cells;
mod classifier;
mod error;
mod precision;
mod reference;

pub use cells::{CellGeometry, CellTriplet};
pub use classifier::{GeoClassifier, GeoDimensions};
pub use error::{GeoError, Result};
pub use precision::PrecisionClass;
pub use reference::{
    geometry_from_geojson, AdminArea, AdminCodes, AdminLevel, PlaceGeofence, ReferenceIndex,
};

use chrono::{DateTime, Timelike, Utc};

/// Truncate a timestamp to the start of its UTC hour.
///
/// This is the grain of every presence fact and hourly aggregate.
pub fn hour_bucket(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.with_minute(0)
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_nanosecond(0))
        // Unreachable: 0 is always a valid minute/second/nanosecond.
        .unwrap_or(ts)
}

#[cfg(test)]
mod classifier_test;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_hour_bucket_truncates() {
        let ts = Utc.with_ymd_and_hms(2026, 1, 25, 10, 5, 33).unwrap();
        let bucket = hour_bucket(ts);
        assert_eq!(bucket, Utc.with_ymd_and_hms(2026, 1, 25, 10, 0, 0).unwrap());
    }

    #[test]
    fn test_hour_bucket_idempotent() {
        let ts = Utc.with_ymd_and_hms(2026, 1, 25, 10, 0, 0).unwrap();
        assert_eq!(hour_bucket(ts), ts);
    }
}
