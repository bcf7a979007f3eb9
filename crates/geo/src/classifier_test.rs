//! Classifier tests
//!
//! Exercise containment, validity windows, and the coarse-precision
//! degradation with small synthetic geometries.

use chrono::{DateTime, TimeZone, Utc};
use serde_json::json;

use crate::reference::geometry_from_geojson;
use crate::{
    AdminArea, AdminLevel, GeoClassifier, PlaceGeofence, PrecisionClass, ReferenceIndex,
};

/// Santo Domingo test point
const LAT: f64 = 18.4861;
const LON: f64 = -69.9312;

fn ts(h: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 25, h, 0, 0).unwrap()
}

/// A square roughly 0.2 degrees on a side around the test point
fn square_around(lat: f64, lon: f64, half: f64) -> serde_json::Value {
    json!({
        "type": "Polygon",
        "coordinates": [[
            [lon - half, lat - half],
            [lon + half, lat - half],
            [lon + half, lat + half],
            [lon - half, lat + half],
            [lon - half, lat - half],
        ]]
    })
}

fn place(id: &str, half: f64) -> PlaceGeofence {
    PlaceGeofence {
        place_id: id.to_string(),
        geometry: geometry_from_geojson(&square_around(LAT, LON, half)).unwrap(),
        valid_from: None,
        valid_to: None,
    }
}

fn admin(level: AdminLevel, code: &str) -> AdminArea {
    AdminArea {
        level,
        code: code.to_string(),
        geometry: geometry_from_geojson(&square_around(LAT, LON, 0.5)).unwrap(),
        valid_from: None,
        valid_to: None,
    }
}

fn full_index() -> ReferenceIndex {
    ReferenceIndex::new(
        vec![place("plc_colonial_zone", 0.1)],
        vec![
            admin(AdminLevel::Country, "DO"),
            admin(AdminLevel::Province, "DO-01"),
            admin(AdminLevel::Municipality, "DO-01-01"),
            admin(AdminLevel::Sector, "DO-01-01-SD"),
        ],
    )
}

// =============================================================================
// Containment
// =============================================================================

#[test]
fn test_classify_resolves_place_and_admin() {
    let classifier = GeoClassifier::new(full_index());
    let dims = classifier.classify(LAT, LON, Some(20.0), ts(10)).unwrap();

    assert_eq!(dims.precision, PrecisionClass::High);
    assert_eq!(dims.place_id.as_deref(), Some("plc_colonial_zone"));
    assert_eq!(dims.admin.country.as_deref(), Some("DO"));
    assert_eq!(dims.admin.province.as_deref(), Some("DO-01"));
    assert_eq!(dims.admin.municipality.as_deref(), Some("DO-01-01"));
    assert_eq!(dims.admin.sector.as_deref(), Some("DO-01-01-SD"));
    assert!(!dims.h3_r9.is_empty());
    assert_ne!(dims.h3_r7, dims.h3_r9);
}

#[test]
fn test_point_outside_everything() {
    let classifier = GeoClassifier::new(full_index());
    let dims = classifier.classify(48.8566, 2.3522, Some(20.0), ts(10)).unwrap();

    assert_eq!(dims.place_id, None);
    assert_eq!(dims.admin.country, None);
    // H3 is derived regardless of reference coverage.
    assert!(!dims.h3_r11.is_empty());
}

#[test]
fn test_empty_index_still_classifies() {
    let classifier = GeoClassifier::new(ReferenceIndex::empty());
    let dims = classifier.classify(LAT, LON, Some(120.0), ts(10)).unwrap();
    assert_eq!(dims.precision, PrecisionClass::Medium);
    assert_eq!(dims.place_id, None);
}

// =============================================================================
// Coarse degradation
// =============================================================================

#[test]
fn test_coarse_withholds_small_admin_levels() {
    let classifier = GeoClassifier::new(full_index());
    let dims = classifier.classify(LAT, LON, Some(500.0), ts(10)).unwrap();

    assert_eq!(dims.precision, PrecisionClass::Coarse);
    assert_eq!(dims.admin.country.as_deref(), Some("DO"));
    assert_eq!(dims.admin.province.as_deref(), Some("DO-01"));
    assert_eq!(dims.admin.municipality, None);
    assert_eq!(dims.admin.sector, None);
}

#[test]
fn test_missing_accuracy_is_coarse() {
    let classifier = GeoClassifier::new(full_index());
    let dims = classifier.classify(LAT, LON, None, ts(10)).unwrap();
    assert_eq!(dims.precision, PrecisionClass::Coarse);
    assert_eq!(dims.admin.sector, None);
}

// =============================================================================
// Validity windows
// =============================================================================

#[test]
fn test_validity_window_filters_by_event_time() {
    let mut expired = place("plc_old", 0.1);
    expired.valid_to = Some(ts(9));
    let mut future = place("plc_new", 0.1);
    future.valid_from = Some(ts(11));

    let index = ReferenceIndex::new(vec![expired, future], vec![]);
    let classifier = GeoClassifier::new(index);

    // At hour 10, neither window covers the event.
    let dims = classifier.classify(LAT, LON, Some(20.0), ts(10)).unwrap();
    assert_eq!(dims.place_id, None);

    // At hour 9 the old place is still valid, at hour 11 the new one is.
    let dims = classifier.classify(LAT, LON, Some(20.0), ts(9)).unwrap();
    assert_eq!(dims.place_id.as_deref(), Some("plc_old"));
    let dims = classifier.classify(LAT, LON, Some(20.0), ts(11)).unwrap();
    assert_eq!(dims.place_id.as_deref(), Some("plc_new"));
}

// =============================================================================
// Snapshot swap
// =============================================================================

#[test]
fn test_swap_reference_takes_effect() {
    let classifier = GeoClassifier::new(ReferenceIndex::empty());
    let dims = classifier.classify(LAT, LON, Some(20.0), ts(10)).unwrap();
    assert_eq!(dims.place_id, None);

    classifier.swap_reference(full_index());
    let dims = classifier.classify(LAT, LON, Some(20.0), ts(10)).unwrap();
    assert_eq!(dims.place_id.as_deref(), Some("plc_colonial_zone"));
}

// =============================================================================
// Geometry parsing
// =============================================================================

#[test]
fn test_multipolygon_accepted() {
    let doc = json!({
        "type": "MultiPolygon",
        "coordinates": [[[
            [-70.0, 18.4], [-69.8, 18.4], [-69.8, 18.6], [-70.0, 18.6], [-70.0, 18.4]
        ]]]
    });
    assert!(geometry_from_geojson(&doc).is_ok());
}

#[test]
fn test_point_geometry_rejected() {
    let doc = json!({"type": "Point", "coordinates": [-69.9, 18.5]});
    assert!(geometry_from_geojson(&doc).is_err());
}

#[test]
fn test_garbage_geometry_rejected() {
    assert!(geometry_from_geojson(&json!({"type": "Banana"})).is_err());
    assert!(geometry_from_geojson(&json!(42)).is_err());
}
