//! Reference geometries
//!
//! Places and administrative areas are maintained by external importers; the
//! processor treats them as read-only. They are loaded into this in-process
//! index and queried by containment, with validity windows filtered against
//! the event timestamp.

use chrono::{DateTime, Utc};
use geo::Contains;
use geo_types::{Geometry, Point};

use crate::error::{GeoError, Result};

/// Administrative hierarchy levels, largest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdminLevel {
    Country,
    Province,
    Municipality,
    Sector,
}

impl AdminLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Country => "country",
            Self::Province => "province",
            Self::Municipality => "municipality",
            Self::Sector => "sector",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "country" => Some(Self::Country),
            "province" => Some(Self::Province),
            "municipality" => Some(Self::Municipality),
            "sector" => Some(Self::Sector),
            _ => None,
        }
    }
}

/// One place geofence
#[derive(Debug, Clone)]
pub struct PlaceGeofence {
    pub place_id: String,
    pub geometry: Geometry<f64>,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_to: Option<DateTime<Utc>>,
}

/// One administrative area polygon
#[derive(Debug, Clone)]
pub struct AdminArea {
    pub level: AdminLevel,
    pub code: String,
    pub geometry: Geometry<f64>,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_to: Option<DateTime<Utc>>,
}

/// Admin codes resolved for one point, one per level
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdminCodes {
    pub country: Option<String>,
    pub province: Option<String>,
    pub municipality: Option<String>,
    pub sector: Option<String>,
}

/// In-process snapshot of the reference tables
#[derive(Debug, Clone, Default)]
pub struct ReferenceIndex {
    places: Vec<PlaceGeofence>,
    admin_areas: Vec<AdminArea>,
}

impl ReferenceIndex {
    pub fn new(places: Vec<PlaceGeofence>, admin_areas: Vec<AdminArea>) -> Self {
        Self {
            places,
            admin_areas,
        }
    }

    /// An index with no geometries; every lookup resolves to nothing.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn place_count(&self) -> usize {
        self.places.len()
    }

    pub fn admin_area_count(&self) -> usize {
        self.admin_areas.len()
    }

    /// First place whose geofence contains the point and whose validity
    /// window covers `at`.
    pub fn place_at(&self, lat: f64, lon: f64, at: DateTime<Utc>) -> Option<&str> {
        let point = Point::new(lon, lat);
        self.places
            .iter()
            .find(|p| window_covers(p.valid_from, p.valid_to, at) && p.geometry.contains(&point))
            .map(|p| p.place_id.as_str())
    }

    /// Admin codes for the point, first match per level.
    pub fn admin_codes_at(&self, lat: f64, lon: f64, at: DateTime<Utc>) -> AdminCodes {
        let point = Point::new(lon, lat);
        let mut codes = AdminCodes::default();

        for area in &self.admin_areas {
            let slot = match area.level {
                AdminLevel::Country => &mut codes.country,
                AdminLevel::Province => &mut codes.province,
                AdminLevel::Municipality => &mut codes.municipality,
                AdminLevel::Sector => &mut codes.sector,
            };
            if slot.is_some() {
                continue;
            }
            if window_covers(area.valid_from, area.valid_to, at) && area.geometry.contains(&point)
            {
                *slot = Some(area.code.clone());
            }
        }

        codes
    }
}

fn window_covers(
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
    at: DateTime<Utc>,
) -> bool {
    from.is_none_or(|f| f <= at) && to.is_none_or(|t| t >= at)
}

/// Parse a stored GeoJSON geometry document into a polygonal geometry.
pub fn geometry_from_geojson(value: &serde_json::Value) -> Result<Geometry<f64>> {
    let geometry: geojson::Geometry = serde_json::from_value(value.clone())
        .map_err(|e| GeoError::InvalidGeometry(e.to_string()))?;
    let geometry = Geometry::<f64>::try_from(geometry)
        .map_err(|e| GeoError::InvalidGeometry(e.to_string()))?;

    match geometry {
        Geometry::Polygon(_) | Geometry::MultiPolygon(_) => Ok(geometry),
        _ => Err(GeoError::NotPolygonal),
    }
}
