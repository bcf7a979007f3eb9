//! H3 cell derivation
//!
//! Cells are computed unconditionally at r7/r9/r11 regardless of precision;
//! consumers degrade to coarser resolutions by filtering on the precision
//! class, not by withholding indices.

use geo_types::{Coord, LineString, Polygon};
use h3o::{CellIndex, LatLng, Resolution};

use crate::error::{GeoError, Result};

/// H3 indices for one point at the three materialized resolutions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellTriplet {
    pub r7: CellIndex,
    pub r9: CellIndex,
    pub r11: CellIndex,
}

impl CellTriplet {
    /// Index a point at r7/r9/r11.
    pub fn compute(lat: f64, lon: f64) -> Result<Self> {
        let point =
            LatLng::new(lat, lon).map_err(|_| GeoError::InvalidCoordinates { lat, lon })?;
        Ok(Self {
            r7: point.to_cell(Resolution::Seven),
            r9: point.to_cell(Resolution::Nine),
            r11: point.to_cell(Resolution::Eleven),
        })
    }

    /// All three cells, coarsest first
    pub fn all(&self) -> [CellIndex; 3] {
        [self.r7, self.r9, self.r11]
    }
}

/// Geometry of one H3 cell, ready to persist
#[derive(Debug, Clone)]
pub struct CellGeometry {
    /// Canonical lowercase-hex cell id
    pub cell: String,
    pub resolution: u8,
    /// Cell boundary as a GeoJSON Polygon document
    pub boundary_geojson: serde_json::Value,
    pub centroid_lat: f64,
    pub centroid_lon: f64,
}

impl CellGeometry {
    /// Compute the persisted geometry of a cell.
    pub fn of(cell: CellIndex) -> Self {
        let centroid = LatLng::from(cell);

        // h3o yields (lat, lng) vertices; GeoJSON wants x=lon, y=lat and a
        // closed ring.
        let mut ring: Vec<Coord<f64>> = cell
            .boundary()
            .iter()
            .map(|v| Coord {
                x: v.lng(),
                y: v.lat(),
            })
            .collect();
        if let (Some(first), Some(last)) = (ring.first().copied(), ring.last().copied()) {
            if first != last {
                ring.push(first);
            }
        }

        let polygon = Polygon::new(LineString::from(ring), vec![]);
        let geometry = geojson::Geometry::new(geojson::Value::from(&polygon));

        Self {
            cell: cell.to_string(),
            resolution: u8::from(cell.resolution()),
            boundary_geojson: serde_json::to_value(&geometry)
                .unwrap_or(serde_json::Value::Null),
            centroid_lat: centroid.lat(),
            centroid_lon: centroid.lng(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_triplet_resolutions() {
        let cells = CellTriplet::compute(18.4861, -69.9312).unwrap();
        assert_eq!(u8::from(cells.r7.resolution()), 7);
        assert_eq!(u8::from(cells.r9.resolution()), 9);
        assert_eq!(u8::from(cells.r11.resolution()), 11);
    }

    #[test]
    fn test_same_point_same_cells() {
        let a = CellTriplet::compute(18.4861, -69.9312).unwrap();
        let b = CellTriplet::compute(18.4861, -69.9312).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_invalid_coordinates_rejected() {
        assert!(CellTriplet::compute(123.0, 0.0).is_err());
        assert!(CellTriplet::compute(0.0, 999.0).is_err());
    }

    #[test]
    fn test_cell_geometry_shape() {
        let cells = CellTriplet::compute(18.4861, -69.9312).unwrap();
        let geom = CellGeometry::of(cells.r9);

        assert_eq!(geom.resolution, 9);
        assert_eq!(geom.cell, cells.r9.to_string());
        assert_eq!(geom.boundary_geojson["type"], "Polygon");

        let ring = geom.boundary_geojson["coordinates"][0].as_array().unwrap();
        // Hexagon (occasionally pentagon) ring, closed.
        assert!(ring.len() >= 6);
        assert_eq!(ring.first(), ring.last());

        // Centroid is near the queried point at r9.
        assert!((geom.centroid_lat - 18.4861).abs() < 0.01);
        assert!((geom.centroid_lon - -69.9312).abs() < 0.01);
    }
}
