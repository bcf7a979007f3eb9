//! Classifier error types

use thiserror::Error;

/// Geospatial classification errors
#[derive(Debug, Error)]
pub enum GeoError {
    /// Coordinates outside the valid lat/lon range
    #[error("invalid coordinates: lat={lat}, lon={lon}")]
    InvalidCoordinates { lat: f64, lon: f64 },

    /// A reference geometry could not be parsed as GeoJSON
    #[error("invalid reference geometry: {0}")]
    InvalidGeometry(String),

    /// A reference geometry is not polygonal
    #[error("reference geometry must be a Polygon or MultiPolygon")]
    NotPolygonal,
}

/// Result type for classification
pub type Result<T> = std::result::Result<T, GeoError>;
