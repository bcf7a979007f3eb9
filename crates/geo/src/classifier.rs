//! The classifier itself
//!
//! Holds the current reference snapshot behind a lock so a refresh task can
//! swap it without pausing consumers.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::cells::CellTriplet;
use crate::error::Result;
use crate::precision::PrecisionClass;
use crate::reference::{AdminCodes, ReferenceIndex};

/// Everything the materializers store about one point
#[derive(Debug, Clone, PartialEq)]
pub struct GeoDimensions {
    pub lat: f64,
    pub lon: f64,
    pub accuracy_m: Option<f64>,
    pub precision: PrecisionClass,
    pub h3_r7: String,
    pub h3_r9: String,
    pub h3_r11: String,
    pub place_id: Option<String>,
    pub admin: AdminCodes,
}

/// Shared classifier
pub struct GeoClassifier {
    reference: RwLock<Arc<ReferenceIndex>>,
}

impl GeoClassifier {
    pub fn new(reference: ReferenceIndex) -> Self {
        Self {
            reference: RwLock::new(Arc::new(reference)),
        }
    }

    /// Replace the reference snapshot (called by the refresh task).
    pub fn swap_reference(&self, reference: ReferenceIndex) {
        *self.reference.write() = Arc::new(reference);
    }

    /// Current reference snapshot
    pub fn reference(&self) -> Arc<ReferenceIndex> {
        Arc::clone(&self.reference.read())
    }

    /// Classify one point observed at `event_ts`.
    ///
    /// H3 indices are always derived; for coarse precision the municipality
    /// and sector codes are withheld so low-accuracy points never pin a
    /// device to a small area.
    pub fn classify(
        &self,
        lat: f64,
        lon: f64,
        accuracy_m: Option<f64>,
        event_ts: DateTime<Utc>,
    ) -> Result<GeoDimensions> {
        let cells = CellTriplet::compute(lat, lon)?;
        let precision = PrecisionClass::from_accuracy(accuracy_m);

        let reference = self.reference();
        let place_id = reference.place_at(lat, lon, event_ts).map(str::to_string);
        let mut admin = reference.admin_codes_at(lat, lon, event_ts);

        if precision == PrecisionClass::Coarse {
            admin.municipality = None;
            admin.sector = None;
        }

        Ok(GeoDimensions {
            lat,
            lon,
            accuracy_m,
            precision,
            h3_r7: cells.r7.to_string(),
            h3_r9: cells.r9.to_string(),
            h3_r11: cells.r11.to_string(),
            place_id,
            admin,
        })
    }

    /// The cells derived for a point, for lazy cell-geometry persistence.
    pub fn cells(&self, lat: f64, lon: f64) -> Result<CellTriplet> {
        CellTriplet::compute(lat, lon)
    }
}
