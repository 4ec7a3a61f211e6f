//! Capability interfaces for the router's collaborators.
//!
//! Each call blocks until its result is available. Implementations must be
//! shareable across concurrent runs.

use crate::error::BackendError;
use crate::model::{
    CaseRecord, EvidencePacket, ImageCondition, PlateResult, Priority, VehicleIdentification,
    WatchlistMatch,
};

/// Identifies make, model, year range and image condition from an image.
pub trait VehiclePredictor: Send + Sync {
    fn predict(&self, image_uri: &str) -> Result<VehicleIdentification, BackendError>;
}

/// Reads a license plate from an image.
pub trait PlateExtractor: Send + Sync {
    fn extract(
        &self,
        image_uri: &str,
        condition: ImageCondition,
    ) -> Result<PlateResult, BackendError>;
}

/// Correlates a vehicle (and optionally a plate) against the watchlist.
pub trait WatchlistService: Send + Sync {
    fn lookup(
        &self,
        vehicle: &VehicleIdentification,
        plate: Option<&str>,
    ) -> Result<WatchlistMatch, BackendError>;
}

/// Persists evidence and opens cases.
pub trait CaseStore: Send + Sync {
    fn create(
        &self,
        packet: &EvidencePacket,
        priority: Priority,
    ) -> Result<CaseRecord, BackendError>;
}
