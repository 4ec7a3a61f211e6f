//! Deterministic mock oracle: vehicle identification, plate extraction and
//! watchlist correlation derived from SHA-256 digests of the image identifier.

pub mod catalog;
pub mod plate;
pub mod predictor;
pub mod watchlist;

pub use plate::{MockPlateExtractor, PlatePenalties, extract_plate};
pub use predictor::{MockVehiclePredictor, predict_vehicle};
pub use watchlist::{MatchKind, MockWatchlistService, WatchEntry, WatchlistTable};
