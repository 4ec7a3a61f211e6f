//! Deterministic vehicle identification derived from the image identifier.
//!
//! The SHA-256 digest of the identifier is split into disjoint big-endian
//! words; each attribute reads its own word, so attributes vary
//! independently of one another but never between calls.

use std::collections::BTreeMap;

use trafficiq_core::ids::{digest_word, hex_prefix, sha256};
use trafficiq_core::{
    BackendError, ImageCondition, InputError, VehicleIdentification, VehiclePredictor,
    validate_identifier,
};

use crate::catalog::{BODY_TYPES, COLORS, MAKES, MODELS, YEAR_RANGES, pick};

pub const MODEL_VERSION: &str = "mock-oracle-v1";

/// Confidence range the oracle reports.
pub const CONFIDENCE_MIN: f64 = 0.50;
pub const CONFIDENCE_MAX: f64 = 0.95;

// Byte offsets of each attribute's word in the digest.
const MAKE_AT: usize = 0;
const MODEL_AT: usize = 4;
const COLOR_AT: usize = 8;
const BODY_AT: usize = 12;
const YEAR_AT: usize = 16;
const CONFIDENCE_AT: usize = 20;

/// Identifier markers that force an image condition, in precedence order.
const CONDITION_MARKERS: [(&str, ImageCondition); 4] = [
    ("night", ImageCondition::Night),
    ("blur", ImageCondition::Blur),
    ("rain", ImageCondition::Rain),
    ("low_res", ImageCondition::LowRes),
];

/// `word` mapped onto `[lo, hi]`.
pub(crate) fn rescale(word: u32, lo: f64, hi: f64) -> f64 {
    lo + (word as f64 / u32::MAX as f64) * (hi - lo)
}

/// Condition named by the identifier, else chosen by digest parity.
pub fn image_condition(image_uri: &str, digest: &[u8; 32]) -> ImageCondition {
    let lower = image_uri.to_ascii_lowercase();
    CONDITION_MARKERS
        .iter()
        .find(|(marker, _)| lower.contains(marker))
        .map(|(_, c)| *c)
        .unwrap_or(if digest[31] % 2 == 0 {
            ImageCondition::Clear
        } else {
            ImageCondition::LowRes
        })
}

/// Predict a vehicle for `image_uri`. Same identifier, same answer.
pub fn predict_vehicle(image_uri: &str) -> Result<VehicleIdentification, InputError> {
    let image_uri = validate_identifier(image_uri)?;
    let d = sha256(image_uri.as_bytes());

    let metadata = BTreeMap::from([
        ("model_version".to_string(), MODEL_VERSION.to_string()),
        ("prediction_type".to_string(), "mock".to_string()),
        ("digest".to_string(), hex_prefix(&d, 8)),
    ]);

    Ok(VehicleIdentification {
        make: pick(MAKES, digest_word(&d, MAKE_AT)).to_string(),
        model: pick(MODELS, digest_word(&d, MODEL_AT)).to_string(),
        year_range: pick(YEAR_RANGES, digest_word(&d, YEAR_AT)).to_string(),
        color: pick(COLORS, digest_word(&d, COLOR_AT)).to_string(),
        body_type: pick(BODY_TYPES, digest_word(&d, BODY_AT)).to_string(),
        confidence: rescale(digest_word(&d, CONFIDENCE_AT), CONFIDENCE_MIN, CONFIDENCE_MAX),
        image_condition: image_condition(image_uri, &d),
        metadata,
    })
}

/// [`VehiclePredictor`] backed by [`predict_vehicle`].
#[derive(Debug, Clone, Copy, Default)]
pub struct MockVehiclePredictor;

impl VehiclePredictor for MockVehiclePredictor {
    fn predict(&self, image_uri: &str) -> Result<VehicleIdentification, BackendError> {
        let id = predict_vehicle(image_uri)?;
        tracing::debug!(
            image_uri,
            make = %id.make,
            model = %id.model,
            confidence = id.confidence,
            condition = %id.image_condition,
            "mock prediction"
        );
        Ok(id)
    }
}
