//! Decision policy: OCR fallback trigger, plate usability gate, priority tiers.
//!
//! All decisions are pure functions of their inputs and a validated
//! [`PolicyConfig`]. Thresholds live here and nowhere else.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{ImageCondition, PlateResult, Priority, VehicleIdentification, WatchlistMatch};

/// Identification confidence at or above which OCR can be skipped.
pub const DEFAULT_MIN_CONFIDENCE_TO_SKIP_OCR: f64 = 0.70;
/// Plate confidence required before a plate is used for watchlist correlation.
pub const DEFAULT_MIN_PLATE_CONFIDENCE_FOR_BOLO: f64 = 0.60;
/// Identification confidence required for a watchlist match to be P0.
pub const DEFAULT_P0_MIN_CONFIDENCE: f64 = 0.70;

/// Confidence deducted per image condition.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConditionPenalties {
    pub night: f64,
    pub blur: f64,
    pub rain: f64,
    pub low_res: f64,
}

impl ConditionPenalties {
    /// Penalty for `condition`; clear images are never penalised.
    pub fn for_condition(&self, condition: ImageCondition) -> f64 {
        match condition {
            ImageCondition::Clear => 0.0,
            ImageCondition::Night => self.night,
            ImageCondition::Blur => self.blur,
            ImageCondition::Rain => self.rain,
            ImageCondition::LowRes => self.low_res,
        }
    }

    /// `confidence` minus the penalty for `condition`, floored at zero.
    pub fn apply(&self, confidence: f64, condition: ImageCondition) -> f64 {
        (confidence - self.for_condition(condition)).max(0.0)
    }
}

impl Default for ConditionPenalties {
    fn default() -> Self {
        Self {
            night: 0.15,
            blur: 0.20,
            rain: 0.15,
            low_res: 0.0,
        }
    }
}

/// Tunable policy thresholds. Validate with [`Policy::new`] before use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Effective identification confidence needed to skip plate extraction.
    pub min_confidence_to_skip_ocr: f64,
    /// Plate confidence needed for the plate to take part in the watchlist lookup.
    pub min_plate_confidence_for_bolo: f64,
    /// Penalties used to derive effective confidence for the OCR decision.
    pub penalties: ConditionPenalties,
    /// Raw identification confidence needed for a match to be P0 rather than P1.
    pub p0_min_confidence: f64,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            min_confidence_to_skip_ocr: DEFAULT_MIN_CONFIDENCE_TO_SKIP_OCR,
            min_plate_confidence_for_bolo: DEFAULT_MIN_PLATE_CONFIDENCE_FOR_BOLO,
            penalties: ConditionPenalties::default(),
            p0_min_confidence: DEFAULT_P0_MIN_CONFIDENCE,
        }
    }
}

impl PolicyConfig {
    /// Parse a JSON policy document; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn validate(&self) -> Result<(), PolicyConfigError> {
        check_unit("min_confidence_to_skip_ocr", self.min_confidence_to_skip_ocr)?;
        check_unit(
            "min_plate_confidence_for_bolo",
            self.min_plate_confidence_for_bolo,
        )?;
        check_unit("p0_min_confidence", self.p0_min_confidence)?;
        check_penalty("penalties.night", self.penalties.night)?;
        check_penalty("penalties.blur", self.penalties.blur)?;
        check_penalty("penalties.rain", self.penalties.rain)?;
        check_penalty("penalties.low_res", self.penalties.low_res)?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PolicyConfigError {
    #[error("{field} must be within [0, 1], got {value}")]
    OutOfRange { field: &'static str, value: f64 },
    #[error("{field} must be a non-negative penalty no greater than 1, got {value}")]
    InvalidPenalty { field: &'static str, value: f64 },
}

fn check_unit(field: &'static str, value: f64) -> Result<(), PolicyConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(PolicyConfigError::OutOfRange { field, value })
    }
}

fn check_penalty(field: &'static str, value: f64) -> Result<(), PolicyConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(PolicyConfigError::InvalidPenalty { field, value })
    }
}

/// Why the OCR decision came out the way it did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OcrDecision {
    pub effective_confidence: f64,
    /// Effective confidence fell below the skip threshold.
    pub low_confidence: bool,
    /// Condition is night, blur or rain.
    pub adverse_condition: bool,
}

impl OcrDecision {
    pub fn needed(&self) -> bool {
        self.low_confidence || self.adverse_condition
    }
}

/// A validated policy. The only way to obtain one is through [`Policy::new`].
#[derive(Debug, Clone, PartialEq)]
pub struct Policy {
    config: PolicyConfig,
}

impl Policy {
    pub fn new(config: PolicyConfig) -> Result<Self, PolicyConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PolicyConfig {
        &self.config
    }

    /// Raw confidence minus the condition penalty, floored at zero.
    pub fn effective_confidence(&self, id: &VehicleIdentification) -> f64 {
        self.config.penalties.apply(id.confidence, id.image_condition)
    }

    pub fn ocr_decision(&self, id: &VehicleIdentification) -> OcrDecision {
        let effective_confidence = self.effective_confidence(id);
        OcrDecision {
            effective_confidence,
            low_confidence: effective_confidence < self.config.min_confidence_to_skip_ocr,
            adverse_condition: id.image_condition.is_adverse(),
        }
    }

    /// Plate extraction is needed when effective confidence is low or the
    /// image condition is adverse; either alone suffices.
    pub fn needs_ocr(&self, id: &VehicleIdentification) -> bool {
        self.ocr_decision(id).needed()
    }

    /// A plate is usable for correlation only if resolved and confident enough.
    pub fn plate_usable(&self, plate: &PlateResult) -> bool {
        plate.plate.is_some() && plate.confidence >= self.config.min_plate_confidence_for_bolo
    }

    /// Priority from the match flag and the raw identification confidence.
    pub fn priority_for(&self, is_match: bool, confidence: f64) -> Priority {
        match (is_match, confidence >= self.config.p0_min_confidence) {
            (true, true) => Priority::P0,
            (true, false) => Priority::P1,
            (false, _) => Priority::P2,
        }
    }

    /// Uses the original identification confidence, never the effective or
    /// plate confidence.
    pub fn assign_priority(&self, m: &WatchlistMatch, id: &VehicleIdentification) -> Priority {
        self.priority_for(m.is_match, id.confidence)
    }
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            config: PolicyConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn ident(confidence: f64, image_condition: ImageCondition) -> VehicleIdentification {
        VehicleIdentification {
            make: "Ford".into(),
            model: "F150".into(),
            year_range: "2022-2023".into(),
            color: "Gray".into(),
            body_type: "truck".into(),
            confidence,
            image_condition,
            metadata: BTreeMap::new(),
        }
    }

    fn matched(is_match: bool) -> WatchlistMatch {
        WatchlistMatch {
            is_match,
            ..WatchlistMatch::no_match()
        }
    }

    #[test]
    fn default_config_is_valid() {
        assert!(PolicyConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_out_of_range_thresholds() {
        let config = PolicyConfig {
            min_confidence_to_skip_ocr: 1.2,
            ..Default::default()
        };
        assert_eq!(
            Policy::new(config),
            Err(PolicyConfigError::OutOfRange {
                field: "min_confidence_to_skip_ocr",
                value: 1.2
            })
        );

        let nan = PolicyConfig {
            p0_min_confidence: f64::NAN,
            ..Default::default()
        };
        assert!(matches!(
            Policy::new(nan),
            Err(PolicyConfigError::OutOfRange {
                field: "p0_min_confidence",
                ..
            })
        ));
    }

    #[test]
    fn rejects_negative_penalty() {
        let config = PolicyConfig {
            penalties: ConditionPenalties {
                rain: -0.1,
                ..Default::default()
            },
            ..Default::default()
        };
        assert_eq!(
            Policy::new(config),
            Err(PolicyConfigError::InvalidPenalty {
                field: "penalties.rain",
                value: -0.1
            })
        );
    }

    #[test]
    fn partial_json_takes_defaults() {
        let json = r#"{ "p0_min_confidence": 0.8, "penalties": { "night": 0.3 } }"#;
        let config = PolicyConfig::from_json(json).unwrap();
        assert_eq!(config.p0_min_confidence, 0.8);
        assert_eq!(config.penalties.night, 0.3);
        assert_eq!(config.penalties.blur, 0.20);
        assert_eq!(config.min_confidence_to_skip_ocr, DEFAULT_MIN_CONFIDENCE_TO_SKIP_OCR);
    }

    #[test]
    fn effective_confidence_floors_at_zero() {
        let policy = Policy::default();
        assert_eq!(policy.effective_confidence(&ident(0.1, ImageCondition::Blur)), 0.0);
        assert_eq!(policy.effective_confidence(&ident(0.9, ImageCondition::Clear)), 0.9);
        assert_eq!(policy.effective_confidence(&ident(0.9, ImageCondition::LowRes)), 0.9);
    }

    #[test]
    fn ocr_trigger_rule() {
        let policy = Policy::default();
        // High confidence, clear: skip.
        assert!(!policy.needs_ocr(&ident(0.85, ImageCondition::Clear)));
        // Exactly at threshold: skip.
        assert!(!policy.needs_ocr(&ident(0.70, ImageCondition::Clear)));
        // Confidence trigger alone.
        assert!(policy.needs_ocr(&ident(0.65, ImageCondition::Clear)));
        // Condition trigger alone, even at high confidence.
        for c in [ImageCondition::Night, ImageCondition::Blur, ImageCondition::Rain] {
            assert!(policy.needs_ocr(&ident(0.99, c)), "{c} should force OCR");
        }
        // low_res carries no default penalty and is not adverse.
        assert!(!policy.needs_ocr(&ident(0.75, ImageCondition::LowRes)));
    }

    #[test]
    fn both_triggers_reported() {
        let policy = Policy::default();
        let d = policy.ocr_decision(&ident(0.55, ImageCondition::Night));
        assert!(d.low_confidence);
        assert!(d.adverse_condition);
        assert!(d.needed());
        assert!((d.effective_confidence - 0.40).abs() < 1e-9);
    }

    #[test]
    fn configured_low_res_penalty_can_trigger() {
        let policy = Policy::new(PolicyConfig {
            penalties: ConditionPenalties {
                low_res: 0.10,
                ..Default::default()
            },
            ..Default::default()
        })
        .unwrap();
        assert!(policy.needs_ocr(&ident(0.75, ImageCondition::LowRes)));
    }

    #[test]
    fn plate_usability_gate() {
        let policy = Policy::default();
        let plate = |p: Option<&str>, confidence| PlateResult {
            plate: p.map(str::to_string),
            confidence,
        };
        assert!(policy.plate_usable(&plate(Some("ABC1234"), 0.60)));
        assert!(!policy.plate_usable(&plate(Some("ABC1234"), 0.59)));
        assert!(!policy.plate_usable(&plate(None, 0.95)));
    }

    #[test]
    fn priority_is_total() {
        let policy = Policy::default();
        let confidences = [0.0, 0.3, 0.5, 0.69, 0.70, 0.71, 1.0, f64::NAN];
        for is_match in [false, true] {
            for &c in &confidences {
                let p = policy.priority_for(is_match, c);
                let expected = match (is_match, c >= 0.70) {
                    (false, _) => Priority::P2,
                    (true, true) => Priority::P0,
                    (true, false) => Priority::P1,
                };
                assert_eq!(p, expected, "is_match={is_match} confidence={c}");
            }
        }
    }

    #[test]
    fn priority_uses_raw_confidence() {
        let policy = Policy::default();
        // Night penalty would drop effective confidence to 0.60, but priority
        // is computed on the raw 0.75.
        let id = ident(0.75, ImageCondition::Night);
        assert_eq!(policy.assign_priority(&matched(true), &id), Priority::P0);
        assert_eq!(policy.assign_priority(&matched(false), &id), Priority::P2);
    }
}
