//! Per-request data model shared by the oracle, policy engine, router and stores.
//!
//! Every value here is produced once per pipeline run and never mutated
//! afterwards. Maps use `BTreeMap` so serialised output is byte-stable.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::trace::Stage;

/// Capture quality of the source image as reported by the predictor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageCondition {
    Clear,
    Night,
    Blur,
    Rain,
    LowRes,
}

impl ImageCondition {
    pub const ALL: [ImageCondition; 5] = [
        Self::Clear,
        Self::Night,
        Self::Blur,
        Self::Rain,
        Self::LowRes,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Clear => "clear",
            Self::Night => "night",
            Self::Blur => "blur",
            Self::Rain => "rain",
            Self::LowRes => "low_res",
        }
    }

    /// Night, blur and rain force plate extraction regardless of confidence.
    pub fn is_adverse(&self) -> bool {
        matches!(self, Self::Night | Self::Blur | Self::Rain)
    }
}

impl fmt::Display for ImageCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A vehicle identification produced by a [`VehiclePredictor`](crate::VehiclePredictor).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleIdentification {
    pub make: String,
    pub model: String,
    /// Inclusive model-year range, e.g. `"2020-2021"`.
    pub year_range: String,
    pub color: String,
    pub body_type: String,
    /// Raw predictor confidence in `[0, 1]`.
    pub confidence: f64,
    pub image_condition: ImageCondition,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

/// Result of one plate extraction attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlateResult {
    /// `None` when the extractor could not resolve a plate.
    pub plate: Option<String>,
    pub confidence: f64,
}

/// Outcome of a watchlist (BOLO) correlation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchlistMatch {
    pub is_match: bool,
    pub make: Option<String>,
    pub model: Option<String>,
    pub year_range: Option<String>,
    pub plate: Option<String>,
    pub reason: String,
    pub match_confidence: f64,
    /// `BOLO-<KIND>-<hex>`; stable for the same matched watchlist value.
    pub record_id: Option<String>,
}

impl WatchlistMatch {
    pub fn no_match() -> Self {
        Self {
            is_match: false,
            make: None,
            model: None,
            year_range: None,
            plate: None,
            reason: "No match found".to_string(),
            match_confidence: 0.0,
            record_id: None,
        }
    }
}

/// Case urgency. Ordering follows urgency: `P0 < P1 < P2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Priority {
    /// Watchlist match with high identification confidence.
    P0,
    /// Watchlist match below the P0 confidence threshold.
    P1,
    /// No watchlist match.
    P2,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::P0 => "P0",
            Self::P1 => "P1",
            Self::P2 => "P2",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable audit record of one pipeline run.
///
/// Built by the router's evidence builder after priority assignment; two runs
/// over the same inputs differ only in `packet_id` and `created_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidencePacket {
    pub packet_id: String,
    pub created_at: DateTime<Utc>,
    pub image_uri: String,
    /// Capture time supplied by the caller, if any.
    pub captured_at: Option<DateTime<Utc>>,
    pub location: Option<String>,
    pub vehicle: VehicleIdentification,
    pub ocr_fallback_used: bool,
    pub plate: Option<PlateResult>,
    /// Whether the extracted plate passed the usability gate and was sent to
    /// the watchlist lookup.
    pub plate_used_for_lookup: bool,
    pub watchlist: WatchlistMatch,
    pub priority: Priority,
    /// Trace as of packet creation.
    pub trace: Vec<Stage>,
    pub notes: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum CaseStatus {
    Open,
}

impl CaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
        }
    }
}

impl fmt::Display for CaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Investigator-facing case produced once per successful run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseRecord {
    pub case_id: String,
    pub priority: Priority,
    pub summary: String,
    pub vehicle_make: String,
    pub vehicle_model: String,
    pub vehicle_year_range: String,
    pub plate_number: Option<String>,
    pub location: Option<String>,
    /// Where the case store persisted the evidence packet.
    pub evidence_ref: String,
    pub status: CaseStatus,
    pub created_at: DateTime<Utc>,
}

impl CaseRecord {
    /// Open a new case for `packet`.
    pub fn open(
        case_id: String,
        packet: &EvidencePacket,
        priority: Priority,
        evidence_ref: String,
    ) -> Self {
        Self {
            case_id,
            priority,
            summary: case_summary(packet, priority),
            vehicle_make: packet.vehicle.make.clone(),
            vehicle_model: packet.vehicle.model.clone(),
            vehicle_year_range: packet.vehicle.year_range.clone(),
            plate_number: packet.plate.as_ref().and_then(|p| p.plate.clone()),
            location: packet.location.clone(),
            evidence_ref,
            status: CaseStatus::Open,
            created_at: Utc::now(),
        }
    }
}

/// One-paragraph case summary shown to investigators.
pub fn case_summary(packet: &EvidencePacket, priority: Priority) -> String {
    let v = &packet.vehicle;
    format!(
        "Vehicle ID: {} {} ({}) - {} {}. Confidence: {:.1}%. \
         BOLO Match: {} ({}). OCR used: {}. Priority: {}.",
        v.make,
        v.model,
        v.year_range,
        v.color,
        v.body_type,
        v.confidence * 100.0,
        packet.watchlist.is_match,
        packet.watchlist.reason,
        packet.ocr_fallback_used,
        priority,
    )
}

/// Aggregate returned to the caller of a full pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentResult {
    pub image_uri: String,
    pub vehicle: VehicleIdentification,
    pub ocr_fallback_used: bool,
    pub plate: Option<PlateResult>,
    pub watchlist: WatchlistMatch,
    pub priority: Priority,
    pub case: CaseRecord,
    pub processing_steps: Vec<Stage>,
    pub total_processing_time_ms: f64,
    pub location: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn packet() -> EvidencePacket {
        EvidencePacket {
            packet_id: "EV-0badf00d".into(),
            created_at: "2026-03-01T12:00:00Z".parse().unwrap(),
            image_uri: "gs://cams/i-95/0001.jpg".into(),
            captured_at: Some("2026-03-01T11:59:58Z".parse().unwrap()),
            location: Some("I-95 NB mile 12".into()),
            vehicle: VehicleIdentification {
                make: "Honda".into(),
                model: "Civic".into(),
                year_range: "2020-2021".into(),
                color: "Black".into(),
                body_type: "sedan".into(),
                confidence: 0.85,
                image_condition: ImageCondition::Clear,
                metadata: BTreeMap::from([("model_version".into(), "mock-oracle-v1".into())]),
            },
            ocr_fallback_used: false,
            plate: None,
            plate_used_for_lookup: false,
            watchlist: WatchlistMatch {
                is_match: true,
                make: Some("Honda".into()),
                model: None,
                year_range: None,
                plate: None,
                reason: "Make 'Honda' on watchlist".into(),
                match_confidence: 0.85,
                record_id: Some("BOLO-MAKE-1a2b3c4d".into()),
            },
            priority: Priority::P0,
            trace: vec![Stage::VehiclePredictionRequest, Stage::VehiclePredictionReceived],
            notes: "OCR fallback used: false, BOLO match: true".into(),
        }
    }

    #[test]
    fn priority_orders_by_urgency() {
        assert!(Priority::P0 < Priority::P1);
        assert!(Priority::P1 < Priority::P2);
        assert_eq!(Priority::P1.to_string(), "P1");
    }

    #[test]
    fn adverse_conditions() {
        let adverse: Vec<_> = ImageCondition::ALL
            .iter()
            .filter(|c| c.is_adverse())
            .collect();
        assert_eq!(
            adverse,
            vec![&ImageCondition::Night, &ImageCondition::Blur, &ImageCondition::Rain]
        );
    }

    #[test]
    fn condition_serialises_snake_case() {
        let json = serde_json::to_string(&ImageCondition::LowRes).unwrap();
        assert_eq!(json, "\"low_res\"");
    }

    #[test]
    fn evidence_packet_json_roundtrip() {
        let original = packet();
        let json = serde_json::to_string(&original).unwrap();
        let parsed: EvidencePacket = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, original);
        assert!(json.contains("\"vehicle_prediction_request\""));
    }

    #[test]
    fn case_record_opens_with_summary() {
        let p = packet();
        let case = CaseRecord::open(
            "CASE-00000001".into(),
            &p,
            p.priority,
            "memory://EV-0badf00d".into(),
        );
        assert_eq!(case.status, CaseStatus::Open);
        assert_eq!(case.vehicle_make, "Honda");
        assert_eq!(case.plate_number, None);
        assert_eq!(
            case.summary,
            "Vehicle ID: Honda Civic (2020-2021) - Black sedan. Confidence: 85.0%. \
             BOLO Match: true (Make 'Honda' on watchlist). OCR used: false. Priority: P0."
        );
    }
}
