//! Pipeline stages and the append-only processing trace.
//!
//! The stage sequence is fixed:
//!
//! ```text
//! vehicle_prediction_request → vehicle_prediction_received
//!   → ocr_skipped | (ocr_triggered → ocr_completed)
//!   → bolo_lookup_started → bolo_lookup_completed
//!   → priority_assignment
//!   → evidence_packet_building → evidence_packet_created
//!   → case_creation → case_created
//! ```
//!
//! [`ProcessingTrace::record`] rejects any marker that the transition table
//! does not allow after the previous one, so a trace can only ever describe a
//! prefix of one of the two legal paths.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    VehiclePredictionRequest,
    VehiclePredictionReceived,
    OcrSkipped,
    OcrTriggered,
    OcrCompleted,
    BoloLookupStarted,
    BoloLookupCompleted,
    PriorityAssignment,
    EvidencePacketBuilding,
    EvidencePacketCreated,
    CaseCreation,
    CaseCreated,
}

impl Stage {
    pub const FIRST: Stage = Stage::VehiclePredictionRequest;
    pub const LAST: Stage = Stage::CaseCreated;

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::VehiclePredictionRequest => "vehicle_prediction_request",
            Self::VehiclePredictionReceived => "vehicle_prediction_received",
            Self::OcrSkipped => "ocr_skipped",
            Self::OcrTriggered => "ocr_triggered",
            Self::OcrCompleted => "ocr_completed",
            Self::BoloLookupStarted => "bolo_lookup_started",
            Self::BoloLookupCompleted => "bolo_lookup_completed",
            Self::PriorityAssignment => "priority_assignment",
            Self::EvidencePacketBuilding => "evidence_packet_building",
            Self::EvidencePacketCreated => "evidence_packet_created",
            Self::CaseCreation => "case_creation",
            Self::CaseCreated => "case_created",
        }
    }

    /// Transition table: the markers allowed immediately after `self`.
    pub fn successors(&self) -> &'static [Stage] {
        match self {
            Self::VehiclePredictionRequest => &[Self::VehiclePredictionReceived],
            Self::VehiclePredictionReceived => &[Self::OcrSkipped, Self::OcrTriggered],
            Self::OcrSkipped => &[Self::BoloLookupStarted],
            Self::OcrTriggered => &[Self::OcrCompleted],
            Self::OcrCompleted => &[Self::BoloLookupStarted],
            Self::BoloLookupStarted => &[Self::BoloLookupCompleted],
            Self::BoloLookupCompleted => &[Self::PriorityAssignment],
            Self::PriorityAssignment => &[Self::EvidencePacketBuilding],
            Self::EvidencePacketBuilding => &[Self::EvidencePacketCreated],
            Self::EvidencePacketCreated => &[Self::CaseCreation],
            Self::CaseCreation => &[Self::CaseCreated],
            Self::CaseCreated => &[],
        }
    }

    /// The full expected sequence for a run that did or did not take the OCR branch.
    pub fn expected_sequence(ocr: bool) -> Vec<Stage> {
        let mut steps = vec![Self::VehiclePredictionRequest, Self::VehiclePredictionReceived];
        if ocr {
            steps.extend([Self::OcrTriggered, Self::OcrCompleted]);
        } else {
            steps.push(Self::OcrSkipped);
        }
        steps.extend([
            Self::BoloLookupStarted,
            Self::BoloLookupCompleted,
            Self::PriorityAssignment,
            Self::EvidencePacketBuilding,
            Self::EvidencePacketCreated,
            Self::CaseCreation,
            Self::CaseCreated,
        ]);
        steps
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TraceError {
    #[error("trace must start with {}, got {got}", Stage::FIRST)]
    BadStart { got: Stage },
    #[error("stage {next} cannot follow {prev}")]
    BadTransition { prev: Stage, next: Stage },
}

/// Ordered, append-only record of the stages reached in one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessingTrace {
    steps: Vec<Stage>,
}

impl ProcessingTrace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `stage` if the transition table allows it.
    pub fn record(&mut self, stage: Stage) -> Result<(), TraceError> {
        match self.steps.last() {
            None if stage != Stage::FIRST => return Err(TraceError::BadStart { got: stage }),
            Some(prev) if !prev.successors().contains(&stage) => {
                return Err(TraceError::BadTransition {
                    prev: *prev,
                    next: stage,
                });
            }
            _ => {}
        }
        self.steps.push(stage);
        Ok(())
    }

    pub fn steps(&self) -> &[Stage] {
        &self.steps
    }

    pub fn last(&self) -> Option<Stage> {
        self.steps.last().copied()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// True once the terminal marker has been recorded.
    pub fn is_complete(&self) -> bool {
        self.last() == Some(Stage::LAST)
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.steps.iter().map(|s| s.as_str()).collect()
    }

    /// Freeze the trace into its step list.
    pub fn into_steps(self) -> Vec<Stage> {
        self.steps
    }
}
