//! Pipeline router: runs the fixed stage sequence against injected collaborators.
//!
//! Each run is sequential and fail-fast. Every stage marker goes through
//! [`Execution::enter`], which checks for cancellation, validates the
//! transition and logs the stage, so the trace returned on failure is exactly
//! the prefix that was reached.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use trafficiq_ai::{MockPlateExtractor, MockVehiclePredictor, MockWatchlistService, WatchlistTable};
use trafficiq_core::{
    AgentResult, CaseStore, IdError, PipelineError, PlateExtractor, Policy, ProcessingTrace,
    Stage, StageError, VehicleIdentification, VehiclePredictor, WatchlistService,
    validate_identifier,
};

use crate::cancel::CancellationToken;
use crate::evidence::{EvidenceBuilder, EvidenceDraft};

/// The four capabilities a router calls, shared behind `Arc`s.
#[derive(Clone)]
pub struct Collaborators {
    pub predictor: Arc<dyn VehiclePredictor>,
    pub extractor: Arc<dyn PlateExtractor>,
    pub watchlist: Arc<dyn WatchlistService>,
    pub cases: Arc<dyn CaseStore>,
}

impl Collaborators {
    /// Deterministic oracle collaborators over `table`, persisting to `cases`.
    pub fn mock(table: Arc<WatchlistTable>, cases: Arc<dyn CaseStore>) -> Self {
        Self {
            predictor: Arc::new(MockVehiclePredictor),
            extractor: Arc::new(MockPlateExtractor::default()),
            watchlist: Arc::new(MockWatchlistService::new(table)),
            cases,
        }
    }
}

/// Input to a full pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunRequest {
    pub image_uri: String,
    pub location: Option<String>,
    /// Capture time of the image, if known.
    pub timestamp: Option<DateTime<Utc>>,
}

impl RunRequest {
    pub fn new(image_uri: impl Into<String>) -> Self {
        Self {
            image_uri: image_uri.into(),
            location: None,
            timestamp: None,
        }
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}

/// Per-run state: the trace under construction and the cancellation flag.
struct Execution<'a> {
    trace: ProcessingTrace,
    cancel: &'a CancellationToken,
}

impl<'a> Execution<'a> {
    fn new(cancel: &'a CancellationToken) -> Self {
        Self {
            trace: ProcessingTrace::new(),
            cancel,
        }
    }

    fn enter(&mut self, stage: Stage) -> Result<(), StageError> {
        if self.cancel.is_cancelled() {
            return Err(StageError::Cancelled { next: stage });
        }
        self.trace.record(stage)?;
        debug!(stage = %stage, step = self.trace.len(), "stage");
        Ok(())
    }

    fn abort(self, image_uri: &str, error: StageError) -> PipelineError {
        warn!(
            image_uri,
            error = %error,
            at = ?error.stage(),
            steps = self.trace.len(),
            "pipeline aborted"
        );
        PipelineError::new(error, self.trace.into_steps())
    }
}

/// Orchestrates vehicle prediction, optional plate extraction, watchlist
/// correlation, prioritisation, evidence assembly and case creation.
pub struct Router {
    policy: Policy,
    collaborators: Collaborators,
    evidence: EvidenceBuilder,
}

impl Router {
    pub fn new(policy: Policy, collaborators: Collaborators) -> Result<Self, IdError> {
        Ok(Self::with_evidence_builder(
            policy,
            collaborators,
            EvidenceBuilder::new()?,
        ))
    }

    pub fn with_evidence_builder(
        policy: Policy,
        collaborators: Collaborators,
        evidence: EvidenceBuilder,
    ) -> Self {
        Self {
            policy,
            collaborators,
            evidence,
        }
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    /// Vehicle prediction only; no case is created.
    pub fn identify(&self, image_uri: &str) -> Result<VehicleIdentification, PipelineError> {
        let cancel = CancellationToken::new();
        let mut exec = Execution::new(&cancel);
        match self.predict(&mut exec, image_uri) {
            Ok(vehicle) => Ok(vehicle),
            Err(e) => Err(exec.abort(image_uri, e)),
        }
    }

    pub fn run(&self, request: &RunRequest) -> Result<AgentResult, PipelineError> {
        self.run_with_cancel(request, &CancellationToken::new())
    }

    /// Full run that stops before the next stage once `cancel` is set.
    pub fn run_with_cancel(
        &self,
        request: &RunRequest,
        cancel: &CancellationToken,
    ) -> Result<AgentResult, PipelineError> {
        let start = Instant::now();
        info!(image_uri = %request.image_uri, location = ?request.location, "pipeline run started");
        let mut exec = Execution::new(cancel);
        match self.execute(&mut exec, request, start) {
            Ok(result) => {
                info!(
                    case_id = %result.case.case_id,
                    priority = %result.priority,
                    elapsed_ms = result.total_processing_time_ms,
                    "pipeline run completed"
                );
                Ok(result)
            }
            Err(e) => Err(exec.abort(&request.image_uri, e)),
        }
    }

    fn predict(
        &self,
        exec: &mut Execution<'_>,
        image_uri: &str,
    ) -> Result<VehicleIdentification, StageError> {
        let image_uri = validate_identifier(image_uri)?;
        exec.enter(Stage::VehiclePredictionRequest)?;
        let vehicle = self
            .collaborators
            .predictor
            .predict(image_uri)
            .map_err(|source| StageError::Prediction {
                stage: Stage::VehiclePredictionRequest,
                source,
            })?;
        exec.enter(Stage::VehiclePredictionReceived)?;
        info!(
            make = %vehicle.make,
            model = %vehicle.model,
            confidence = vehicle.confidence,
            condition = %vehicle.image_condition,
            "vehicle predicted"
        );
        Ok(vehicle)
    }

    fn execute(
        &self,
        exec: &mut Execution<'_>,
        request: &RunRequest,
        start: Instant,
    ) -> Result<AgentResult, StageError> {
        let image_uri = request.image_uri.as_str();
        let vehicle = self.predict(exec, image_uri)?;

        let decision = self.policy.ocr_decision(&vehicle);
        let plate = if decision.needed() {
            exec.enter(Stage::OcrTriggered)?;
            debug!(
                effective_confidence = decision.effective_confidence,
                low_confidence = decision.low_confidence,
                adverse_condition = decision.adverse_condition,
                "plate extraction triggered"
            );
            let plate = self
                .collaborators
                .extractor
                .extract(image_uri, vehicle.image_condition)
                .map_err(|source| StageError::Extraction {
                    stage: Stage::OcrTriggered,
                    source,
                })?;
            exec.enter(Stage::OcrCompleted)?;
            info!(plate = ?plate.plate, confidence = plate.confidence, "plate extracted");
            Some(plate)
        } else {
            exec.enter(Stage::OcrSkipped)?;
            None
        };

        let lookup_plate = plate
            .as_ref()
            .filter(|p| self.policy.plate_usable(p))
            .and_then(|p| p.plate.as_deref());
        if plate.is_some() && lookup_plate.is_none() {
            debug!("plate below usability threshold; not used for lookup");
        }

        exec.enter(Stage::BoloLookupStarted)?;
        let watchlist = self
            .collaborators
            .watchlist
            .lookup(&vehicle, lookup_plate)
            .map_err(|source| StageError::Lookup {
                stage: Stage::BoloLookupStarted,
                source,
            })?;
        exec.enter(Stage::BoloLookupCompleted)?;
        info!(
            is_match = watchlist.is_match,
            reason = %watchlist.reason,
            "watchlist lookup completed"
        );

        exec.enter(Stage::PriorityAssignment)?;
        let priority = self.policy.assign_priority(&watchlist, &vehicle);
        info!(%priority, "priority assigned");

        exec.enter(Stage::EvidencePacketBuilding)?;
        let packet = self.evidence.build(EvidenceDraft {
            image_uri,
            captured_at: request.timestamp,
            location: request.location.as_deref(),
            vehicle: &vehicle,
            plate: plate.as_ref(),
            plate_used_for_lookup: lookup_plate.is_some(),
            watchlist: &watchlist,
            priority,
            trace: exec.trace.steps(),
        });
        exec.enter(Stage::EvidencePacketCreated)?;
        debug!(packet_id = %packet.packet_id, "evidence packet created");

        exec.enter(Stage::CaseCreation)?;
        let case = self
            .collaborators
            .cases
            .create(&packet, priority)
            .map_err(|source| StageError::Persistence {
                stage: Stage::CaseCreation,
                source,
            })?;
        exec.enter(Stage::CaseCreated)?;

        Ok(AgentResult {
            image_uri: image_uri.to_string(),
            ocr_fallback_used: plate.is_some(),
            vehicle,
            plate,
            watchlist,
            priority,
            case,
            processing_steps: exec.trace.steps().to_vec(),
            total_processing_time_ms: start.elapsed().as_secs_f64() * 1000.0,
            location: request.location.clone(),
        })
    }
}
