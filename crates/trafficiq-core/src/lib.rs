//! Core types for the vehicle-identification pipeline: data model, stage
//! trace, decision policy, errors and collaborator interfaces.

pub mod capability;
pub mod error;
pub mod ids;
pub mod model;
pub mod policy;
pub mod trace;

pub use capability::{CaseStore, PlateExtractor, VehiclePredictor, WatchlistService};
pub use error::{BackendError, InputError, PipelineError, StageError, validate_identifier};
pub use ids::{IdError, IdGenerator};
pub use model::{
    AgentResult, CaseRecord, CaseStatus, EvidencePacket, ImageCondition, PlateResult, Priority,
    VehicleIdentification, WatchlistMatch,
};
pub use policy::{ConditionPenalties, OcrDecision, Policy, PolicyConfig, PolicyConfigError};
pub use trace::{ProcessingTrace, Stage, TraceError};
