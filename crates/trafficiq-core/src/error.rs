use std::error::Error as StdError;
use std::fmt;

use thiserror::Error;

use crate::trace::{Stage, TraceError};

/// Longest image identifier accepted, in bytes.
pub const MAX_IDENTIFIER_LEN: usize = 2048;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    #[error("image identifier is empty")]
    Empty,
    #[error("image identifier is longer than {max} bytes")]
    TooLong { max: usize },
    #[error("image identifier contains control characters")]
    ControlCharacters,
}

/// Reject empty or malformed image identifiers.
pub fn validate_identifier(image_uri: &str) -> Result<&str, InputError> {
    if image_uri.trim().is_empty() {
        return Err(InputError::Empty);
    }
    if image_uri.len() > MAX_IDENTIFIER_LEN {
        return Err(InputError::TooLong {
            max: MAX_IDENTIFIER_LEN,
        });
    }
    if image_uri.chars().any(char::is_control) {
        return Err(InputError::ControlCharacters);
    }
    Ok(image_uri)
}

/// Failure reported by a collaborator behind one of the capability traits.
#[derive(Debug)]
pub struct BackendError {
    message: String,
    cause: Option<Box<dyn StdError + Send + Sync>>,
}

impl BackendError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            cause: None,
        }
    }

    pub fn with_cause(
        message: impl Into<String>,
        cause: impl Into<Box<dyn StdError + Send + Sync>>,
    ) -> Self {
        Self {
            message: message.into(),
            cause: Some(cause.into()),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl StdError for BackendError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.cause
            .as_deref()
            .map(|e| e as &(dyn StdError + 'static))
    }
}

impl From<InputError> for BackendError {
    fn from(e: InputError) -> Self {
        Self::with_cause("rejected image identifier", e)
    }
}

/// Why a pipeline run stopped.
#[derive(Debug, Error)]
pub enum StageError {
    #[error("invalid input")]
    Input(#[from] InputError),

    #[error("vehicle prediction failed at {stage}")]
    Prediction { stage: Stage, source: BackendError },

    #[error("plate extraction failed at {stage}")]
    Extraction { stage: Stage, source: BackendError },

    #[error("watchlist lookup failed at {stage}")]
    Lookup { stage: Stage, source: BackendError },

    #[error("case persistence failed at {stage}")]
    Persistence { stage: Stage, source: BackendError },

    #[error("run cancelled before {next}")]
    Cancelled { next: Stage },

    #[error("stage sequence violated")]
    Trace(#[from] TraceError),
}

impl StageError {
    /// The stage the failure is attributed to, if any.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::Prediction { stage, .. }
            | Self::Extraction { stage, .. }
            | Self::Lookup { stage, .. }
            | Self::Persistence { stage, .. } => Some(*stage),
            Self::Cancelled { next } => Some(*next),
            Self::Input(_) | Self::Trace(_) => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

/// A failed run together with the trace recorded up to the failure.
#[derive(Debug, Error)]
#[error("pipeline aborted after {} step(s)", .trace.len())]
pub struct PipelineError {
    #[source]
    pub error: StageError,
    pub trace: Vec<Stage>,
}

impl PipelineError {
    pub fn new(error: StageError, trace: Vec<Stage>) -> Self {
        Self { error, trace }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_identifier_cases() {
        assert_eq!(validate_identifier(""), Err(InputError::Empty));
        assert_eq!(validate_identifier("   \t"), Err(InputError::Empty));
        assert_eq!(
            validate_identifier("cam/01\u{0}.jpg"),
            Err(InputError::ControlCharacters)
        );
        let long = "x".repeat(MAX_IDENTIFIER_LEN + 1);
        assert_eq!(
            validate_identifier(&long),
            Err(InputError::TooLong {
                max: MAX_IDENTIFIER_LEN
            })
        );
        assert_eq!(validate_identifier("gs://cams/a.jpg"), Ok("gs://cams/a.jpg"));
    }

    #[test]
    fn backend_error_exposes_cause() {
        let io = std::io::Error::new(std::io::ErrorKind::TimedOut, "endpoint timed out");
        let err = BackendError::with_cause("vertex endpoint unavailable", io);
        assert_eq!(err.to_string(), "vertex endpoint unavailable");
        assert_eq!(err.source().unwrap().to_string(), "endpoint timed out");
        assert!(BackendError::new("down").source().is_none());
    }

    #[test]
    fn stage_error_reports_stage() {
        let err = StageError::Lookup {
            stage: Stage::BoloLookupStarted,
            source: BackendError::new("watchlist offline"),
        };
        assert_eq!(err.stage(), Some(Stage::BoloLookupStarted));
        assert_eq!(err.to_string(), "watchlist lookup failed at bolo_lookup_started");
        assert_eq!(err.source().unwrap().to_string(), "watchlist offline");
        assert_eq!(StageError::from(InputError::Empty).stage(), None);
    }

    #[test]
    fn pipeline_error_carries_trace() {
        let err = PipelineError::new(
            StageError::Cancelled {
                next: Stage::OcrTriggered,
            },
            vec![Stage::VehiclePredictionRequest, Stage::VehiclePredictionReceived],
        );
        assert_eq!(err.to_string(), "pipeline aborted after 2 step(s)");
        assert!(err.error.is_cancelled());
        assert_eq!(err.source().unwrap().to_string(), "run cancelled before ocr_triggered");
    }
}
