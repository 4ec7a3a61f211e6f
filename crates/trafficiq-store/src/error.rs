use std::path::PathBuf;

use thiserror::Error;
use trafficiq_core::{BackendError, IdError};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("i/o error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("case log line {line} is malformed: {source}")]
    CorruptLog {
        line: usize,
        source: serde_json::Error,
    },

    #[error("id generator: {0}")]
    Id(#[from] IdError),

    #[error("store lock poisoned")]
    Poisoned,
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| Self::Io { path, source }
    }
}

impl From<StoreError> for BackendError {
    fn from(e: StoreError) -> Self {
        BackendError::with_cause("case store failure", e)
    }
}
