use advisor::AiError;
use ingestion::MappingError;
use sociogram_core::error::{ErrorCode, SociogramError};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PipelineError {
    #[error("mapping rejected: {0}")]
    Mapping(#[from] MappingError),
    #[error("AI mapping unavailable: {0}")]
    Ai(#[from] AiError),
}

impl SociogramError for PipelineError {
    fn error_code(&self) -> ErrorCode {
        match self {
            PipelineError::Mapping(err) => err.error_code(),
            PipelineError::Ai(err) => err.error_code(),
        }
    }
}
