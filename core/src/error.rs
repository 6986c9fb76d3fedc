use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidArgument,
    ResourceExhausted,
    Unavailable,
    Internal,
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorCode::InvalidArgument => "INVALID_ARGUMENT",
            ErrorCode::ResourceExhausted => "RESOURCE_EXHAUSTED",
            ErrorCode::Unavailable => "UNAVAILABLE",
            ErrorCode::Internal => "INTERNAL",
        };
        write!(f, "{}", s)
    }
}

/// Stable classification shared by every error that can leave the workspace.
///
/// `INVALID_ARGUMENT` means the caller must fix its input (for example a
/// column mapping), `RESOURCE_EXHAUSTED` means it may retry later, and
/// `UNAVAILABLE` means an upstream AI call failed after bounded retries.
pub trait SociogramError: std::error::Error {
    fn error_code(&self) -> ErrorCode;
}
