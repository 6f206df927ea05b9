use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Rejected input. Never retried by the server; the caller corrects and resubmits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, thiserror::Error)]
#[ts(export)]
pub enum ValidationError {
    #[error("expected {expected} numbers, got {actual}")]
    WrongCount { expected: usize, actual: usize },
    #[error("{value} is outside the range {min}-{max}")]
    OutOfRange { value: i32, min: i32, max: i32 },
    #[error("unknown game type '{game_type}'")]
    UnknownGameType { game_type: String },
    #[error("email is required")]
    EmptyEmail,
    #[error("email must be at most {max} characters")]
    EmailTooLong { max: usize },
    #[error("name is required")]
    EmptyName,
    #[error("name must be at most {max} characters")]
    NameTooLong { max: usize },
    #[error("score {score} exceeds the maximum of {max}")]
    ScoreOutOfRange { score: u32, max: u32 },
}

/// Error body returned by the HTTP API.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: ErrorKind,
    pub retryable: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum ErrorKind {
    Validation,
    Storage,
    ExternalService,
    Conflict,
    NotFound,
}
