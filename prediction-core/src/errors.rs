use prediction_types::{ErrorKind, ValidationError};
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum PredictionError {
    #[error("Invalid input: {0}")]
    Validation(#[from] ValidationError),
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Random number service error: {0}")]
    ExternalService(String),
    #[error("Concurrent write conflict for {email} ({game_type})")]
    Conflict { email: String, game_type: String },
    #[error("Round {0} not found or already saved")]
    RoundNotFound(Uuid),
}

impl PredictionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PredictionError::Validation(_) => ErrorKind::Validation,
            PredictionError::Storage(_) => ErrorKind::Storage,
            PredictionError::ExternalService(_) => ErrorKind::ExternalService,
            PredictionError::Conflict { .. } => ErrorKind::Conflict,
            PredictionError::RoundNotFound(_) => ErrorKind::NotFound,
        }
    }

    /// Whether the player should be offered a retry prompt. Only a round that
    /// no longer exists cannot be retried.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, PredictionError::RoundNotFound(_))
    }
}

pub type PredictionResult<T> = Result<T, PredictionError>;
