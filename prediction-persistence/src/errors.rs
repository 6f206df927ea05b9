use prediction_core::PredictionError;
use prediction_types::ValidationError;
use sea_orm::DbErr;

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Gave up after {attempts} attempts for {email} ({game_type})")]
    Conflict {
        email: String,
        game_type: String,
        attempts: u32,
    },
    #[error("Stored game run {id} is invalid: {reason}")]
    CorruptRun { id: i32, reason: ValidationError },
}

pub type PersistenceResult<T> = Result<T, PersistenceError>;

impl From<PersistenceError> for PredictionError {
    fn from(err: PersistenceError) -> Self {
        match err {
            PersistenceError::Validation(err) => PredictionError::Validation(err),
            PersistenceError::Conflict {
                email, game_type, ..
            } => PredictionError::Conflict { email, game_type },
            err @ (PersistenceError::Database(_) | PersistenceError::CorruptRun { .. }) => {
                PredictionError::Storage(err.to_string())
            }
        }
    }
}
