use async_trait::async_trait;

use crate::PredictionError;

/// Source of true-random draws for a round.
///
/// Implementations return exactly `count` integers in `min..=max` or fail with
/// [`PredictionError::ExternalService`]. A failure ends the round; callers never
/// substitute a local PRNG.
#[async_trait]
pub trait RandomSource: Send + Sync {
    async fn fetch_random_numbers(
        &self,
        count: usize,
        min: i32,
        max: i32,
    ) -> Result<Vec<i32>, PredictionError>;
}
