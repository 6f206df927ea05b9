use std::collections::HashSet;

use prediction_types::{GameRules, Numbers, ValidationError};

pub struct ScoringEngine;

impl ScoringEngine {
    /// Count the distinct predicted values that also appear among the drawn
    /// numbers. Both sides are treated as sets, so repeated picks or repeated
    /// draws never count twice and positions do not matter.
    pub fn score(predictions: &Numbers, random_numbers: &Numbers) -> u32 {
        let drawn: HashSet<i32> = random_numbers.as_slice().iter().copied().collect();
        let predicted: HashSet<i32> = predictions.as_slice().iter().copied().collect();

        predicted.intersection(&drawn).count() as u32
    }

    /// Validate raw sequences against the rules, then score them.
    pub fn score_raw(
        rules: &GameRules,
        predictions: &[i32],
        random_numbers: &[i32],
    ) -> Result<u32, ValidationError> {
        let predictions = Numbers::new(predictions.to_vec(), rules)?;
        let random_numbers = Numbers::new(random_numbers.to_vec(), rules)?;
        Ok(Self::score(&predictions, &random_numbers))
    }

    /// Distinct matched values in the order they were predicted.
    pub fn matching_numbers(predictions: &Numbers, random_numbers: &Numbers) -> Vec<i32> {
        let drawn: HashSet<i32> = random_numbers.as_slice().iter().copied().collect();
        let mut seen = HashSet::new();

        predictions
            .as_slice()
            .iter()
            .copied()
            .filter(|n| drawn.contains(n) && seen.insert(*n))
            .collect()
    }
}
