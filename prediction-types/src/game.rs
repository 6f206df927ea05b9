use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::{RoundId, ValidationError};

/// Ruleset tag used when a client does not name one.
pub const DEFAULT_GAME_TYPE: &str = "1-99_range_10_numbers";

/// Number range and pick count for one game type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct GameRules {
    pub game_type: String,
    pub min: i32,
    pub max: i32,
    pub count: usize,
}

impl GameRules {
    /// Pick 10 numbers from 1-99.
    pub fn standard() -> Self {
        Self {
            game_type: DEFAULT_GAME_TYPE.to_string(),
            min: 1,
            max: 99,
            count: 10,
        }
    }

    /// Resolve a ruleset from its tag. Only the standard ruleset is served.
    pub fn for_game_type(game_type: &str) -> Result<Self, ValidationError> {
        if game_type == DEFAULT_GAME_TYPE {
            Ok(Self::standard())
        } else {
            Err(ValidationError::UnknownGameType {
                game_type: game_type.to_string(),
            })
        }
    }

    pub fn contains(&self, value: i32) -> bool {
        (self.min..=self.max).contains(&value)
    }

    /// Highest score reachable in one round.
    pub fn max_score(&self) -> u32 {
        self.count as u32
    }
}

impl Default for GameRules {
    fn default() -> Self {
        Self::standard()
    }
}

/// A fixed-length sequence of picks, checked against a ruleset.
/// Duplicates are allowed; only length and range are enforced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(transparent)]
#[ts(export)]
pub struct Numbers(Vec<i32>);

impl Numbers {
    pub fn new(values: Vec<i32>, rules: &GameRules) -> Result<Self, ValidationError> {
        if values.len() != rules.count {
            return Err(ValidationError::WrongCount {
                expected: rules.count,
                actual: values.len(),
            });
        }

        if let Some(&value) = values.iter().find(|v| !rules.contains(**v)) {
            return Err(ValidationError::OutOfRange {
                value,
                min: rules.min,
                max: rules.max,
            });
        }

        Ok(Self(values))
    }

    pub fn as_slice(&self) -> &[i32] {
        &self.0
    }

    pub fn into_inner(self) -> Vec<i32> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl AsRef<[i32]> for Numbers {
    fn as_ref(&self) -> &[i32] {
        &self.0
    }
}

/// One played round as recorded in the run log. Never modified after insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct GameRun {
    pub id: i32,
    pub user_name: String,
    pub email: String,
    pub predictions: Numbers,
    pub random_numbers: Numbers,
    pub score: u32,
    pub game_type: String,
    pub created_at: String, // ISO 8601 string
}

/// Result of a round that has been drawn but not necessarily saved yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RoundOutcome {
    pub round_id: RoundId,
    pub game_type: String,
    pub predictions: Numbers,
    pub random_numbers: Numbers,
    pub score: u32,
    pub max_score: u32,
    pub matching_numbers: Vec<i32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_rules() {
        let rules = GameRules::for_game_type(DEFAULT_GAME_TYPE).unwrap();
        assert_eq!(rules, GameRules::standard());
        assert!(rules.contains(1));
        assert!(rules.contains(99));
        assert!(!rules.contains(0));
        assert!(!rules.contains(100));
        assert_eq!(rules.max_score(), 10);
    }

    #[test]
    fn test_unknown_game_type() {
        let result = GameRules::for_game_type("1-49_range_6_numbers");
        assert!(matches!(
            result,
            Err(ValidationError::UnknownGameType { .. })
        ));
    }

    #[test]
    fn test_numbers_validation() {
        let rules = GameRules::standard();

        let numbers = Numbers::new(vec![7; 10], &rules).unwrap();
        assert_eq!(numbers.len(), 10);

        let short = Numbers::new(vec![1, 2, 3], &rules);
        assert_eq!(
            short.unwrap_err(),
            ValidationError::WrongCount {
                expected: 10,
                actual: 3
            }
        );

        let out_of_range = Numbers::new(vec![1, 2, 3, 4, 5, 6, 7, 8, 9, 100], &rules);
        assert_eq!(
            out_of_range.unwrap_err(),
            ValidationError::OutOfRange {
                value: 100,
                min: 1,
                max: 99
            }
        );
    }
}
