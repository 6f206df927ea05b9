use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{DateTime, Duration, Utc};
use prediction_types::{
    FavoriteNumber, GameRules, GameRun, GlobalStats, NumberFrequencies, PatternInsights,
    PatternShare, UserStats,
};

use crate::validation::normalize_email;

const LUCKY_SEVENS: [i32; 10] = [7, 17, 27, 37, 47, 57, 67, 77, 87, 97];
const TREND_LENGTH: usize = 10;
const FAVORITES: usize = 10;

pub struct AnalyticsEngine;

impl AnalyticsEngine {
    /// Aggregate statistics across every run of one game type.
    pub fn global_stats(runs: &[GameRun]) -> Option<GlobalStats> {
        if runs.is_empty() {
            return None;
        }

        let mut score_distribution = BTreeMap::new();
        for run in runs {
            *score_distribution.entry(run.score).or_insert(0) += 1;
        }

        let players: BTreeSet<String> = runs.iter().map(|run| normalize_email(&run.email)).collect();

        Some(GlobalStats {
            total_games: runs.len() as u32,
            average_score: average(runs.iter().map(|run| run.score)),
            best_score: runs.iter().map(|run| run.score).max().unwrap_or(0),
            total_players: players.len() as u32,
            score_distribution,
        })
    }

    /// How often each number was predicted and how often it was drawn.
    pub fn number_frequencies(runs: &[GameRun]) -> NumberFrequencies {
        let mut frequencies = NumberFrequencies::default();
        for run in runs {
            for &n in run.predictions.as_slice() {
                *frequencies.predictions.entry(n).or_insert(0) += 1;
            }
            for &n in run.random_numbers.as_slice() {
                *frequencies.random_numbers.entry(n).or_insert(0) += 1;
            }
        }
        frequencies
    }

    /// Per-player statistics. `runs` may be in any order.
    pub fn user_stats(runs: &[GameRun], now: DateTime<Utc>) -> Option<UserStats> {
        let mut dated: Vec<(DateTime<Utc>, &GameRun)> = runs
            .iter()
            .filter_map(|run| {
                DateTime::parse_from_rfc3339(&run.created_at)
                    .ok()
                    .map(|at| (at.with_timezone(&Utc), run))
            })
            .collect();
        if dated.is_empty() {
            return None;
        }
        dated.sort_by_key(|(at, run)| (*at, run.id));

        let week_ago = now - Duration::days(7);
        let scores: Vec<u32> = dated.iter().map(|(_, run)| run.score).collect();
        let (first_at, _) = dated[0];

        let mut picks: HashMap<i32, u32> = HashMap::new();
        for (_, run) in &dated {
            for &n in run.predictions.as_slice() {
                *picks.entry(n).or_insert(0) += 1;
            }
        }
        let mut favorite_numbers: Vec<FavoriteNumber> = picks
            .into_iter()
            .map(|(number, times_predicted)| FavoriteNumber {
                number,
                times_predicted,
            })
            .collect();
        favorite_numbers.sort_by(|a, b| {
            b.times_predicted
                .cmp(&a.times_predicted)
                .then(a.number.cmp(&b.number))
        });
        favorite_numbers.truncate(FAVORITES);

        Some(UserStats {
            total_games: scores.len() as u32,
            best_score: scores.iter().copied().max().unwrap_or(0),
            average_score: average(scores.iter().copied()),
            latest_score: scores.last().copied().unwrap_or(0),
            first_game: first_at.to_rfc3339(),
            games_last_week: dated.iter().filter(|(at, _)| *at > week_ago).count() as u32,
            score_trend: scores[scores.len().saturating_sub(TREND_LENGTH)..].to_vec(),
            favorite_numbers,
        })
    }

    /// Compare human picks with drawn numbers across a few number classes.
    pub fn pattern_insights(
        frequencies: &NumberFrequencies,
        rules: &GameRules,
    ) -> Option<PatternInsights> {
        if frequencies.predictions.is_empty() || frequencies.random_numbers.is_empty() {
            return None;
        }

        let share = |class: &dyn Fn(i32) -> bool| PatternShare {
            human_percent: percent_of(&frequencies.predictions, class),
            random_percent: percent_of(&frequencies.random_numbers, class),
            expected_percent: expected_percent(rules, class),
        };

        let primes = share(&is_prime);
        let even = share(&|n: i32| n % 2 == 0);
        let multiples_of_five = share(&|n: i32| n % 5 == 0);
        let repeating_digits = share(&is_repeating_digit);
        let lucky_sevens = share(&|n: i32| LUCKY_SEVENS.contains(&n));

        let mut randomness_score = 100u32;
        if (primes.human_percent - primes.expected_percent).abs() > 5.0 {
            randomness_score -= 15;
        }
        if (even.human_percent - 50.0).abs() > 5.0 {
            randomness_score -= 10;
        }
        if repeating_digits.human_percent > 10.0 {
            randomness_score -= 10;
        }

        Some(PatternInsights {
            primes,
            even,
            multiples_of_five,
            repeating_digits,
            lucky_sevens,
            most_predicted: most_common(&frequencies.predictions),
            most_drawn: most_common(&frequencies.random_numbers),
            randomness_score,
        })
    }
}

fn average(values: impl Iterator<Item = u32>) -> f64 {
    let (sum, count) = values.fold((0u64, 0u64), |(sum, count), v| (sum + v as u64, count + 1));
    if count == 0 {
        0.0
    } else {
        sum as f64 / count as f64
    }
}

fn percent_of(frequencies: &BTreeMap<i32, u32>, class: &dyn Fn(i32) -> bool) -> f64 {
    let total: u32 = frequencies.values().sum();
    if total == 0 {
        return 0.0;
    }
    let matching: u32 = frequencies
        .iter()
        .filter(|(n, _)| class(**n))
        .map(|(_, count)| count)
        .sum();
    matching as f64 * 100.0 / total as f64
}

fn expected_percent(rules: &GameRules, class: &dyn Fn(i32) -> bool) -> f64 {
    let size = (rules.max - rules.min + 1) as f64;
    let matching = (rules.min..=rules.max).filter(|n| class(*n)).count() as f64;
    matching * 100.0 / size
}

/// Highest count wins; ties go to the smaller number.
fn most_common(frequencies: &BTreeMap<i32, u32>) -> Option<i32> {
    frequencies
        .iter()
        .max_by(|a, b| a.1.cmp(b.1).then(b.0.cmp(a.0)))
        .map(|(n, _)| *n)
}

fn is_prime(n: i32) -> bool {
    if n < 2 {
        return false;
    }
    (2..).take_while(|d| d * d <= n).all(|d| n % d != 0)
}

fn is_repeating_digit(n: i32) -> bool {
    (11..=99).contains(&n) && n % 11 == 0
}
