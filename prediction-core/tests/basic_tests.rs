mod common;

use common::*;
use prediction_core::reconciliation::{NameSource, audit, plan_reconciliation};
use prediction_core::{AnalyticsEngine, ScoringEngine};
use prediction_types::GameRules;

#[test]
fn test_score_matches_worked_example() {
    assert_eq!(ScoringEngine::score(&numbers(&PICKS), &numbers(&DRAWN)), 8);
    assert_eq!(
        ScoringEngine::score_raw(&GameRules::standard(), &PICKS, &DRAWN).unwrap(),
        8
    );
}

#[test]
fn test_score_is_symmetric_and_bounded() {
    let rules = GameRules::standard();
    let repeated = [7; 10];
    for (a, b) in [(&PICKS, &DRAWN), (&PICKS, &repeated), (&repeated, &DRAWN)] {
        let forward = ScoringEngine::score(&numbers(a), &numbers(b));
        let backward = ScoringEngine::score(&numbers(b), &numbers(a));
        assert_eq!(forward, backward);
        assert!(forward <= rules.max_score());
    }
}

#[test]
fn test_analytics_over_run_log() {
    let runs = vec![
        create_test_run(1, "Ann@x.com", &PICKS, &DRAWN, at(1, 9)),
        create_test_run(2, "ann@x.com ", &PICKS, &PICKS, at(2, 9)),
        create_test_run(3, "ben@x.com", &DRAWN, &PICKS, at(3, 9)),
    ];

    let stats = AnalyticsEngine::global_stats(&runs).unwrap();
    assert_eq!(stats.total_games, 3);
    assert_eq!(stats.total_players, 2);
    assert_eq!(stats.best_score, 10);
    assert_eq!(stats.score_distribution.get(&8), Some(&2));

    let ann: Vec<_> = runs[..2].to_vec();
    let user = AnalyticsEngine::user_stats(&ann, at(5, 9)).unwrap();
    assert_eq!(user.total_games, 2);
    assert_eq!(user.latest_score, 10);
    assert_eq!(user.score_trend, vec![8, 10]);
    assert_eq!(user.games_last_week, 2);

    let frequencies = AnalyticsEngine::number_frequencies(&runs);
    let insights = AnalyticsEngine::pattern_insights(&frequencies, &GameRules::standard()).unwrap();
    assert!(insights.randomness_score <= 100);
}

#[test]
fn test_reconciliation_plan_then_audit_is_clean() {
    let rows = vec![
        create_test_row(1, "A@x.com", 6, 5),
        create_test_row(2, "a@x.com ", 9, 3),
        create_test_row(3, "b@x.com", 4, 1),
    ];
    let runs = vec![
        create_test_run(10, "a@X.com", &PICKS, &DRAWN, at(1, 8)),
        create_test_run(11, "A@x.com", &PICKS, &DRAWN, at(1, 12)),
    ];
    let summaries: Vec<_> = runs.iter().map(summarize).collect();

    let before = audit(&rows);
    assert!(!before.is_clean());
    assert_eq!(before.duplicate_groups.len(), 1);

    let plan = plan_reconciliation(&rows, &summaries, NameSource::default());
    let after = plan.apply(&rows);
    assert_eq!(after.len(), 2);
    assert_eq!(after[0].id, 2);
    assert_eq!(after[0].email, "a@x.com");
    assert_eq!(after[0].best_score, 9);
    assert_eq!(after[0].total_games_played, 3);
    assert_eq!(after[0].name, "player-11");
    assert!(audit(&after).is_clean());

    let again = plan_reconciliation(&after, &summaries, NameSource::default());
    assert!(again.is_noop());
}
