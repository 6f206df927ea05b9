//! Planning for leaderboard deduplication.
//!
//! Rows written before emails were normalized may describe the same player
//! several times for one game type (`A@x.com` and `a@x.com `), or contain exact
//! copies left behind by racing inserts. [`plan_reconciliation`] works out which
//! row survives each `(normalized email, game type)` group, which rows go, and
//! which survivors need their email or display name rewritten. It only reads
//! its inputs; the migration crate applies the plan inside a transaction.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::validation::{is_normalized_email, normalize_email};

/// A leaderboard row as stored, before any normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaderboardRow {
    pub id: i32,
    pub email: String,
    pub game_type: String,
    pub name: String,
    pub best_score: i32,
    pub total_games_played: i32,
}

impl LeaderboardRow {
    pub fn key(&self) -> GroupKey {
        GroupKey::new(&self.email, &self.game_type)
    }
}

/// The leaderboard's identity: normalized email plus game type.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GroupKey {
    pub email: String,
    pub game_type: String,
}

impl GroupKey {
    pub fn new(email: &str, game_type: &str) -> Self {
        Self {
            email: normalize_email(email),
            game_type: game_type.to_string(),
        }
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.email, self.game_type)
    }
}

/// The fields of a game run that name re-pointing needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub id: i32,
    pub email: String,
    pub game_type: String,
    pub user_name: String,
    pub created_at: DateTime<Utc>,
}

/// Which runs decide a survivor's display name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NameSource {
    /// Most recent run with the same email and game type.
    #[default]
    SameGameType,
    /// Most recent run with the same email under any game type. This is how
    /// the first deduplication pass behaved.
    AnyGameType,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeDecision {
    pub key: GroupKey,
    pub survivor: LeaderboardRow,
    pub removed: Vec<LeaderboardRow>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailRewrite {
    pub id: i32,
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameUpdate {
    pub id: i32,
    pub key: GroupKey,
    pub from: String,
    pub to: String,
}

/// A group whose display name depends on which [`NameSource`] is used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameDiscrepancy {
    pub key: GroupKey,
    pub same_game_type: String,
    pub any_game_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconciliationPlan {
    pub rows_scanned: usize,
    pub groups: usize,
    pub merges: Vec<MergeDecision>,
    pub email_rewrites: Vec<EmailRewrite>,
    pub name_updates: Vec<NameUpdate>,
    pub discrepancies: Vec<NameDiscrepancy>,
}

impl ReconciliationPlan {
    pub fn deleted_ids(&self) -> Vec<i32> {
        self.merges
            .iter()
            .flat_map(|merge| merge.removed.iter().map(|row| row.id))
            .collect()
    }

    /// True when applying the plan would not change any row.
    pub fn is_noop(&self) -> bool {
        self.merges.is_empty() && self.email_rewrites.is_empty() && self.name_updates.is_empty()
    }

    /// The rows that remain after the plan is applied, ordered by id.
    pub fn apply(&self, rows: &[LeaderboardRow]) -> Vec<LeaderboardRow> {
        let deleted: BTreeSet<i32> = self.deleted_ids().into_iter().collect();
        let emails: BTreeMap<i32, &str> = self
            .email_rewrites
            .iter()
            .map(|rewrite| (rewrite.id, rewrite.to.as_str()))
            .collect();
        let names: BTreeMap<i32, &str> = self
            .name_updates
            .iter()
            .map(|update| (update.id, update.to.as_str()))
            .collect();

        let mut remaining: Vec<LeaderboardRow> = rows
            .iter()
            .filter(|row| !deleted.contains(&row.id))
            .map(|row| {
                let mut row = row.clone();
                if let Some(email) = emails.get(&row.id) {
                    row.email = email.to_string();
                }
                if let Some(name) = names.get(&row.id) {
                    row.name = name.to_string();
                }
                row
            })
            .collect();
        remaining.sort_by_key(|row| row.id);
        remaining
    }
}

/// Total order used to pick a survivor; the survivor sorts first.
///
/// Highest best score wins, then most games played, then the oldest row
/// (lowest id).
pub fn survivor_order(a: &LeaderboardRow, b: &LeaderboardRow) -> Ordering {
    b.best_score
        .cmp(&a.best_score)
        .then_with(|| b.total_games_played.cmp(&a.total_games_played))
        .then_with(|| a.id.cmp(&b.id))
}

/// Partition rows by normalized key. Each group is sorted survivor first.
pub fn group_rows(rows: &[LeaderboardRow]) -> BTreeMap<GroupKey, Vec<&LeaderboardRow>> {
    let mut groups: BTreeMap<GroupKey, Vec<&LeaderboardRow>> = BTreeMap::new();
    for row in rows {
        groups.entry(row.key()).or_default().push(row);
    }
    for members in groups.values_mut() {
        members.sort_by(|a, b| survivor_order(a, b));
    }
    groups
}

#[derive(Default)]
struct LatestNames<'a> {
    by_key: BTreeMap<GroupKey, &'a RunSummary>,
    by_email: BTreeMap<String, &'a RunSummary>,
}

impl<'a> LatestNames<'a> {
    fn collect(runs: &'a [RunSummary]) -> Self {
        let mut latest = Self::default();
        for run in runs.iter().filter(|run| !run.user_name.trim().is_empty()) {
            let key = GroupKey::new(&run.email, &run.game_type);
            Self::keep_newer(latest.by_email.entry(key.email.clone()).or_insert(run), run);
            Self::keep_newer(latest.by_key.entry(key).or_insert(run), run);
        }
        latest
    }

    fn keep_newer(slot: &mut &'a RunSummary, candidate: &'a RunSummary) {
        if (candidate.created_at, candidate.id) > (slot.created_at, slot.id) {
            *slot = candidate;
        }
    }

    fn for_key(&self, key: &GroupKey) -> Option<&'a str> {
        self.by_key.get(key).map(|run| run.user_name.as_str())
    }

    fn for_email(&self, email: &str) -> Option<&'a str> {
        self.by_email.get(email).map(|run| run.user_name.as_str())
    }
}

/// Work out the full set of changes that deduplicates `rows`.
///
/// Runs are matched to groups by normalized email, so run emails do not need
/// to be normalized themselves. Groups without any run keep the survivor's
/// own name.
pub fn plan_reconciliation(
    rows: &[LeaderboardRow],
    runs: &[RunSummary],
    source: NameSource,
) -> ReconciliationPlan {
    let groups = group_rows(rows);
    let latest = LatestNames::collect(runs);

    let mut plan = ReconciliationPlan {
        rows_scanned: rows.len(),
        groups: groups.len(),
        ..Default::default()
    };

    for (key, members) in &groups {
        let survivor = members[0];

        if members.len() > 1 {
            debug!(
                "Merging {} rows for {}/{} into id {}",
                members.len(),
                key.email,
                key.game_type,
                survivor.id
            );
            plan.merges.push(MergeDecision {
                key: key.clone(),
                survivor: survivor.clone(),
                removed: members[1..].iter().map(|row| (*row).clone()).collect(),
            });
        }

        if survivor.email != key.email {
            plan.email_rewrites.push(EmailRewrite {
                id: survivor.id,
                from: survivor.email.clone(),
                to: key.email.clone(),
            });
        }

        let same_game_type = latest.for_key(key).unwrap_or(&survivor.name);
        let any_game_type = latest.for_email(&key.email).unwrap_or(&survivor.name);
        if same_game_type != any_game_type {
            plan.discrepancies.push(NameDiscrepancy {
                key: key.clone(),
                same_game_type: same_game_type.to_string(),
                any_game_type: any_game_type.to_string(),
            });
        }

        let target = match source {
            NameSource::SameGameType => same_game_type,
            NameSource::AnyGameType => any_game_type,
        };
        if target != survivor.name {
            plan.name_updates.push(NameUpdate {
                id: survivor.id,
                key: key.clone(),
                from: survivor.name.clone(),
                to: target.to_string(),
            });
        }
    }

    plan
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateGroup {
    pub key: GroupKey,
    pub keep: LeaderboardRow,
    pub delete: Vec<LeaderboardRow>,
}

/// Read-only findings about the leaderboard's normalization state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditReport {
    pub total_rows: usize,
    pub duplicate_groups: Vec<DuplicateGroup>,
    /// normalized email -> raw spellings seen, only where there is more than one
    pub case_variations: BTreeMap<String, BTreeSet<String>>,
    pub non_normalized: Vec<EmailRewrite>,
}

impl AuditReport {
    pub fn is_clean(&self) -> bool {
        self.duplicate_groups.is_empty()
            && self.case_variations.is_empty()
            && self.non_normalized.is_empty()
    }

    pub fn affected_emails(&self) -> BTreeSet<&str> {
        self.duplicate_groups
            .iter()
            .map(|group| group.key.email.as_str())
            .collect()
    }
}

pub fn audit(rows: &[LeaderboardRow]) -> AuditReport {
    let mut spellings: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for row in rows {
        spellings
            .entry(normalize_email(&row.email))
            .or_default()
            .insert(row.email.clone());
    }

    let duplicate_groups = group_rows(rows)
        .into_iter()
        .filter(|(_, members)| members.len() > 1)
        .map(|(key, members)| DuplicateGroup {
            key,
            keep: members[0].clone(),
            delete: members[1..].iter().map(|row| (*row).clone()).collect(),
        })
        .collect();

    let non_normalized = rows
        .iter()
        .filter(|row| !is_normalized_email(&row.email))
        .map(|row| EmailRewrite {
            id: row.id,
            from: row.email.clone(),
            to: normalize_email(&row.email),
        })
        .collect();

    AuditReport {
        total_rows: rows.len(),
        duplicate_groups,
        case_variations: spellings
            .into_iter()
            .filter(|(_, raw)| raw.len() > 1)
            .collect(),
        non_normalized,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use prediction_types::DEFAULT_GAME_TYPE;

    fn row(id: i32, email: &str, name: &str, best_score: i32, games: i32) -> LeaderboardRow {
        LeaderboardRow {
            id,
            email: email.to_string(),
            game_type: DEFAULT_GAME_TYPE.to_string(),
            name: name.to_string(),
            best_score,
            total_games_played: games,
        }
    }

    fn run(id: i32, email: &str, game_type: &str, name: &str, minute: u32) -> RunSummary {
        RunSummary {
            id,
            email: email.to_string(),
            game_type: game_type.to_string(),
            user_name: name.to_string(),
            created_at: Utc.with_ymd_and_hms(2024, 6, 1, 12, minute, 0).unwrap(),
        }
    }

    #[test]
    fn test_case_and_whitespace_duplicates_merge() {
        let rows = vec![row(1, "A@x.com", "Ann", 6, 1), row(2, "a@x.com ", "ann", 9, 3)];

        let plan = plan_reconciliation(&rows, &[], NameSource::default());
        assert_eq!(plan.groups, 1);
        assert_eq!(plan.deleted_ids(), vec![1]);

        let remaining = plan.apply(&rows);
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, 2);
        assert_eq!(remaining[0].email, "a@x.com");
        assert_eq!(remaining[0].best_score, 9);
        assert_eq!(remaining[0].total_games_played, 3);
        assert_eq!(remaining[0].name, "ann");
    }

    #[test]
    fn test_survivor_tie_breaks() {
        // Same best score: more games wins
        let rows = vec![row(1, "b@x.com", "B", 7, 2), row(2, "B@x.com", "B", 7, 5)];
        let plan = plan_reconciliation(&rows, &[], NameSource::default());
        assert_eq!(plan.merges[0].survivor.id, 2);

        // Full tie: oldest row wins
        let rows = vec![row(4, "c@x.com", "C", 7, 2), row(3, "c@x.com", "C", 7, 2)];
        let plan = plan_reconciliation(&rows, &[], NameSource::default());
        assert_eq!(plan.merges[0].survivor.id, 3);
        assert_eq!(plan.deleted_ids(), vec![4]);

        // Best score beats games played
        let rows = vec![row(1, "d@x.com", "D", 3, 40), row(2, "d@x.com", "D", 4, 1)];
        let plan = plan_reconciliation(&rows, &[], NameSource::default());
        assert_eq!(plan.merges[0].survivor.id, 2);
    }

    #[test]
    fn test_survivor_choice_ignores_input_order() {
        let mut rows = vec![
            row(5, "e@x.com", "E", 8, 2),
            row(2, "E@X.COM", "E", 8, 2),
            row(9, " e@x.com", "E", 1, 30),
        ];
        let forward = plan_reconciliation(&rows, &[], NameSource::default());
        rows.reverse();
        let backward = plan_reconciliation(&rows, &[], NameSource::default());

        assert_eq!(forward.merges[0].survivor.id, 2);
        assert_eq!(forward.merges, backward.merges);
    }

    #[test]
    fn test_game_types_are_separate_groups() {
        let mut other = row(2, "F@x.com", "F", 5, 1);
        other.game_type = "other".to_string();
        let rows = vec![row(1, "f@x.com", "F", 5, 1), other];

        let plan = plan_reconciliation(&rows, &[], NameSource::default());
        assert_eq!(plan.groups, 2);
        assert!(plan.merges.is_empty());
        assert_eq!(plan.email_rewrites.len(), 1);
        assert_eq!(plan.email_rewrites[0].to, "f@x.com");
    }

    #[test]
    fn test_name_follows_latest_run() {
        let rows = vec![row(1, "g@x.com", "Old Name", 4, 2)];
        let runs = vec![
            run(1, "g@x.com", DEFAULT_GAME_TYPE, "Old Name", 0),
            run(2, "G@x.com ", DEFAULT_GAME_TYPE, "New Name", 5),
        ];

        let plan = plan_reconciliation(&rows, &runs, NameSource::default());
        assert_eq!(plan.name_updates.len(), 1);
        assert_eq!(plan.name_updates[0].to, "New Name");
        assert!(plan.discrepancies.is_empty());
    }

    #[test]
    fn test_name_source_scope_and_discrepancy() {
        let rows = vec![row(1, "h@x.com", "Same", 4, 2)];
        let runs = vec![
            run(1, "h@x.com", DEFAULT_GAME_TYPE, "Same", 0),
            run(2, "h@x.com", "other", "Elsewhere", 9),
        ];

        let same = plan_reconciliation(&rows, &runs, NameSource::SameGameType);
        assert!(same.name_updates.is_empty());
        assert_eq!(same.discrepancies.len(), 1);
        assert_eq!(same.discrepancies[0].same_game_type, "Same");
        assert_eq!(same.discrepancies[0].any_game_type, "Elsewhere");

        let any = plan_reconciliation(&rows, &runs, NameSource::AnyGameType);
        assert_eq!(any.name_updates[0].to, "Elsewhere");
        assert_eq!(any.discrepancies, same.discrepancies);
    }

    #[test]
    fn test_runs_with_equal_timestamps_use_latest_id() {
        let rows = vec![row(1, "i@x.com", "I", 4, 2)];
        let runs = vec![
            run(7, "i@x.com", DEFAULT_GAME_TYPE, "Second", 3),
            run(6, "i@x.com", DEFAULT_GAME_TYPE, "First", 3),
        ];
        let plan = plan_reconciliation(&rows, &runs, NameSource::default());
        assert_eq!(plan.name_updates[0].to, "Second");
    }

    #[test]
    fn test_reconciliation_is_idempotent() {
        let rows = vec![
            row(1, "A@x.com", "Ann", 6, 1),
            row(2, "a@x.com ", "ann", 9, 3),
            row(3, "a@x.com", "ANN", 9, 3),
            row(4, "z@x.com", "Zed", 2, 2),
            row(5, "Z@X.com", "Zed", 2, 2),
        ];
        let runs = vec![run(1, "a@x.com", DEFAULT_GAME_TYPE, "Annie", 1)];

        let first = plan_reconciliation(&rows, &runs, NameSource::default());
        let once = first.apply(&rows);
        let second = plan_reconciliation(&once, &runs, NameSource::default());
        assert!(second.is_noop());
        assert_eq!(second.apply(&once), once);

        let groups = group_rows(&once);
        assert!(groups.values().all(|members| members.len() == 1));
        assert!(once.iter().all(|row| is_normalized_email(&row.email)));
        assert_eq!(once.iter().map(|r| r.id).collect::<Vec<_>>(), vec![2, 4]);
        assert_eq!(once[0].name, "Annie");
    }

    #[test]
    fn test_audit_reports_without_planning_changes() {
        let rows = vec![
            row(1, "A@x.com", "Ann", 6, 1),
            row(2, "a@x.com ", "ann", 9, 3),
            row(3, "clean@x.com", "Clean", 1, 1),
        ];

        let report = audit(&rows);
        assert!(!report.is_clean());
        assert_eq!(report.total_rows, 3);
        assert_eq!(report.duplicate_groups.len(), 1);
        assert_eq!(report.duplicate_groups[0].keep.id, 2);
        assert_eq!(report.non_normalized.len(), 2);
        assert_eq!(report.case_variations["a@x.com"].len(), 2);
        assert_eq!(report.affected_emails().into_iter().collect::<Vec<_>>(), vec!["a@x.com"]);

        assert!(audit(&[row(3, "clean@x.com", "Clean", 1, 1)]).is_clean());
    }
}
