//! Applies a reconciliation plan to the `leaderboard` table.
//!
//! Everything runs in one transaction: the snapshot read, the deletes and
//! rewrites, installing the guards and the final duplicate check. If any step
//! fails the transaction is dropped and nothing is applied.

use chrono::{DateTime, Utc};
use prediction_core::reconciliation::{
    plan_reconciliation, LeaderboardRow, NameDiscrepancy, NameSource, ReconciliationPlan,
    RunSummary,
};
use sea_orm_migration::sea_orm::{DbBackend, FromQueryResult, Statement, TransactionTrait};
use sea_orm_migration::prelude::*;
use tracing::{debug, info, warn};

use crate::{GameRuns, Leaderboard};

pub const UNIQUE_EMAIL_INDEX: &str = "idx_leaderboard_email_game_type";
pub const NORMALIZED_EMAIL_CHECK: &str = "chk_leaderboard_email_normalized";

// SQLite limits bound parameters per statement
const DELETE_BATCH: usize = 500;

const SQLITE_INSERT_TRIGGER: &str = "trg_leaderboard_email_normalized_insert";
const SQLITE_UPDATE_TRIGGER: &str = "trg_leaderboard_email_normalized_update";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconciliationReport {
    pub rows_scanned: usize,
    pub groups: usize,
    pub rows_deleted: usize,
    pub emails_normalized: usize,
    pub names_repointed: usize,
    pub discrepancies: Vec<NameDiscrepancy>,
}

impl From<&ReconciliationPlan> for ReconciliationReport {
    fn from(plan: &ReconciliationPlan) -> Self {
        Self {
            rows_scanned: plan.rows_scanned,
            groups: plan.groups,
            rows_deleted: plan.deleted_ids().len(),
            emails_normalized: plan.email_rewrites.len(),
            names_repointed: plan.name_updates.len(),
            discrepancies: plan.discrepancies.clone(),
        }
    }
}

#[derive(Debug, FromQueryResult)]
struct StoredEntry {
    id: i32,
    email: String,
    game_type: String,
    name: String,
    best_score: i32,
    total_games_played: i32,
}

impl From<StoredEntry> for LeaderboardRow {
    fn from(entry: StoredEntry) -> Self {
        LeaderboardRow {
            id: entry.id,
            email: entry.email,
            game_type: entry.game_type,
            name: entry.name,
            best_score: entry.best_score,
            total_games_played: entry.total_games_played,
        }
    }
}

#[derive(Debug, FromQueryResult)]
struct StoredRun {
    id: i32,
    email: String,
    game_type: String,
    user_name: String,
    created_at: DateTime<Utc>,
}

#[derive(Debug, FromQueryResult)]
struct DuplicateKey {
    email: String,
    game_type: String,
    copies: i64,
}

/// Deduplicate the leaderboard and install its uniqueness guards.
///
/// Safe to run any number of times: once the table is clean the plan is empty
/// and the guards are created with `IF NOT EXISTS` semantics.
pub async fn reconcile_leaderboard<C>(
    db: &C,
    name_source: NameSource,
) -> Result<ReconciliationReport, DbErr>
where
    C: ConnectionTrait + TransactionTrait,
{
    let txn = db.begin().await?;
    let report = reconcile_in(&txn, name_source).await?;
    txn.commit().await?;
    Ok(report)
}

/// The reconciliation steps without transaction handling. The caller owns the
/// transaction boundary.
pub async fn reconcile_in<C: ConnectionTrait>(
    conn: &C,
    name_source: NameSource,
) -> Result<ReconciliationReport, DbErr> {
    lock_leaderboard(conn).await?;

    let rows = leaderboard_rows(conn).await?;
    let runs = run_summaries(conn).await?;
    let plan = plan_reconciliation(&rows, &runs, name_source);

    for discrepancy in &plan.discrepancies {
        warn!(
            "Display name for {} depends on run scope: latest same-game run says '{}', latest run overall says '{}'",
            discrepancy.key, discrepancy.same_game_type, discrepancy.any_game_type
        );
    }

    if plan.is_noop() {
        debug!("Leaderboard already reconciled ({} rows)", plan.rows_scanned);
    } else {
        apply_plan(conn, &plan).await?;
    }

    install_guards(conn).await?;
    verify_unique(conn).await?;

    Ok(ReconciliationReport::from(&plan))
}

/// Snapshot of every leaderboard row, oldest first.
pub async fn leaderboard_rows<C: ConnectionTrait>(conn: &C) -> Result<Vec<LeaderboardRow>, DbErr> {
    let query = Query::select()
        .columns([
            Leaderboard::Id,
            Leaderboard::Email,
            Leaderboard::GameType,
            Leaderboard::Name,
            Leaderboard::BestScore,
            Leaderboard::TotalGamesPlayed,
        ])
        .from(Leaderboard::Table)
        .order_by(Leaderboard::Id, Order::Asc)
        .to_owned();

    let entries = StoredEntry::find_by_statement(conn.get_database_backend().build(&query))
        .all(conn)
        .await?;
    Ok(entries.into_iter().map(LeaderboardRow::from).collect())
}

async fn run_summaries<C: ConnectionTrait>(conn: &C) -> Result<Vec<RunSummary>, DbErr> {
    let query = Query::select()
        .columns([
            GameRuns::Id,
            GameRuns::Email,
            GameRuns::GameType,
            GameRuns::UserName,
            GameRuns::CreatedAt,
        ])
        .from(GameRuns::Table)
        .to_owned();

    let runs = StoredRun::find_by_statement(conn.get_database_backend().build(&query))
        .all(conn)
        .await?;
    Ok(runs
        .into_iter()
        .map(|run| RunSummary {
            id: run.id,
            email: run.email,
            game_type: run.game_type,
            user_name: run.user_name,
            created_at: run.created_at,
        })
        .collect())
}

/// Keep concurrent writers out until commit so nothing can slip in between
/// the snapshot and the unique index. SQLite gets the same effect from its
/// single-writer lock: a write after a stale read fails with `SQLITE_BUSY`.
async fn lock_leaderboard<C: ConnectionTrait>(conn: &C) -> Result<(), DbErr> {
    if conn.get_database_backend() == DbBackend::Postgres {
        conn.execute_unprepared("LOCK TABLE leaderboard IN SHARE ROW EXCLUSIVE MODE")
            .await?;
    }
    Ok(())
}

async fn apply_plan<C: ConnectionTrait>(conn: &C, plan: &ReconciliationPlan) -> Result<(), DbErr> {
    let backend = conn.get_database_backend();
    let now = Utc::now();

    for merge in &plan.merges {
        info!(
            "Merging {} rows for {}: keeping id {} (best {}, games {})",
            merge.removed.len() + 1,
            merge.key,
            merge.survivor.id,
            merge.survivor.best_score,
            merge.survivor.total_games_played
        );
    }

    // Deletes go first so rewritten emails never collide with a loser row
    for ids in plan.deleted_ids().chunks(DELETE_BATCH) {
        let delete = Query::delete()
            .from_table(Leaderboard::Table)
            .and_where(Expr::col(Leaderboard::Id).is_in(ids.iter().copied()))
            .to_owned();
        conn.execute(backend.build(&delete)).await?;
    }

    for rewrite in &plan.email_rewrites {
        debug!("Normalizing email of row {}: '{}' -> '{}'", rewrite.id, rewrite.from, rewrite.to);
        let update = Query::update()
            .table(Leaderboard::Table)
            .value(Leaderboard::Email, rewrite.to.clone())
            .value(Leaderboard::UpdatedAt, now)
            .and_where(Expr::col(Leaderboard::Id).eq(rewrite.id))
            .to_owned();
        conn.execute(backend.build(&update)).await?;
    }

    for rename in &plan.name_updates {
        debug!("Re-pointing name for {}: '{}' -> '{}'", rename.key, rename.from, rename.to);
        let update = Query::update()
            .table(Leaderboard::Table)
            .value(Leaderboard::Name, rename.to.clone())
            .value(Leaderboard::UpdatedAt, now)
            .and_where(Expr::col(Leaderboard::Id).eq(rename.id))
            .to_owned();
        conn.execute(backend.build(&update)).await?;
    }

    Ok(())
}

/// Unique index on `(lower(email), game_type)` plus a standing check that
/// stored emails are already lowercase and trimmed.
async fn install_guards<C: ConnectionTrait>(conn: &C) -> Result<(), DbErr> {
    conn.execute_unprepared(&format!(
        "CREATE UNIQUE INDEX IF NOT EXISTS {UNIQUE_EMAIL_INDEX} ON leaderboard (lower(email), game_type)"
    ))
    .await?;

    match conn.get_database_backend() {
        DbBackend::Postgres => {
            conn.execute_unprepared(&format!(
                "ALTER TABLE leaderboard DROP CONSTRAINT IF EXISTS {NORMALIZED_EMAIL_CHECK}"
            ))
            .await?;
            conn.execute_unprepared(&format!(
                "ALTER TABLE leaderboard ADD CONSTRAINT {NORMALIZED_EMAIL_CHECK} CHECK (email = lower(btrim(email)))"
            ))
            .await?;
        }
        DbBackend::Sqlite => {
            // SQLite cannot add a CHECK to an existing table
            for (trigger, event) in [
                (SQLITE_INSERT_TRIGGER, "INSERT"),
                (SQLITE_UPDATE_TRIGGER, "UPDATE OF email"),
            ] {
                conn.execute_unprepared(&format!(
                    "CREATE TRIGGER IF NOT EXISTS {trigger} BEFORE {event} ON leaderboard \
                     WHEN NEW.email <> lower(trim(NEW.email)) \
                     BEGIN SELECT RAISE(ABORT, '{NORMALIZED_EMAIL_CHECK}: email must be lowercase and trimmed'); END"
                ))
                .await?;
            }
        }
        DbBackend::MySql => {
            return Err(DbErr::Migration(
                "leaderboard reconciliation is not supported on MySQL".to_string(),
            ));
        }
    }

    Ok(())
}

pub async fn drop_guards<C: ConnectionTrait>(conn: &C) -> Result<(), DbErr> {
    match conn.get_database_backend() {
        DbBackend::Postgres => {
            conn.execute_unprepared(&format!(
                "ALTER TABLE leaderboard DROP CONSTRAINT IF EXISTS {NORMALIZED_EMAIL_CHECK}"
            ))
            .await?;
        }
        DbBackend::Sqlite => {
            for trigger in [SQLITE_INSERT_TRIGGER, SQLITE_UPDATE_TRIGGER] {
                conn.execute_unprepared(&format!("DROP TRIGGER IF EXISTS {trigger}"))
                    .await?;
            }
        }
        DbBackend::MySql => {}
    }

    conn.execute_unprepared(&format!("DROP INDEX IF EXISTS {UNIQUE_EMAIL_INDEX}"))
        .await?;
    Ok(())
}

/// Postcondition: no `(lower(email), game_type)` group holds more than one row.
async fn verify_unique<C: ConnectionTrait>(conn: &C) -> Result<(), DbErr> {
    let backend = conn.get_database_backend();
    let duplicates = DuplicateKey::find_by_statement(Statement::from_string(
        backend,
        "SELECT lower(email) AS email, game_type, COUNT(*) AS copies FROM leaderboard \
         GROUP BY lower(email), game_type HAVING COUNT(*) > 1",
    ))
    .all(conn)
    .await?;

    if let Some(first) = duplicates.first() {
        return Err(DbErr::Migration(format!(
            "{} leaderboard keys still have duplicates after reconciliation, e.g. {} ({}) x{}",
            duplicates.len(),
            first.email,
            first.game_type,
            first.copies
        )));
    }
    Ok(())
}
