use crate::domain::entities::cycle_run::{CycleRun, PlannerMarker};
use crate::domain::entities::portfolio_state::PortfolioState;
use crate::domain::error::DomainError;
use crate::domain::ports::cycle_repository::CycleRepository;
use crate::domain::values::content_hash::PortfolioHash;
use crate::domain::values::cycle_state::{CycleOutcome, CycleState};
use crate::infrastructure::sqlite::{json_column, lock, parse_ts, ts, SharedConnection};
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};

pub struct SqliteCycleRepo {
    conn: SharedConnection,
}

impl SqliteCycleRepo {
    pub fn new(conn: SharedConnection) -> Self {
        Self { conn }
    }

    fn row_to_run(row: &rusqlite::Row) -> Result<CycleRun, rusqlite::Error> {
        let outcome_str: String = row.get(2)?;
        let started_str: String = row.get(11)?;
        let finished_str: String = row.get(12)?;
        let count = |idx: usize| -> Result<usize, rusqlite::Error> {
            let v: i64 = row.get(idx)?;
            Ok(v.max(0) as usize)
        };
        Ok(CycleRun {
            id: row.get(0)?,
            portfolio_hash: PortfolioHash::from_hex(row.get::<_, String>(1)?),
            outcome: outcome_str.parse().unwrap_or_else(|_| {
                tracing::warn!(value = %outcome_str, "invalid cycle outcome, defaulting to failed");
                CycleOutcome::Failed
            }),
            candidates: count(3)?,
            inserted: count(4)?,
            evaluated: count(5)?,
            failed: count(6)?,
            pending_count: count(7)?,
            completed_count: count(8)?,
            best_score: row.get(9)?,
            error: row.get(10)?,
            started_at: parse_ts(&started_str),
            finished_at: parse_ts(&finished_str),
        })
    }
}

impl CycleRepository for SqliteCycleRepo {
    fn marker(&self) -> Result<PlannerMarker, DomainError> {
        let conn = lock(&self.conn)?;
        let row = conn
            .query_row(
                "SELECT last_cycle_start, last_portfolio_hash, phase, updated_at FROM planner_state WHERE id = 1",
                [],
                |r| {
                    Ok((
                        r.get::<_, Option<String>>(0)?,
                        r.get::<_, Option<String>>(1)?,
                        r.get::<_, String>(2)?,
                        r.get::<_, String>(3)?,
                    ))
                },
            )
            .optional()
            .map_err(|e| DomainError::Database(e.to_string()))?;

        Ok(match row {
            Some((start, hash, phase, updated)) => PlannerMarker {
                last_cycle_start: start.as_deref().map(parse_ts),
                last_portfolio_hash: hash.map(PortfolioHash::from_hex),
                phase: phase.parse().unwrap_or(CycleState::Idle),
                updated_at: parse_ts(&updated),
            },
            None => PlannerMarker {
                last_cycle_start: None,
                last_portfolio_hash: None,
                phase: CycleState::Idle,
                updated_at: Utc::now(),
            },
        })
    }

    fn begin_cycle(&self, portfolio_hash: &PortfolioHash, started_at: DateTime<Utc>) -> Result<(), DomainError> {
        let conn = lock(&self.conn)?;
        conn.execute(
            "INSERT INTO planner_state (id, last_cycle_start, last_portfolio_hash, phase, updated_at)
             VALUES (1, ?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET
                last_cycle_start = excluded.last_cycle_start,
                last_portfolio_hash = excluded.last_portfolio_hash,
                phase = excluded.phase,
                updated_at = excluded.updated_at",
            params![
                ts(&started_at),
                portfolio_hash.as_str(),
                CycleState::Generating.to_string(),
                ts(&Utc::now()),
            ],
        )
        .map_err(|e| DomainError::Database(format!("Failed to record cycle start: {e}")))?;
        Ok(())
    }

    fn set_phase(&self, phase: CycleState) -> Result<(), DomainError> {
        let conn = lock(&self.conn)?;
        conn.execute(
            "INSERT INTO planner_state (id, phase, updated_at) VALUES (1, ?1, ?2)
             ON CONFLICT(id) DO UPDATE SET phase = excluded.phase, updated_at = excluded.updated_at",
            params![phase.to_string(), ts(&Utc::now())],
        )
        .map_err(|e| DomainError::Database(format!("Failed to record phase: {e}")))?;
        Ok(())
    }

    fn save_snapshot(&self, portfolio_hash: &PortfolioHash, state: &PortfolioState) -> Result<(), DomainError> {
        let conn = lock(&self.conn)?;
        conn.execute(
            "INSERT INTO portfolio_states (portfolio_hash, state, captured_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(portfolio_hash) DO UPDATE SET state = excluded.state, captured_at = excluded.captured_at",
            params![
                portfolio_hash.as_str(),
                serde_json::to_string(state)?,
                ts(&Utc::now()),
            ],
        )
        .map_err(|e| DomainError::Database(format!("Failed to save portfolio state: {e}")))?;
        Ok(())
    }

    fn load_snapshot(&self, portfolio_hash: &PortfolioHash) -> Result<Option<PortfolioState>, DomainError> {
        let conn = lock(&self.conn)?;
        let state = conn
            .query_row(
                "SELECT state FROM portfolio_states WHERE portfolio_hash = ?1",
                params![portfolio_hash.as_str()],
                |r| {
                    let raw: String = r.get(0)?;
                    json_column(0, &raw)
                },
            )
            .optional()
            .map_err(|e| DomainError::Database(e.to_string()))?;
        Ok(state)
    }

    fn delete_stale_snapshots(&self, keep: &PortfolioHash) -> Result<usize, DomainError> {
        let conn = lock(&self.conn)?;
        let rows = conn
            .execute(
                "DELETE FROM portfolio_states WHERE portfolio_hash != ?1",
                params![keep.as_str()],
            )
            .map_err(|e| DomainError::Database(format!("Failed to delete stale states: {e}")))?;
        Ok(rows)
    }

    fn record_run(&self, run: &CycleRun) -> Result<(), DomainError> {
        let conn = lock(&self.conn)?;
        conn.execute(
            "INSERT INTO cycle_runs (id, portfolio_hash, outcome, candidates, inserted, evaluated, failed, pending_count, completed_count, best_score, error, started_at, finished_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                run.id,
                run.portfolio_hash.as_str(),
                run.outcome.to_string(),
                run.candidates as i64,
                run.inserted as i64,
                run.evaluated as i64,
                run.failed as i64,
                run.pending_count as i64,
                run.completed_count as i64,
                run.best_score,
                run.error,
                ts(&run.started_at),
                ts(&run.finished_at),
            ],
        )
        .map_err(|e| DomainError::Database(format!("Failed to record cycle run: {e}")))?;
        Ok(())
    }

    fn list_runs(&self, limit: usize) -> Result<Vec<CycleRun>, DomainError> {
        let conn = lock(&self.conn)?;
        let mut stmt = conn
            .prepare(
                "SELECT id, portfolio_hash, outcome, candidates, inserted, evaluated, failed, pending_count, completed_count, best_score, error, started_at, finished_at
                 FROM cycle_runs ORDER BY started_at DESC, id ASC LIMIT ?1",
            )
            .map_err(|e| DomainError::Database(e.to_string()))?;
        let runs = stmt
            .query_map(params![limit as i64], Self::row_to_run)
            .map_err(|e| DomainError::Database(e.to_string()))?
            .filter_map(|r| r.ok())
            .collect();
        Ok(runs)
    }
}
