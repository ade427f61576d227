use crate::domain::entities::action_sequence::ActionSequence;
use crate::domain::entities::evaluation::EvaluationResult;
use crate::domain::error::DomainError;
use crate::domain::ports::sequence_repository::*;
use crate::domain::values::content_hash::{PortfolioHash, SequenceHash};
use crate::domain::values::pattern_type::PatternType;
use crate::infrastructure::sqlite::{json_column, lock, parse_ts, ts, SharedConnection};
use chrono::Utc;
use rusqlite::{params, OptionalExtension, TransactionBehavior};
use std::time::Duration;

const SEQUENCE_COLS: &str =
    "sequence_hash, portfolio_hash, actions, pattern_type, depth, priority, completed, evaluated_at, created_at";

const EVALUATION_COLS: &str = "sequence_hash, portfolio_hash, end_score, breakdown, end_cash, end_positions, diversification_score, total_value, fees_paid, valid, error, evaluated_at";

/// Claim and pending-queue order. Equal priority and depth imply equal
/// aggregate score, so the hash is the last tie-break.
const SEARCH_ORDER: &str = "ORDER BY priority DESC, depth ASC, sequence_hash ASC";

pub struct SqliteSequenceRepo {
    conn: SharedConnection,
}

impl SqliteSequenceRepo {
    pub fn new(conn: SharedConnection) -> Self {
        Self { conn }
    }

    fn row_to_sequence(row: &rusqlite::Row) -> Result<ActionSequence, rusqlite::Error> {
        let actions_str: String = row.get(2)?;
        let pattern_str: String = row.get(3)?;
        let depth: i64 = row.get(4)?;
        let completed: i32 = row.get(6)?;
        let evaluated_str: Option<String> = row.get(7)?;
        let created_str: String = row.get(8)?;

        Ok(ActionSequence {
            sequence_hash: SequenceHash::from_hex(row.get::<_, String>(0)?),
            portfolio_hash: PortfolioHash::from_hex(row.get::<_, String>(1)?),
            actions: json_column(2, &actions_str)?,
            pattern: pattern_str.parse().unwrap_or_else(|_| {
                tracing::warn!(
                    value = %pattern_str,
                    "invalid pattern_type in sequence, defaulting to multi_leg_rebalance"
                );
                PatternType::MultiLegRebalance
            }),
            depth: depth.max(0) as usize,
            priority: row.get(5)?,
            completed: completed != 0,
            evaluated_at: evaluated_str.as_deref().map(parse_ts),
            created_at: parse_ts(&created_str),
        })
    }

    fn row_to_evaluation(row: &rusqlite::Row) -> Result<EvaluationResult, rusqlite::Error> {
        let breakdown_str: String = row.get(3)?;
        let positions_str: String = row.get(5)?;
        let valid: i32 = row.get(9)?;
        let evaluated_str: String = row.get(11)?;

        Ok(EvaluationResult {
            sequence_hash: SequenceHash::from_hex(row.get::<_, String>(0)?),
            portfolio_hash: PortfolioHash::from_hex(row.get::<_, String>(1)?),
            end_score: row.get(2)?,
            breakdown: json_column(3, &breakdown_str)?,
            end_cash: row.get(4)?,
            end_positions: json_column(5, &positions_str)?,
            diversification_score: row.get(6)?,
            total_value: row.get(7)?,
            fees_paid: row.get(8)?,
            valid: valid != 0,
            error: row.get(10)?,
            evaluated_at: parse_ts(&evaluated_str),
        })
    }

    fn count_where(&self, portfolio_hash: &PortfolioHash, completed: bool) -> Result<usize, DomainError> {
        let conn = lock(&self.conn)?;
        let n: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sequences WHERE portfolio_hash = ?1 AND completed = ?2",
                params![portfolio_hash.as_str(), completed as i32],
                |r| r.get(0),
            )
            .map_err(|e| DomainError::Database(format!("Failed to count sequences: {e}")))?;
        Ok(n as usize)
    }
}

fn lease_cutoff(lease: Duration) -> String {
    let lease = chrono::Duration::from_std(lease).unwrap_or_else(|_| chrono::Duration::days(365));
    ts(&(Utc::now() - lease))
}

impl SequenceRepository for SqliteSequenceRepo {
    fn insert_sequences(&self, sequences: &[ActionSequence]) -> Result<Vec<SequenceHash>, DomainError> {
        let mut conn = lock(&self.conn)?;
        let tx = conn.transaction()?;
        let mut inserted = Vec::new();
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO sequences (sequence_hash, portfolio_hash, actions, pattern_type, depth, priority, completed, evaluated_at, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, NULL, ?7)",
            )?;
            for seq in sequences {
                let changed = stmt
                    .execute(params![
                        seq.sequence_hash.as_str(),
                        seq.portfolio_hash.as_str(),
                        serde_json::to_string(&seq.actions)?,
                        seq.pattern.to_string(),
                        seq.depth as i64,
                        seq.priority,
                        ts(&seq.created_at),
                    ])
                    .map_err(|e| DomainError::Database(format!("Failed to insert sequence: {e}")))?;
                if changed == 1 {
                    inserted.push(seq.sequence_hash.clone());
                }
            }
        }
        tx.commit()?;
        Ok(inserted)
    }

    fn claim_next(
        &self,
        portfolio_hash: &PortfolioHash,
        worker: &str,
        lease: Duration,
    ) -> Result<Option<ActionSequence>, DomainError> {
        let mut conn = lock(&self.conn)?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let cutoff = lease_cutoff(lease);

        let candidate = tx
            .query_row(
                &format!(
                    "SELECT {SEQUENCE_COLS} FROM sequences
                     WHERE portfolio_hash = ?1 AND completed = 0
                       AND (claimed_at IS NULL OR claimed_at < ?2)
                     {SEARCH_ORDER} LIMIT 1"
                ),
                params![portfolio_hash.as_str(), cutoff],
                Self::row_to_sequence,
            )
            .optional()
            .map_err(|e| DomainError::Database(format!("Failed to read pending sequence: {e}")))?;

        let Some(seq) = candidate else {
            return Ok(None);
        };

        let claimed = tx
            .execute(
                "UPDATE sequences SET claimed_by = ?1, claimed_at = ?2
                 WHERE sequence_hash = ?3 AND portfolio_hash = ?4 AND completed = 0
                   AND (claimed_at IS NULL OR claimed_at < ?5)",
                params![
                    worker,
                    ts(&Utc::now()),
                    seq.sequence_hash.as_str(),
                    portfolio_hash.as_str(),
                    cutoff,
                ],
            )
            .map_err(|e| DomainError::Database(format!("Failed to claim sequence: {e}")))?;
        tx.commit()?;

        Ok((claimed == 1).then_some(seq))
    }

    fn complete(&self, evaluation: &EvaluationResult, worker: &str) -> Result<bool, DomainError> {
        let mut conn = lock(&self.conn)?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let evaluated_at = ts(&evaluation.evaluated_at);

        let marked = tx
            .execute(
                "UPDATE sequences SET completed = 1, evaluated_at = ?1, claimed_by = NULL, claimed_at = NULL
                 WHERE sequence_hash = ?2 AND portfolio_hash = ?3 AND completed = 0 AND claimed_by = ?4",
                params![
                    evaluated_at,
                    evaluation.sequence_hash.as_str(),
                    evaluation.portfolio_hash.as_str(),
                    worker,
                ],
            )
            .map_err(|e| DomainError::Database(format!("Failed to mark sequence completed: {e}")))?;
        if marked == 0 {
            // dropping the transaction rolls it back
            return Ok(false);
        }

        tx.execute(
            "INSERT INTO evaluations (sequence_hash, portfolio_hash, end_score, breakdown, end_cash, end_positions, diversification_score, total_value, fees_paid, valid, error, evaluated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
             ON CONFLICT(sequence_hash, portfolio_hash) DO UPDATE SET
                end_score = excluded.end_score,
                breakdown = excluded.breakdown,
                end_cash = excluded.end_cash,
                end_positions = excluded.end_positions,
                diversification_score = excluded.diversification_score,
                total_value = excluded.total_value,
                fees_paid = excluded.fees_paid,
                valid = excluded.valid,
                error = excluded.error,
                evaluated_at = excluded.evaluated_at",
            params![
                evaluation.sequence_hash.as_str(),
                evaluation.portfolio_hash.as_str(),
                evaluation.end_score,
                serde_json::to_string(&evaluation.breakdown)?,
                evaluation.end_cash,
                serde_json::to_string(&evaluation.end_positions)?,
                evaluation.diversification_score,
                evaluation.total_value,
                evaluation.fees_paid,
                evaluation.valid as i32,
                evaluation.error,
                evaluated_at,
            ],
        )
        .map_err(|e| DomainError::Database(format!("Failed to write evaluation: {e}")))?;

        tx.commit()?;
        Ok(true)
    }

    fn release(
        &self,
        sequence_hash: &SequenceHash,
        portfolio_hash: &PortfolioHash,
        worker: &str,
    ) -> Result<(), DomainError> {
        let conn = lock(&self.conn)?;
        conn.execute(
            "UPDATE sequences SET claimed_by = NULL, claimed_at = NULL
             WHERE sequence_hash = ?1 AND portfolio_hash = ?2 AND completed = 0 AND claimed_by = ?3",
            params![sequence_hash.as_str(), portfolio_hash.as_str(), worker],
        )
        .map_err(|e| DomainError::Database(format!("Failed to release sequence: {e}")))?;
        Ok(())
    }

    fn get_sequence(
        &self,
        sequence_hash: &SequenceHash,
        portfolio_hash: &PortfolioHash,
    ) -> Result<Option<ActionSequence>, DomainError> {
        let conn = lock(&self.conn)?;
        let seq = conn.query_row(
            &format!(
                "SELECT {SEQUENCE_COLS} FROM sequences WHERE sequence_hash = ?1 AND portfolio_hash = ?2"
            ),
            params![sequence_hash.as_str(), portfolio_hash.as_str()],
            Self::row_to_sequence,
        )
        .optional()
        .map_err(|e| DomainError::Database(e.to_string()))?;
        Ok(seq)
    }

    fn list_sequences(&self, filter: &SequenceFilter) -> Result<Vec<ActionSequence>, DomainError> {
        let conn = lock(&self.conn)?;
        let mut sql = format!("SELECT {SEQUENCE_COLS} FROM sequences WHERE portfolio_hash = ?1");
        let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> =
            vec![Box::new(filter.portfolio_hash.as_str().to_string())];

        if let Some(completed) = filter.completed {
            sql.push_str(&format!(" AND completed = ?{}", param_values.len() + 1));
            param_values.push(Box::new(completed as i32));
        }
        sql.push(' ');
        sql.push_str(SEARCH_ORDER);
        if let Some(limit) = filter.limit {
            sql.push_str(&format!(" LIMIT ?{}", param_values.len() + 1));
            param_values.push(Box::new(limit as i64));
        }

        let params_refs: Vec<&dyn rusqlite::types::ToSql> =
            param_values.iter().map(|p| p.as_ref()).collect();
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| DomainError::Database(e.to_string()))?;
        let sequences = stmt
            .query_map(params_refs.as_slice(), Self::row_to_sequence)
            .map_err(|e| DomainError::Database(e.to_string()))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| DomainError::Database(format!("Corrupt sequence row: {e}")))?;
        Ok(sequences)
    }

    fn count_pending(&self, portfolio_hash: &PortfolioHash) -> Result<usize, DomainError> {
        self.count_where(portfolio_hash, false)
    }

    fn count_completed(&self, portfolio_hash: &PortfolioHash) -> Result<usize, DomainError> {
        self.count_where(portfolio_hash, true)
    }

    fn get_evaluation(
        &self,
        sequence_hash: &SequenceHash,
        portfolio_hash: &PortfolioHash,
    ) -> Result<Option<EvaluationResult>, DomainError> {
        let conn = lock(&self.conn)?;
        let evaluation = conn.query_row(
            &format!(
                "SELECT {EVALUATION_COLS} FROM evaluations WHERE sequence_hash = ?1 AND portfolio_hash = ?2"
            ),
            params![sequence_hash.as_str(), portfolio_hash.as_str()],
            Self::row_to_evaluation,
        )
        .optional()
        .map_err(|e| DomainError::Database(e.to_string()))?;
        Ok(evaluation)
    }

    fn list_evaluations(&self, portfolio_hash: &PortfolioHash) -> Result<Vec<EvaluationResult>, DomainError> {
        let conn = lock(&self.conn)?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {EVALUATION_COLS} FROM evaluations WHERE portfolio_hash = ?1
                 ORDER BY end_score DESC, sequence_hash ASC"
            ))
            .map_err(|e| DomainError::Database(e.to_string()))?;
        let evaluations = stmt
            .query_map(params![portfolio_hash.as_str()], Self::row_to_evaluation)
            .map_err(|e| DomainError::Database(e.to_string()))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| DomainError::Database(format!("Corrupt evaluation row: {e}")))?;
        Ok(evaluations)
    }

    fn delete_stale(&self, keep: &PortfolioHash) -> Result<usize, DomainError> {
        let mut conn = lock(&self.conn)?;
        let tx = conn.transaction()?;
        let evaluations = tx
            .execute(
                "DELETE FROM evaluations WHERE portfolio_hash != ?1",
                params![keep.as_str()],
            )
            .map_err(|e| DomainError::Database(format!("Failed to delete stale evaluations: {e}")))?;
        let sequences = tx
            .execute(
                "DELETE FROM sequences WHERE portfolio_hash != ?1",
                params![keep.as_str()],
            )
            .map_err(|e| DomainError::Database(format!("Failed to delete stale sequences: {e}")))?;
        tx.commit()?;
        Ok(evaluations + sequences)
    }
}
