use crate::domain::entities::best_result::BestResult;
use crate::domain::error::DomainError;
use crate::domain::ports::best_result_repository::BestResultRepository;
use crate::domain::values::content_hash::{PortfolioHash, SequenceHash};
use crate::infrastructure::sqlite::{json_column, lock, parse_ts, ts, SharedConnection};
use rusqlite::{params, OptionalExtension};

pub struct SqliteBestResultRepo {
    conn: SharedConnection,
}

impl SqliteBestResultRepo {
    pub fn new(conn: SharedConnection) -> Self {
        Self { conn }
    }

    fn row_to_best(row: &rusqlite::Row) -> Result<BestResult, rusqlite::Error> {
        let plan_str: String = row.get(2)?;
        let created_str: String = row.get(4)?;
        let updated_str: String = row.get(5)?;
        Ok(BestResult {
            portfolio_hash: PortfolioHash::from_hex(row.get::<_, String>(0)?),
            sequence_hash: SequenceHash::from_hex(row.get::<_, String>(1)?),
            plan: json_column(2, &plan_str)?,
            score: row.get(3)?,
            created_at: parse_ts(&created_str),
            updated_at: parse_ts(&updated_str),
        })
    }
}

impl BestResultRepository for SqliteBestResultRepo {
    fn upsert_if_better(&self, best: &BestResult) -> Result<bool, DomainError> {
        let conn = lock(&self.conn)?;
        // The WHERE clause on the conflict branch is the compare-and-set:
        // a lower or equal score leaves the row untouched and reports 0 rows.
        let changed = conn
            .execute(
                "INSERT INTO best_result (portfolio_hash, sequence_hash, plan, score, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(portfolio_hash) DO UPDATE SET
                    sequence_hash = excluded.sequence_hash,
                    plan = excluded.plan,
                    score = excluded.score,
                    updated_at = excluded.updated_at
                 WHERE excluded.score > best_result.score",
                params![
                    best.portfolio_hash.as_str(),
                    best.sequence_hash.as_str(),
                    serde_json::to_string(&best.plan)?,
                    best.score,
                    ts(&best.created_at),
                    ts(&best.updated_at),
                ],
            )
            .map_err(|e| DomainError::Database(format!("Failed to upsert best result: {e}")))?;
        Ok(changed > 0)
    }

    fn get(&self, portfolio_hash: &PortfolioHash) -> Result<Option<BestResult>, DomainError> {
        let conn = lock(&self.conn)?;
        let best = conn
            .query_row(
                "SELECT portfolio_hash, sequence_hash, plan, score, created_at, updated_at
                 FROM best_result WHERE portfolio_hash = ?1",
                params![portfolio_hash.as_str()],
                Self::row_to_best,
            )
            .optional()
            .map_err(|e| DomainError::Database(e.to_string()))?;
        Ok(best)
    }

    fn reset(&self, portfolio_hash: &PortfolioHash) -> Result<bool, DomainError> {
        let conn = lock(&self.conn)?;
        let rows = conn
            .execute(
                "DELETE FROM best_result WHERE portfolio_hash = ?1",
                params![portfolio_hash.as_str()],
            )
            .map_err(|e| DomainError::Database(format!("Failed to reset best result: {e}")))?;
        Ok(rows > 0)
    }
}
