use crate::domain::entities::recommendation::Recommendation;
use crate::domain::error::DomainError;
use crate::domain::ports::recommendation_repository::*;
use crate::domain::values::content_hash::{PortfolioHash, SequenceHash};
use crate::domain::values::recommendation_status::RecommendationStatus;
use crate::infrastructure::sqlite::{lock, parse_ts, ts, SharedConnection};
use chrono::Utc;
use rusqlite::params;

const SELECT_COLS: &str = "id, portfolio_hash, sequence_hash, step_index, symbol, side, quantity, estimated_price, estimated_value, currency, reason, status, created_at, updated_at";

pub struct SqliteRecommendationRepo {
    conn: SharedConnection,
}

impl SqliteRecommendationRepo {
    pub fn new(conn: SharedConnection) -> Self {
        Self { conn }
    }

    fn row_to_recommendation(row: &rusqlite::Row) -> Result<Recommendation, rusqlite::Error> {
        let step_index: i64 = row.get(3)?;
        let side_str: String = row.get(5)?;
        let status_str: String = row.get(11)?;
        let created_str: String = row.get(12)?;
        let updated_str: String = row.get(13)?;

        Ok(Recommendation {
            id: row.get(0)?,
            portfolio_hash: PortfolioHash::from_hex(row.get::<_, String>(1)?),
            sequence_hash: SequenceHash::from_hex(row.get::<_, String>(2)?),
            step_index: step_index.max(0) as usize,
            symbol: row.get(4)?,
            side: side_str.parse().map_err(|_| {
                rusqlite::Error::InvalidParameterName(format!("invalid side '{side_str}'"))
            })?,
            quantity: row.get(6)?,
            estimated_price: row.get(7)?,
            estimated_value: row.get(8)?,
            currency: row.get(9)?,
            reason: row.get(10)?,
            status: status_str.parse().unwrap_or_else(|_| {
                tracing::warn!(value = %status_str, "invalid recommendation status, defaulting to dismissed");
                RecommendationStatus::Dismissed
            }),
            created_at: parse_ts(&created_str),
            updated_at: parse_ts(&updated_str),
        })
    }
}

impl RecommendationRepository for SqliteRecommendationRepo {
    fn replace_pending(&self, recs: &[Recommendation]) -> Result<usize, DomainError> {
        let mut conn = lock(&self.conn)?;
        let tx = conn.transaction()?;
        let cleared = tx.execute(
            "DELETE FROM recommendations WHERE status = ?1",
            params![RecommendationStatus::Pending.to_string()],
        )
        .map_err(|e| DomainError::Database(format!("Failed to clear pending recommendations: {e}")))?;
        {
            let mut stmt = tx.prepare(&format!(
                "INSERT INTO recommendations ({SELECT_COLS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)"
            ))?;
            for rec in recs {
                stmt.execute(params![
                    rec.id,
                    rec.portfolio_hash.as_str(),
                    rec.sequence_hash.as_str(),
                    rec.step_index as i64,
                    rec.symbol,
                    rec.side.to_string(),
                    rec.quantity,
                    rec.estimated_price,
                    rec.estimated_value,
                    rec.currency,
                    rec.reason,
                    rec.status.to_string(),
                    ts(&rec.created_at),
                    ts(&rec.updated_at),
                ])
                .map_err(|e| DomainError::Database(format!("Failed to add recommendation: {e}")))?;
            }
        }
        tx.commit()?;
        Ok(cleared)
    }

    fn list(&self, filter: &RecommendationFilter) -> Result<Vec<Recommendation>, DomainError> {
        let conn = lock(&self.conn)?;
        let mut sql = format!("SELECT {SELECT_COLS} FROM recommendations WHERE 1=1");
        let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

        if let Some(status) = &filter.status {
            sql.push_str(&format!(" AND status = ?{}", param_values.len() + 1));
            param_values.push(Box::new(status.to_string()));
        }
        sql.push_str(" ORDER BY created_at DESC, step_index ASC");
        if let Some(limit) = filter.limit {
            sql.push_str(&format!(" LIMIT ?{}", param_values.len() + 1));
            param_values.push(Box::new(limit as i64));
        }

        let params_refs: Vec<&dyn rusqlite::types::ToSql> =
            param_values.iter().map(|p| p.as_ref()).collect();
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| DomainError::Database(e.to_string()))?;
        let recs = stmt
            .query_map(params_refs.as_slice(), Self::row_to_recommendation)
            .map_err(|e| DomainError::Database(e.to_string()))?
            .filter_map(|r| r.ok())
            .collect();
        Ok(recs)
    }

    fn set_status(&self, id: &str, status: RecommendationStatus) -> Result<(), DomainError> {
        let conn = lock(&self.conn)?;
        let rows = conn
            .execute(
                "UPDATE recommendations SET status = ?1, updated_at = ?2 WHERE id = ?3",
                params![status.to_string(), ts(&Utc::now()), id],
            )
            .map_err(|e| DomainError::Database(format!("Failed to update recommendation: {e}")))?;
        if rows == 0 {
            return Err(DomainError::NotFound(format!("Recommendation not found: {id}")));
        }
        Ok(())
    }
}
