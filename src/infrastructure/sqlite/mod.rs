pub mod best_result_repo;
pub mod cycle_repo;
pub mod migrations;
pub mod recommendation_repo;
pub mod sequence_repo;

use crate::domain::error::DomainError;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::Connection;
use std::sync::{Arc, Mutex, MutexGuard};

/// One connection shared by every repository. Cross-table writes
/// (evaluation + completion) need to sit in the same transaction, and
/// `:memory:` databases are per-connection.
pub type SharedConnection = Arc<Mutex<Connection>>;

pub fn open(db_path: &str) -> Result<SharedConnection, DomainError> {
    let conn = Connection::open(db_path).map_err(|e| DomainError::Database(format!("DB error: {e}")))?;
    conn.pragma_update(None, "journal_mode", "WAL")
        .map_err(|e| DomainError::Database(format!("WAL error: {e}")))?;
    conn.busy_timeout(std::time::Duration::from_secs(5))
        .map_err(|e| DomainError::Database(format!("busy_timeout error: {e}")))?;
    migrations::run_migrations(&conn)?;
    Ok(Arc::new(Mutex::new(conn)))
}

pub(crate) fn lock(conn: &SharedConnection) -> Result<MutexGuard<'_, Connection>, DomainError> {
    conn.lock().map_err(|e| DomainError::Database(e.to_string()))
}

/// Fixed-width UTC timestamps so lexical order in SQL matches time order.
pub(crate) fn ts(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_ts(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| {
            tracing::warn!(value = s, "invalid timestamp in database, using now");
            Utc::now()
        })
}

pub(crate) fn json_column<T: serde::de::DeserializeOwned>(
    idx: usize,
    raw: &str,
) -> Result<T, rusqlite::Error> {
    serde_json::from_str(raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}
