use crate::domain::error::DomainError;
use rusqlite::Connection;

pub fn run_migrations(conn: &Connection) -> Result<(), DomainError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS sequences (
            sequence_hash TEXT NOT NULL,
            portfolio_hash TEXT NOT NULL,
            actions TEXT NOT NULL,
            pattern_type TEXT NOT NULL,
            depth INTEGER NOT NULL,
            priority REAL NOT NULL,
            completed INTEGER NOT NULL DEFAULT 0,
            claimed_by TEXT,
            claimed_at TEXT,
            evaluated_at TEXT,
            created_at TEXT NOT NULL,
            PRIMARY KEY (sequence_hash, portfolio_hash)
        );

        CREATE TABLE IF NOT EXISTS evaluations (
            sequence_hash TEXT NOT NULL,
            portfolio_hash TEXT NOT NULL,
            end_score REAL NOT NULL,
            breakdown TEXT NOT NULL DEFAULT '{}',
            end_cash REAL NOT NULL,
            end_positions TEXT NOT NULL DEFAULT '{}',
            diversification_score REAL NOT NULL,
            total_value REAL NOT NULL,
            fees_paid REAL NOT NULL DEFAULT 0,
            valid INTEGER NOT NULL DEFAULT 1,
            error TEXT,
            evaluated_at TEXT NOT NULL,
            PRIMARY KEY (sequence_hash, portfolio_hash)
        );

        CREATE TABLE IF NOT EXISTS best_result (
            portfolio_hash TEXT PRIMARY KEY,
            sequence_hash TEXT NOT NULL,
            plan TEXT NOT NULL,
            score REAL NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS portfolio_states (
            portfolio_hash TEXT PRIMARY KEY,
            state TEXT NOT NULL,
            captured_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS planner_state (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            last_cycle_start TEXT,
            last_portfolio_hash TEXT,
            phase TEXT NOT NULL DEFAULT 'idle',
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS cycle_runs (
            id TEXT PRIMARY KEY,
            portfolio_hash TEXT NOT NULL,
            outcome TEXT NOT NULL,
            candidates INTEGER NOT NULL DEFAULT 0,
            inserted INTEGER NOT NULL DEFAULT 0,
            evaluated INTEGER NOT NULL DEFAULT 0,
            failed INTEGER NOT NULL DEFAULT 0,
            pending_count INTEGER NOT NULL DEFAULT 0,
            completed_count INTEGER NOT NULL DEFAULT 0,
            best_score REAL,
            error TEXT,
            started_at TEXT NOT NULL,
            finished_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS recommendations (
            id TEXT PRIMARY KEY,
            portfolio_hash TEXT NOT NULL,
            sequence_hash TEXT NOT NULL,
            step_index INTEGER NOT NULL,
            symbol TEXT NOT NULL,
            side TEXT NOT NULL,
            quantity REAL NOT NULL,
            estimated_price REAL NOT NULL,
            estimated_value REAL NOT NULL,
            currency TEXT,
            reason TEXT NOT NULL,
            status TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_sequences_pending ON sequences(portfolio_hash, completed, priority DESC);
        CREATE INDEX IF NOT EXISTS idx_evaluations_portfolio ON evaluations(portfolio_hash);
        CREATE INDEX IF NOT EXISTS idx_cycle_runs_started ON cycle_runs(started_at);
        CREATE INDEX IF NOT EXISTS idx_recommendations_status ON recommendations(status);
        "
    ).map_err(|e| DomainError::Database(format!("Migration failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(count, 7);
    }
}
