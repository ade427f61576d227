use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Opportunity source error: {0}")]
    Source(String),

    #[error("Simulation error: {0}")]
    Simulation(#[from] SimulationError),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Worker error: {0}")]
    Worker(String),
}

impl From<tokio::task::JoinError> for DomainError {
    fn from(e: tokio::task::JoinError) -> Self {
        DomainError::Worker(e.to_string())
    }
}

impl From<rusqlite::Error> for DomainError {
    fn from(e: rusqlite::Error) -> Self {
        DomainError::Database(e.to_string())
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(e: serde_json::Error) -> Self {
        DomainError::Parse(e.to_string())
    }
}

impl From<&str> for DomainError {
    fn from(s: &str) -> Self {
        DomainError::InvalidInput(s.to_string())
    }
}

/// Failure while applying one leg of a sequence to a simulated portfolio.
///
/// These never abort a cycle; the evaluation engine records them on the
/// evaluation row and scores the sequence as invalid.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimulationError {
    #[error("insufficient {currency} cash for {symbol}: need {required:.2}, have {available:.2}")]
    InsufficientCash {
        symbol: String,
        currency: String,
        required: f64,
        available: f64,
    },

    #[error("cannot sell {requested} {symbol}: only {held} held")]
    InsufficientPosition {
        symbol: String,
        requested: f64,
        held: f64,
    },

    #[error("invalid action at step {step}: {reason}")]
    InvalidAction { step: usize, reason: String },
}
