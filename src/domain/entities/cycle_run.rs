use crate::domain::values::content_hash::PortfolioHash;
use crate::domain::values::cycle_state::{CycleOutcome, CycleState};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One row of planning-cycle history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleRun {
    pub id: String,
    pub portfolio_hash: PortfolioHash,
    pub outcome: CycleOutcome,
    pub candidates: usize,
    pub inserted: usize,
    pub evaluated: usize,
    pub failed: usize,
    pub pending_count: usize,
    pub completed_count: usize,
    pub best_score: Option<f64>,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Durable scheduler bookkeeping. A single row; the orchestrator keeps
/// nothing in memory between ticks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannerMarker {
    pub last_cycle_start: Option<DateTime<Utc>>,
    pub last_portfolio_hash: Option<PortfolioHash>,
    pub phase: CycleState,
    pub updated_at: DateTime<Utc>,
}
