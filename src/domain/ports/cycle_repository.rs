use crate::domain::entities::cycle_run::{CycleRun, PlannerMarker};
use crate::domain::entities::portfolio_state::PortfolioState;
use crate::domain::error::DomainError;
use crate::domain::values::content_hash::PortfolioHash;
use crate::domain::values::cycle_state::CycleState;
use chrono::{DateTime, Utc};

/// Everything the orchestrator needs to resume between ticks.
pub trait CycleRepository: Send + Sync {
    fn marker(&self) -> Result<PlannerMarker, DomainError>;

    /// Record a cycle start for `portfolio_hash` at `started_at`.
    fn begin_cycle(&self, portfolio_hash: &PortfolioHash, started_at: DateTime<Utc>) -> Result<(), DomainError>;

    fn set_phase(&self, phase: CycleState) -> Result<(), DomainError>;

    /// Store the latest state seen under a hash, replacing older prices.
    fn save_snapshot(&self, portfolio_hash: &PortfolioHash, state: &PortfolioState) -> Result<(), DomainError>;

    fn load_snapshot(&self, portfolio_hash: &PortfolioHash) -> Result<Option<PortfolioState>, DomainError>;

    fn delete_stale_snapshots(&self, keep: &PortfolioHash) -> Result<usize, DomainError>;

    fn record_run(&self, run: &CycleRun) -> Result<(), DomainError>;

    fn list_runs(&self, limit: usize) -> Result<Vec<CycleRun>, DomainError>;
}
