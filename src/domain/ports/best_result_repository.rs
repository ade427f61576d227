use crate::domain::entities::best_result::BestResult;
use crate::domain::error::DomainError;
use crate::domain::values::content_hash::PortfolioHash;

pub trait BestResultRepository: Send + Sync {
    /// Insert, or replace only when `best.score` is strictly greater than
    /// the stored score. The comparison happens inside the store so a slow
    /// writer can never overwrite a higher score.
    fn upsert_if_better(&self, best: &BestResult) -> Result<bool, DomainError>;

    fn get(&self, portfolio_hash: &PortfolioHash) -> Result<Option<BestResult>, DomainError>;

    /// Explicit reset; the only way a stored score may go down.
    fn reset(&self, portfolio_hash: &PortfolioHash) -> Result<bool, DomainError>;
}
