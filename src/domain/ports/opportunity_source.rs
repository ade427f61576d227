use async_trait::async_trait;

use crate::domain::entities::action_sequence::ActionCandidate;
use crate::domain::entities::portfolio_state::PortfolioState;
use crate::domain::error::DomainError;

/// Supplies ranked buy/sell candidates for a portfolio state.
///
/// Broker clients, screeners and security scoring live behind this trait;
/// the planner only consumes their output.
#[async_trait]
pub trait OpportunitySource: Send + Sync {
    /// Human-readable name for logging.
    fn name(&self) -> &str;

    async fn candidate_actions(
        &self,
        state: &PortfolioState,
    ) -> Result<Vec<ActionCandidate>, DomainError>;
}
