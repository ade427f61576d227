use async_trait::async_trait;

use crate::domain::entities::action_sequence::ActionCandidate;
use crate::domain::entities::portfolio_state::PortfolioState;
use crate::domain::error::DomainError;
use crate::domain::ports::opportunity_source::OpportunitySource;

/// Returns a fixed candidate list regardless of state. Used for candidates
/// handed in on the command line and in tests.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    candidates: Vec<ActionCandidate>,
}

impl StaticSource {
    pub fn new(candidates: Vec<ActionCandidate>) -> Self {
        Self { candidates }
    }
}

#[async_trait]
impl OpportunitySource for StaticSource {
    fn name(&self) -> &str {
        "static"
    }

    async fn candidate_actions(
        &self,
        _state: &PortfolioState,
    ) -> Result<Vec<ActionCandidate>, DomainError> {
        Ok(self.candidates.clone())
    }
}
