use crate::application::best_result::BestResultTracker;
use crate::domain::entities::recommendation::Recommendation;
use crate::domain::error::DomainError;
use crate::domain::ports::recommendation_repository::{RecommendationFilter, RecommendationRepository};
use crate::domain::values::content_hash::PortfolioHash;
use crate::domain::values::recommendation_status::RecommendationStatus;
use std::sync::Arc;
use tracing::info;

/// Turns the current best plan into user-facing recommendation rows.
pub struct RecommendationUseCase {
    repo: Arc<dyn RecommendationRepository>,
    tracker: Arc<BestResultTracker>,
}

impl RecommendationUseCase {
    pub fn new(repo: Arc<dyn RecommendationRepository>, tracker: Arc<BestResultTracker>) -> Self {
        Self { repo, tracker }
    }

    /// One pending recommendation per plan step. Previously pending rows
    /// are replaced; executed and dismissed ones stay as history.
    pub fn materialize(&self, portfolio_hash: &PortfolioHash) -> Result<Vec<Recommendation>, DomainError> {
        let best = self.tracker.get(portfolio_hash)?.ok_or_else(|| {
            DomainError::NotFound(format!("no best result for {portfolio_hash}"))
        })?;
        let recs: Vec<Recommendation> = best
            .plan
            .steps
            .iter()
            .map(|step| Recommendation::from_step(&best, step))
            .collect();
        let replaced = self.repo.replace_pending(&recs)?;
        info!(
            portfolio_hash = %portfolio_hash.short(),
            sequence_hash = %best.sequence_hash.short(),
            created = recs.len(),
            replaced,
            "recommendations materialized"
        );
        Ok(recs)
    }

    pub fn list(
        &self,
        status: Option<RecommendationStatus>,
        limit: Option<usize>,
    ) -> Result<Vec<Recommendation>, DomainError> {
        self.repo.list(&RecommendationFilter { status, limit })
    }

    pub fn set_status(&self, id: &str, status: RecommendationStatus) -> Result<(), DomainError> {
        self.repo.set_status(id, status)
    }
}
