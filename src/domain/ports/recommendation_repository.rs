use crate::domain::entities::recommendation::Recommendation;
use crate::domain::error::DomainError;
use crate::domain::values::recommendation_status::RecommendationStatus;

#[derive(Debug, Clone, Default)]
pub struct RecommendationFilter {
    pub status: Option<RecommendationStatus>,
    pub limit: Option<usize>,
}

pub trait RecommendationRepository: Send + Sync {
    /// Atomically drop every pending recommendation and insert `recs`.
    /// Executed and dismissed rows are kept as history. Returns the number
    /// of pending rows dropped.
    fn replace_pending(&self, recs: &[Recommendation]) -> Result<usize, DomainError>;

    fn list(&self, filter: &RecommendationFilter) -> Result<Vec<Recommendation>, DomainError>;

    fn set_status(&self, id: &str, status: RecommendationStatus) -> Result<(), DomainError>;
}
