use crate::domain::entities::best_result::{BestResult, PlanStep};
use crate::domain::values::content_hash::{PortfolioHash, SequenceHash};
use crate::domain::values::recommendation_status::RecommendationStatus;
use crate::domain::values::side::Side;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    pub id: String,
    pub portfolio_hash: PortfolioHash,
    pub sequence_hash: SequenceHash,
    pub step_index: usize,
    pub symbol: String,
    pub side: Side,
    pub quantity: f64,
    pub estimated_price: f64,
    pub estimated_value: f64,
    pub currency: Option<String>,
    pub reason: String,
    pub status: RecommendationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Recommendation {
    pub fn from_step(best: &BestResult, step: &PlanStep) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            portfolio_hash: best.portfolio_hash.clone(),
            sequence_hash: best.sequence_hash.clone(),
            step_index: step.index,
            symbol: step.symbol.clone(),
            side: step.side,
            quantity: step.quantity,
            estimated_price: step.estimated_price,
            estimated_value: step.estimated_value,
            currency: step.currency.clone(),
            reason: format!(
                "step {}/{} of {} plan (score {:.4})",
                step.index + 1,
                best.plan.steps.len(),
                best.plan.summary.pattern,
                best.score
            ),
            status: RecommendationStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }
}
