use crate::domain::entities::action_sequence::ActionSequence;
use crate::domain::entities::best_result::{BestResult, Plan};
use crate::domain::entities::evaluation::EvaluationResult;
use crate::domain::error::DomainError;
use crate::domain::ports::best_result_repository::BestResultRepository;
use crate::domain::values::content_hash::PortfolioHash;
use chrono::Utc;
use std::sync::Arc;
use tracing::info;

/// Keeps the highest-scoring plan per portfolio hash.
pub struct BestResultTracker {
    repo: Arc<dyn BestResultRepository>,
}

impl BestResultTracker {
    pub fn new(repo: Arc<dyn BestResultRepository>) -> Self {
        Self { repo }
    }

    /// Replace the stored best result only if `evaluation` scores strictly
    /// higher. Invalid evaluations are never eligible.
    pub fn upsert_if_better(
        &self,
        sequence: &ActionSequence,
        evaluation: &EvaluationResult,
    ) -> Result<bool, DomainError> {
        if !evaluation.valid || !evaluation.end_score.is_finite() {
            return Ok(false);
        }
        if sequence.sequence_hash != evaluation.sequence_hash
            || sequence.portfolio_hash != evaluation.portfolio_hash
        {
            return Err(DomainError::InvalidInput(format!(
                "evaluation {} does not belong to sequence {}",
                evaluation.sequence_hash.short(),
                sequence.sequence_hash.short()
            )));
        }

        let now = Utc::now();
        let best = BestResult {
            portfolio_hash: evaluation.portfolio_hash.clone(),
            sequence_hash: evaluation.sequence_hash.clone(),
            plan: Plan::derive(sequence, evaluation),
            score: evaluation.end_score,
            created_at: now,
            updated_at: now,
        };
        let improved = self.repo.upsert_if_better(&best)?;
        if improved {
            info!(
                portfolio_hash = %best.portfolio_hash.short(),
                sequence_hash = %best.sequence_hash.short(),
                score = best.score,
                "best result improved"
            );
        }
        Ok(improved)
    }

    pub fn get(&self, portfolio_hash: &PortfolioHash) -> Result<Option<BestResult>, DomainError> {
        self.repo.get(portfolio_hash)
    }

    pub fn reset(&self, portfolio_hash: &PortfolioHash) -> Result<bool, DomainError> {
        let removed = self.repo.reset(portfolio_hash)?;
        if removed {
            info!(portfolio_hash = %portfolio_hash.short(), "best result reset");
        }
        Ok(removed)
    }
}
