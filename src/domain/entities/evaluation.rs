use crate::domain::entities::simulation::SimulatedState;
use crate::domain::values::content_hash::{PortfolioHash, SequenceHash};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Score recorded for sequences whose simulation failed. Far below anything
/// a real scoring function produces, and never eligible as a best result.
pub const INVALID_SCORE: f64 = -1.0e9;

/// Named component scores contributing to an end score.
pub type ScoreBreakdown = BTreeMap<String, f64>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub sequence_hash: SequenceHash,
    pub portfolio_hash: PortfolioHash,
    pub end_score: f64,
    pub breakdown: ScoreBreakdown,
    /// Cash after the last leg, in the base currency.
    pub end_cash: f64,
    pub end_positions: BTreeMap<String, f64>,
    pub diversification_score: f64,
    pub total_value: f64,
    pub fees_paid: f64,
    pub valid: bool,
    pub error: Option<String>,
    pub evaluated_at: DateTime<Utc>,
}

impl EvaluationResult {
    pub fn from_simulation(
        sequence_hash: SequenceHash,
        portfolio_hash: PortfolioHash,
        sim: &SimulatedState,
        end_score: f64,
        breakdown: ScoreBreakdown,
    ) -> Self {
        Self {
            sequence_hash,
            portfolio_hash,
            end_score,
            breakdown,
            end_cash: sim.metrics.cash_value,
            end_positions: sim.end_positions(),
            diversification_score: sim.metrics.diversification,
            total_value: sim.metrics.total_value,
            fees_paid: sim.fees_paid,
            valid: true,
            error: None,
            evaluated_at: Utc::now(),
        }
    }

    /// Sentinel record for a sequence that could not be applied.
    pub fn invalid(sequence_hash: SequenceHash, portfolio_hash: PortfolioHash, error: String) -> Self {
        Self {
            sequence_hash,
            portfolio_hash,
            end_score: INVALID_SCORE,
            breakdown: ScoreBreakdown::new(),
            end_cash: 0.0,
            end_positions: BTreeMap::new(),
            diversification_score: 0.0,
            total_value: 0.0,
            fees_paid: 0.0,
            valid: false,
            error: Some(error),
            evaluated_at: Utc::now(),
        }
    }
}
