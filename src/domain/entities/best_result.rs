use crate::domain::entities::action_sequence::ActionSequence;
use crate::domain::entities::evaluation::{EvaluationResult, ScoreBreakdown};
use crate::domain::values::content_hash::{PortfolioHash, SequenceHash};
use crate::domain::values::pattern_type::PatternType;
use crate::domain::values::side::Side;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanStep {
    pub index: usize,
    pub symbol: String,
    pub side: Side,
    pub quantity: f64,
    pub estimated_price: f64,
    pub estimated_value: f64,
    pub currency: Option<String>,
    pub opportunity_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanSummary {
    pub pattern: PatternType,
    pub depth: usize,
    pub end_score: f64,
    pub end_cash: f64,
    pub total_value: f64,
    pub diversification_score: f64,
    pub fees_paid: f64,
    pub breakdown: ScoreBreakdown,
}

/// Ordered steps plus the simulated outcome of executing them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub steps: Vec<PlanStep>,
    pub summary: PlanSummary,
}

impl Plan {
    pub fn derive(sequence: &ActionSequence, evaluation: &EvaluationResult) -> Self {
        let steps = sequence
            .actions
            .iter()
            .enumerate()
            .map(|(index, a)| PlanStep {
                index,
                symbol: a.symbol.clone(),
                side: a.side,
                quantity: a.quantity,
                estimated_price: a.price,
                estimated_value: a.notional(),
                currency: a.currency.clone(),
                opportunity_score: a.opportunity_score,
            })
            .collect();
        Self {
            steps,
            summary: PlanSummary {
                pattern: sequence.pattern,
                depth: sequence.depth,
                end_score: evaluation.end_score,
                end_cash: evaluation.end_cash,
                total_value: evaluation.total_value,
                diversification_score: evaluation.diversification_score,
                fees_paid: evaluation.fees_paid,
                breakdown: evaluation.breakdown.clone(),
            },
        }
    }
}

/// Highest-scoring evaluated sequence for one portfolio hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BestResult {
    pub portfolio_hash: PortfolioHash,
    pub sequence_hash: SequenceHash,
    pub plan: Plan,
    pub score: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
