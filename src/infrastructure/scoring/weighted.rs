//! Default scoring function: a fixed weighted sum of portfolio metrics.

use crate::domain::entities::evaluation::ScoreBreakdown;
use crate::domain::entities::simulation::SimulatedState;
use crate::domain::ports::scoring::{ScoreOutcome, ScoringFunction};
use crate::domain::values::planner_config::ScoreWeights;

pub struct WeightedScorer {
    weights: ScoreWeights,
}

impl WeightedScorer {
    pub fn new(weights: ScoreWeights) -> Self {
        Self { weights }
    }
}

impl Default for WeightedScorer {
    fn default() -> Self {
        Self::new(ScoreWeights::default())
    }
}

impl ScoringFunction for WeightedScorer {
    fn name(&self) -> &str {
        "weighted"
    }

    fn score(&self, state: &SimulatedState) -> ScoreOutcome {
        let m = &state.metrics;
        let w = &self.weights;

        let opportunity = if state.actions.is_empty() {
            0.0
        } else {
            let sum: f64 = state.actions.iter().map(|a| a.opportunity_score).sum();
            (sum / state.actions.len() as f64).clamp(0.0, 1.0)
        };
        let fee_drag = if m.total_value > 0.0 {
            state.fees_paid / m.total_value
        } else {
            0.0
        };

        let mut breakdown = ScoreBreakdown::new();
        breakdown.insert("diversification".into(), m.diversification);
        breakdown.insert("cash_utilization".into(), m.cash_utilization);
        breakdown.insert("target_alignment".into(), m.target_alignment);
        breakdown.insert("risk".into(), m.risk);
        breakdown.insert("opportunity".into(), opportunity);
        breakdown.insert("fee_drag".into(), fee_drag);

        let end_score = w.diversification * m.diversification
            + w.cash_utilization * m.cash_utilization
            + w.target_alignment * m.target_alignment
            + w.risk * m.risk
            + w.opportunity * opportunity
            - w.fee_penalty * fee_drag;

        ScoreOutcome {
            end_score,
            breakdown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::action_sequence::ActionCandidate;
    use crate::domain::entities::portfolio_state::{CashBalance, Holding, PortfolioState};
    use crate::domain::entities::simulation::simulate;
    use crate::domain::values::planner_config::FeeSchedule;
    use crate::domain::values::side::Side;

    fn state() -> PortfolioState {
        PortfolioState {
            holdings: vec![Holding {
                symbol: "AAPL".into(),
                quantity: 10.0,
                currency: "EUR".into(),
                price: 100.0,
            }],
            cash: vec![CashBalance {
                currency: "EUR".into(),
                amount: 2000.0,
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_breakdown_has_every_component() {
        let actions = vec![ActionCandidate::new("MSFT", Side::Buy, 2.0, 400.0, 0.7)];
        let sim = simulate(&state(), &actions, &FeeSchedule::default(), 0.35).unwrap();
        let out = WeightedScorer::default().score(&sim);
        for key in [
            "diversification",
            "cash_utilization",
            "target_alignment",
            "risk",
            "opportunity",
            "fee_drag",
        ] {
            assert!(out.breakdown.contains_key(key), "missing {key}");
        }
        assert!((out.breakdown["opportunity"] - 0.7).abs() < 1e-12);
    }

    #[test]
    fn test_diversifying_buy_beats_doing_nothing_useful() {
        let scorer = WeightedScorer::default();
        let fees = FeeSchedule::default();

        let diversify = vec![ActionCandidate::new("MSFT", Side::Buy, 2.0, 400.0, 0.5)];
        let concentrate = vec![ActionCandidate::new("AAPL", Side::Buy, 8.0, 100.0, 0.5)];

        let a = scorer.score(&simulate(&state(), &diversify, &fees, 0.35).unwrap());
        let b = scorer.score(&simulate(&state(), &concentrate, &fees, 0.35).unwrap());
        assert!(a.end_score > b.end_score);
    }

    #[test]
    fn test_scoring_is_pure() {
        let actions = vec![ActionCandidate::new("MSFT", Side::Buy, 1.0, 400.0, 0.4)];
        let sim = simulate(&state(), &actions, &FeeSchedule::default(), 0.35).unwrap();
        let scorer = WeightedScorer::default();
        assert_eq!(scorer.score(&sim), scorer.score(&sim));
    }
}
