//! Candidates derived from allocation drift.
//!
//! Compares each position's weight with its target and proposes the trade
//! that would close the gap. Held symbols without a target are treated as
//! target 0 and become sell candidates.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::domain::entities::action_sequence::ActionCandidate;
use crate::domain::entities::portfolio_state::PortfolioState;
use crate::domain::error::DomainError;
use crate::domain::ports::opportunity_source::OpportunitySource;
use crate::domain::values::side::Side;

/// Price for a symbol that is targeted but not held yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub price: f64,
    pub currency: String,
}

pub struct TargetDriftSource {
    quotes: BTreeMap<String, Quote>,
    /// Minimum absolute weight gap before a trade is proposed.
    min_drift: f64,
    fractional: bool,
}

impl TargetDriftSource {
    pub fn new(quotes: BTreeMap<String, Quote>) -> Self {
        Self {
            quotes,
            min_drift: 0.02,
            fractional: false,
        }
    }

    pub fn with_min_drift(mut self, min_drift: f64) -> Self {
        self.min_drift = min_drift.max(0.0);
        self
    }

    pub fn with_fractional(mut self, fractional: bool) -> Self {
        self.fractional = fractional;
        self
    }

    fn drift_candidates(&self, state: &PortfolioState) -> Vec<ActionCandidate> {
        let total = state.total_value();
        if total <= 0.0 {
            return Vec::new();
        }
        let targets = state.target_weights();
        let symbols: BTreeSet<&str> = targets
            .keys()
            .map(String::as_str)
            .chain(state.holdings.iter().map(|h| h.symbol.as_str()))
            .collect();

        let mut out = Vec::new();
        for symbol in symbols {
            let holding = state.holding(symbol);
            let (price, currency) = match (holding, self.quotes.get(symbol)) {
                (Some(h), _) if h.price > 0.0 => (h.price, h.currency.clone()),
                (_, Some(q)) if q.price > 0.0 => (q.price, q.currency.clone()),
                _ => {
                    tracing::debug!(symbol, "no price for drift candidate, skipping");
                    continue;
                }
            };
            let fx = state.fx_rate(&currency);
            let held_qty = holding.map(|h| h.quantity).unwrap_or(0.0);
            let weight = held_qty * price * fx / total;
            let target = targets.get(symbol).copied().unwrap_or(0.0);
            let drift = target - weight;
            if drift.abs() < self.min_drift {
                continue;
            }

            let mut quantity = drift.abs() * total / (price * fx);
            if !self.fractional {
                // absorb float noise such as 11.999999999 before flooring
                quantity = (quantity + 1e-9).floor();
            }
            let side = if drift > 0.0 { Side::Buy } else { Side::Sell };
            if side == Side::Sell {
                quantity = quantity.min(held_qty);
            }
            if quantity <= 0.0 {
                continue;
            }

            let score = (drift.abs() / target.max(weight).max(f64::EPSILON)).clamp(0.0, 1.0);
            out.push(ActionCandidate::new(symbol, side, quantity, price, score).with_currency(currency));
        }

        out.sort_by(|a, b| {
            b.opportunity_score
                .partial_cmp(&a.opportunity_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.symbol.cmp(&b.symbol))
        });
        out
    }
}

#[async_trait]
impl OpportunitySource for TargetDriftSource {
    fn name(&self) -> &str {
        "target_drift"
    }

    async fn candidate_actions(
        &self,
        state: &PortfolioState,
    ) -> Result<Vec<ActionCandidate>, DomainError> {
        Ok(self.drift_candidates(state))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::portfolio_state::{AllocationTarget, CashBalance, Holding};

    fn state() -> PortfolioState {
        PortfolioState {
            holdings: vec![
                Holding {
                    symbol: "AAPL".into(),
                    quantity: 10.0,
                    currency: "EUR".into(),
                    price: 100.0,
                },
                Holding {
                    symbol: "OLD".into(),
                    quantity: 5.0,
                    currency: "EUR".into(),
                    price: 20.0,
                },
            ],
            cash: vec![CashBalance {
                currency: "EUR".into(),
                amount: 900.0,
            }],
            targets: vec![
                AllocationTarget {
                    symbol: "AAPL".into(),
                    weight: 0.5,
                },
                AllocationTarget {
                    symbol: "MSFT".into(),
                    weight: 0.3,
                },
            ],
            ..Default::default()
        }
    }

    #[test]
    fn test_drift_produces_buys_and_sells() {
        let mut quotes = BTreeMap::new();
        quotes.insert(
            "MSFT".to_string(),
            Quote {
                price: 50.0,
                currency: "EUR".into(),
            },
        );
        // total = 1000 + 100 + 900 = 2000
        let cands = TargetDriftSource::new(quotes).drift_candidates(&state());

        // AAPL sits exactly on its 50% target
        assert!(cands.iter().all(|c| c.symbol != "AAPL"));

        let msft = cands.iter().find(|c| c.symbol == "MSFT").unwrap();
        assert_eq!(msft.side, Side::Buy);
        assert_eq!(msft.quantity, 12.0);
        assert_eq!(msft.opportunity_score, 1.0);

        let old = cands.iter().find(|c| c.symbol == "OLD").unwrap();
        assert_eq!(old.side, Side::Sell);
        assert_eq!(old.quantity, 5.0);

        // ranked by score
        assert_eq!(cands[0].opportunity_score, 1.0);
    }

    #[test]
    fn test_min_drift_and_fractional_quantities() {
        let mut quotes = BTreeMap::new();
        quotes.insert(
            "MSFT".to_string(),
            Quote {
                price: 70.0,
                currency: "EUR".into(),
            },
        );

        let whole = TargetDriftSource::new(quotes.clone()).drift_candidates(&state());
        // 0.3 * 2000 / 70 = 8.57
        assert_eq!(whole.iter().find(|c| c.symbol == "MSFT").unwrap().quantity, 8.0);

        let cands = TargetDriftSource::new(quotes)
            .with_min_drift(0.1)
            .with_fractional(true)
            .drift_candidates(&state());
        // OLD is 5% off target, under the threshold
        assert!(cands.iter().all(|c| c.symbol != "OLD"));
        let msft = cands.iter().find(|c| c.symbol == "MSFT").unwrap();
        assert!((msft.quantity - 600.0 / 70.0).abs() < 1e-9);
    }

    #[test]
    fn test_symbols_without_price_are_skipped() {
        let cands = TargetDriftSource::new(BTreeMap::new()).drift_candidates(&state());
        assert!(cands.iter().all(|c| c.symbol != "MSFT"));
    }

    #[test]
    fn test_empty_portfolio_yields_nothing() {
        let cands = TargetDriftSource::new(BTreeMap::new()).drift_candidates(&PortfolioState::default());
        assert!(cands.is_empty());
    }
}
