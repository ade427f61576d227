use crate::domain::error::DomainError;
use crate::domain::values::content_hash::{canonical_f64, PortfolioHash, SequenceHash};
use crate::domain::values::pattern_type::PatternType;
use crate::domain::values::side::Side;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single proposed buy/sell primitive produced by an opportunity source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionCandidate {
    pub symbol: String,
    pub side: Side,
    pub quantity: f64,
    /// Estimated unit price in the action's currency.
    pub price: f64,
    pub opportunity_score: f64,
    /// Falls back to the holding's currency, then the base currency.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
}

impl ActionCandidate {
    pub fn new(symbol: impl Into<String>, side: Side, quantity: f64, price: f64, score: f64) -> Self {
        Self {
            symbol: symbol.into(),
            side,
            quantity,
            price,
            opportunity_score: score,
            currency: None,
        }
    }

    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = Some(currency.into());
        self
    }

    pub fn notional(&self) -> f64 {
        self.quantity * self.price
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        if self.symbol.trim().is_empty() {
            return Err(DomainError::InvalidInput("candidate with empty symbol".into()));
        }
        if !self.quantity.is_finite() || self.quantity <= 0.0 {
            return Err(DomainError::InvalidInput(format!(
                "candidate {} {} has invalid quantity {}",
                self.side, self.symbol, self.quantity
            )));
        }
        if !self.price.is_finite() || self.price <= 0.0 {
            return Err(DomainError::InvalidInput(format!(
                "candidate {} {} has invalid price {}",
                self.side, self.symbol, self.price
            )));
        }
        if !self.opportunity_score.is_finite() {
            return Err(DomainError::InvalidInput(format!(
                "candidate {} {} has non-finite score",
                self.side, self.symbol
            )));
        }
        Ok(())
    }

    fn canonical_form(&self) -> String {
        format!(
            "{}|{}|{}|{}|{}",
            self.symbol,
            self.side,
            canonical_f64(self.quantity),
            canonical_f64(self.price),
            self.currency.as_deref().unwrap_or("")
        )
    }
}

/// Content hash over the ordered action list. The opportunity score is
/// ranking metadata and does not take part.
pub fn sequence_hash(actions: &[ActionCandidate]) -> SequenceHash {
    let body: Vec<String> = actions.iter().map(ActionCandidate::canonical_form).collect();
    SequenceHash::digest(&body.join("\n"))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionSequence {
    pub sequence_hash: SequenceHash,
    pub portfolio_hash: PortfolioHash,
    pub actions: Vec<ActionCandidate>,
    pub pattern: PatternType,
    pub depth: usize,
    /// Search-order heuristic: aggregate opportunity score per leg.
    pub priority: f64,
    pub completed: bool,
    pub evaluated_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl ActionSequence {
    pub fn new(portfolio_hash: PortfolioHash, actions: Vec<ActionCandidate>, pattern: PatternType) -> Self {
        let depth = actions.len();
        let aggregate: f64 = actions.iter().map(|a| a.opportunity_score).sum();
        let priority = if depth > 0 { aggregate / depth as f64 } else { 0.0 };
        Self {
            sequence_hash: sequence_hash(&actions),
            portfolio_hash,
            actions,
            pattern,
            depth,
            priority,
            completed: false,
            evaluated_at: None,
            created_at: Utc::now(),
        }
    }

    pub fn aggregate_score(&self) -> f64 {
        self.actions.iter().map(|a| a.opportunity_score).sum()
    }

    /// Search order: priority desc, then depth asc, aggregate desc, hash asc.
    pub fn search_order(a: &Self, b: &Self) -> std::cmp::Ordering {
        b.priority
            .partial_cmp(&a.priority)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.depth.cmp(&b.depth))
            .then_with(|| {
                b.aggregate_score()
                    .partial_cmp(&a.aggregate_score())
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .then_with(|| a.sequence_hash.cmp(&b.sequence_hash))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ph() -> PortfolioHash {
        PortfolioHash::from_hex("p")
    }

    #[test]
    fn test_hash_depends_on_order() {
        let a = ActionCandidate::new("AAPL", Side::Buy, 10.0, 150.0, 0.8);
        let b = ActionCandidate::new("MSFT", Side::Sell, 5.0, 400.0, 0.6);
        assert_ne!(
            sequence_hash(&[a.clone(), b.clone()]),
            sequence_hash(&[b, a])
        );
    }

    #[test]
    fn test_hash_ignores_score() {
        let a = ActionCandidate::new("AAPL", Side::Buy, 10.0, 150.0, 0.8);
        let mut b = a.clone();
        b.opportunity_score = 0.1;
        assert_eq!(sequence_hash(&[a]), sequence_hash(&[b]));
    }

    #[test]
    fn test_priority_favors_shorter_sequences() {
        let strong = ActionCandidate::new("A", Side::Buy, 1.0, 1.0, 0.9);
        let weak = ActionCandidate::new("B", Side::Buy, 1.0, 1.0, 0.3);
        let single = ActionSequence::new(ph(), vec![strong.clone()], PatternType::Single);
        let pair = ActionSequence::new(ph(), vec![strong, weak], PatternType::MultiLegRebalance);
        assert_eq!(single.depth, 1);
        assert!((single.priority - 0.9).abs() < 1e-12);
        assert!((pair.priority - 0.6).abs() < 1e-12);
        assert_eq!(
            ActionSequence::search_order(&single, &pair),
            std::cmp::Ordering::Less
        );
    }

    #[test]
    fn test_search_order_breaks_ties_on_depth() {
        let a = ActionCandidate::new("A", Side::Buy, 1.0, 1.0, 0.5);
        let b = ActionCandidate::new("B", Side::Buy, 1.0, 1.0, 0.5);
        let single = ActionSequence::new(ph(), vec![a.clone()], PatternType::Single);
        let pair = ActionSequence::new(ph(), vec![a, b], PatternType::MultiLegRebalance);
        assert_eq!(single.priority, pair.priority);
        assert_eq!(
            ActionSequence::search_order(&single, &pair),
            std::cmp::Ordering::Less
        );
    }

    #[test]
    fn test_candidate_validation() {
        assert!(ActionCandidate::new("A", Side::Buy, 1.0, 1.0, 0.5).validate().is_ok());
        assert!(ActionCandidate::new("", Side::Buy, 1.0, 1.0, 0.5).validate().is_err());
        assert!(ActionCandidate::new("A", Side::Buy, 0.0, 1.0, 0.5).validate().is_err());
        assert!(ActionCandidate::new("A", Side::Sell, 1.0, -1.0, 0.5).validate().is_err());
        assert!(ActionCandidate::new("A", Side::Sell, 1.0, 1.0, f64::NAN).validate().is_err());
    }
}
