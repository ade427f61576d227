//! Snapshot of holdings, cash and allocation targets.
//!
//! The content hash covers holdings (symbol, quantity, currency), cash
//! balances, targets and the base currency. Market data (last prices and FX
//! rates) is carried alongside for valuation but is not part of the hash.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

use crate::domain::error::DomainError;
use crate::domain::values::content_hash::{canonical_f64, PortfolioHash};

pub const DEFAULT_BASE_CURRENCY: &str = "EUR";

fn default_base_currency() -> String {
    DEFAULT_BASE_CURRENCY.to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    pub symbol: String,
    pub quantity: f64,
    pub currency: String,
    /// Last known unit price in `currency`.
    #[serde(default)]
    pub price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashBalance {
    pub currency: String,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationTarget {
    pub symbol: String,
    /// Target fraction of total portfolio value (0.0 to 1.0).
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioState {
    #[serde(default)]
    pub holdings: Vec<Holding>,
    #[serde(default)]
    pub cash: Vec<CashBalance>,
    #[serde(default)]
    pub targets: Vec<AllocationTarget>,
    #[serde(default = "default_base_currency")]
    pub base_currency: String,
    /// Units of base currency per unit of the keyed currency. Missing → 1.0.
    #[serde(default)]
    pub fx_rates: BTreeMap<String, f64>,
}

impl Default for PortfolioState {
    fn default() -> Self {
        Self {
            holdings: Vec::new(),
            cash: Vec::new(),
            targets: Vec::new(),
            base_currency: default_base_currency(),
            fx_rates: BTreeMap::new(),
        }
    }
}

impl PortfolioState {
    /// Reject malformed state before it is hashed or planned against.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.base_currency.trim().is_empty() {
            return Err(DomainError::InvalidInput("base currency is empty".into()));
        }

        let mut seen = HashSet::new();
        for h in &self.holdings {
            if h.symbol.trim().is_empty() {
                return Err(DomainError::InvalidInput("holding with empty symbol".into()));
            }
            if h.currency.trim().is_empty() {
                return Err(DomainError::InvalidInput(format!(
                    "holding {} has no currency",
                    h.symbol
                )));
            }
            if !h.quantity.is_finite() || h.quantity < 0.0 {
                return Err(DomainError::InvalidInput(format!(
                    "holding {} has invalid quantity {}",
                    h.symbol, h.quantity
                )));
            }
            if !h.price.is_finite() || h.price < 0.0 {
                return Err(DomainError::InvalidInput(format!(
                    "holding {} has invalid price {}",
                    h.symbol, h.price
                )));
            }
            if !seen.insert(h.symbol.as_str()) {
                return Err(DomainError::InvalidInput(format!(
                    "duplicate holding {}",
                    h.symbol
                )));
            }
        }

        let mut currencies = HashSet::new();
        for c in &self.cash {
            if c.currency.trim().is_empty() {
                return Err(DomainError::InvalidInput("cash balance with empty currency".into()));
            }
            if !c.amount.is_finite() || c.amount < 0.0 {
                return Err(DomainError::InvalidInput(format!(
                    "cash balance {} has invalid amount {}",
                    c.currency, c.amount
                )));
            }
            if !currencies.insert(c.currency.as_str()) {
                return Err(DomainError::InvalidInput(format!(
                    "duplicate cash balance {}",
                    c.currency
                )));
            }
        }

        let mut targeted = HashSet::new();
        let mut total_weight = 0.0;
        for t in &self.targets {
            if t.symbol.trim().is_empty() {
                return Err(DomainError::InvalidInput("target with empty symbol".into()));
            }
            if !t.weight.is_finite() || !(0.0..=1.0).contains(&t.weight) {
                return Err(DomainError::InvalidInput(format!(
                    "target {} weight must be between 0.0 and 1.0, got {}",
                    t.symbol, t.weight
                )));
            }
            if !targeted.insert(t.symbol.as_str()) {
                return Err(DomainError::InvalidInput(format!(
                    "duplicate target {}",
                    t.symbol
                )));
            }
            total_weight += t.weight;
        }
        if total_weight > 1.0 + 1e-9 {
            return Err(DomainError::InvalidInput(format!(
                "target weights sum to {total_weight:.4}, above 1.0"
            )));
        }

        for (currency, rate) in &self.fx_rates {
            if !rate.is_finite() || *rate <= 0.0 {
                return Err(DomainError::InvalidInput(format!(
                    "fx rate for {currency} must be positive, got {rate}"
                )));
            }
        }

        Ok(())
    }

    /// Order-independent content hash.
    ///
    /// Zero-quantity holdings and zero cash balances are dropped, since they
    /// describe the same state as their absence.
    pub fn hash(&self) -> PortfolioHash {
        PortfolioHash::digest(&self.canonical_form())
    }

    fn canonical_form(&self) -> String {
        let mut holdings: Vec<&Holding> =
            self.holdings.iter().filter(|h| h.quantity != 0.0).collect();
        holdings.sort_by(|a, b| {
            a.symbol
                .cmp(&b.symbol)
                .then_with(|| a.currency.cmp(&b.currency))
        });

        let mut cash: Vec<&CashBalance> = self.cash.iter().filter(|c| c.amount != 0.0).collect();
        cash.sort_by(|a, b| a.currency.cmp(&b.currency));

        let mut targets: Vec<&AllocationTarget> = self.targets.iter().collect();
        targets.sort_by(|a, b| a.symbol.cmp(&b.symbol));

        let mut out = format!("base={}\n", self.base_currency);
        for h in holdings {
            out.push_str(&format!(
                "h|{}|{}|{}\n",
                h.symbol,
                canonical_f64(h.quantity),
                h.currency
            ));
        }
        for c in cash {
            out.push_str(&format!("c|{}|{}\n", c.currency, canonical_f64(c.amount)));
        }
        for t in targets {
            out.push_str(&format!("t|{}|{}\n", t.symbol, canonical_f64(t.weight)));
        }
        out
    }

    pub fn holding(&self, symbol: &str) -> Option<&Holding> {
        self.holdings.iter().find(|h| h.symbol == symbol)
    }

    pub fn fx_rate(&self, currency: &str) -> f64 {
        if currency == self.base_currency {
            return 1.0;
        }
        self.fx_rates.get(currency).copied().unwrap_or(1.0)
    }

    pub fn target_weights(&self) -> BTreeMap<String, f64> {
        self.targets
            .iter()
            .map(|t| (t.symbol.clone(), t.weight))
            .collect()
    }

    /// Total cash converted to the base currency.
    pub fn cash_value(&self) -> f64 {
        self.cash
            .iter()
            .map(|c| c.amount * self.fx_rate(&c.currency))
            .sum()
    }

    /// Holdings plus cash, in the base currency.
    pub fn total_value(&self) -> f64 {
        let invested: f64 = self
            .holdings
            .iter()
            .map(|h| h.quantity * h.price * self.fx_rate(&h.currency))
            .sum();
        invested + self.cash_value()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn holding(symbol: &str, qty: f64) -> Holding {
        Holding {
            symbol: symbol.into(),
            quantity: qty,
            currency: "EUR".into(),
            price: 10.0,
        }
    }

    fn state() -> PortfolioState {
        PortfolioState {
            holdings: vec![holding("AAPL", 10.0), holding("MSFT", 5.0)],
            cash: vec![
                CashBalance {
                    currency: "EUR".into(),
                    amount: 1000.0,
                },
                CashBalance {
                    currency: "USD".into(),
                    amount: 50.0,
                },
            ],
            targets: vec![
                AllocationTarget {
                    symbol: "AAPL".into(),
                    weight: 0.4,
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
    fn test_hash_is_order_independent() {
        let a = state();
        let mut b = state();
        b.holdings.reverse();
        b.cash.reverse();
        b.targets.reverse();
        assert_eq!(a.hash(), b.hash());
    }

    #[test]
    fn test_hash_ignores_market_data() {
        let a = state();
        let mut b = state();
        b.holdings[0].price = 999.0;
        b.fx_rates.insert("USD".into(), 0.9);
        assert_eq!(a.hash(), b.hash());
    }

    #[test]
    fn test_hash_changes_with_content() {
        let a = state();

        let mut qty = state();
        qty.holdings[1].quantity = 6.0;
        assert_ne!(a.hash(), qty.hash());

        let mut cash = state();
        cash.cash[0].amount = 999.0;
        assert_ne!(a.hash(), cash.hash());

        let mut target = state();
        target.targets[0].weight = 0.5;
        assert_ne!(a.hash(), target.hash());
    }

    #[test]
    fn test_zero_entries_do_not_change_hash() {
        let a = state();
        let mut b = state();
        b.holdings.push(holding("TSLA", 0.0));
        b.cash.push(CashBalance {
            currency: "GBP".into(),
            amount: 0.0,
        });
        assert_eq!(a.hash(), b.hash());
    }

    #[test]
    fn test_validate_rejects_malformed() {
        assert!(state().validate().is_ok());

        let mut dup = state();
        dup.holdings.push(holding("AAPL", 1.0));
        assert!(dup.validate().is_err());

        let mut neg = state();
        neg.holdings[0].quantity = -1.0;
        assert!(neg.validate().is_err());

        let mut nan_cash = state();
        nan_cash.cash[0].amount = f64::NAN;
        assert!(nan_cash.validate().is_err());

        let mut heavy = state();
        heavy.targets[0].weight = 0.9;
        assert!(heavy.validate().is_err());

        let mut fx = state();
        fx.fx_rates.insert("USD".into(), 0.0);
        assert!(fx.validate().is_err());
    }

    #[test]
    fn test_valuation_uses_fx_rates() {
        let mut s = state();
        s.fx_rates.insert("USD".into(), 0.5);
        assert!((s.cash_value() - 1025.0).abs() < 1e-9);
        assert!((s.total_value() - 1175.0).abs() < 1e-9);
    }
}
