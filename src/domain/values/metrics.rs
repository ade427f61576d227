//! Portfolio-level metrics recomputed after every simulated step.
//!
//! All values are in the base currency. Weights are fractions of total value
//! (positions plus cash) except for diversification, which only looks at the
//! invested part.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioMetrics {
    pub total_value: f64,
    pub cash_value: f64,
    pub invested_value: f64,
    /// `1 - HHI` over invested position weights; 0 when nothing is held.
    pub diversification: f64,
    /// Invested share of total value.
    pub cash_utilization: f64,
    /// `1 - ½·Σ|w - target|`; 1.0 when no targets are set.
    pub target_alignment: f64,
    /// 1.0 while the largest position stays under the concentration limit.
    pub risk: f64,
    pub largest_weight: f64,
    /// Symbols whose weight exceeds the concentration limit.
    pub over_limit: Vec<String>,
}

impl PortfolioMetrics {
    pub fn compute(
        position_values: &BTreeMap<String, f64>,
        cash_value: f64,
        targets: &BTreeMap<String, f64>,
        concentration_limit: f64,
    ) -> Self {
        let invested_value: f64 = position_values.values().map(|v| v.max(0.0)).sum();
        let total_value = invested_value + cash_value;

        let diversification = if invested_value > 0.0 {
            let hhi: f64 = position_values
                .values()
                .map(|v| {
                    let w = v.max(0.0) / invested_value;
                    w * w
                })
                .sum();
            (1.0 - hhi).max(0.0)
        } else {
            0.0
        };

        let weight_of = |symbol: &str| -> f64 {
            if total_value > 0.0 {
                position_values.get(symbol).copied().unwrap_or(0.0).max(0.0) / total_value
            } else {
                0.0
            }
        };

        let target_alignment = if targets.is_empty() || total_value <= 0.0 {
            1.0
        } else {
            let mut deviation = 0.0;
            for (symbol, target) in targets {
                deviation += (weight_of(symbol) - target).abs();
            }
            for symbol in position_values.keys() {
                if !targets.contains_key(symbol) {
                    deviation += weight_of(symbol);
                }
            }
            (1.0 - 0.5 * deviation).clamp(0.0, 1.0)
        };

        let mut largest_weight: f64 = 0.0;
        let mut over_limit = Vec::new();
        for symbol in position_values.keys() {
            let w = weight_of(symbol);
            largest_weight = largest_weight.max(w);
            if w > concentration_limit {
                over_limit.push(symbol.clone());
            }
        }

        let risk = if largest_weight <= concentration_limit || concentration_limit >= 1.0 {
            1.0
        } else {
            (1.0 - (largest_weight - concentration_limit) / (1.0 - concentration_limit))
                .clamp(0.0, 1.0)
        };

        let cash_utilization = if total_value > 0.0 {
            invested_value / total_value
        } else {
            0.0
        };

        Self {
            total_value,
            cash_value,
            invested_value,
            diversification,
            cash_utilization,
            target_alignment,
            risk,
            largest_weight,
            over_limit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(pairs: &[(&str, f64)]) -> BTreeMap<String, f64> {
        pairs.iter().map(|(s, v)| (s.to_string(), *v)).collect()
    }

    #[test]
    fn test_empty_portfolio() {
        let m = PortfolioMetrics::compute(&BTreeMap::new(), 0.0, &BTreeMap::new(), 0.35);
        assert_eq!(m.total_value, 0.0);
        assert_eq!(m.diversification, 0.0);
        assert_eq!(m.cash_utilization, 0.0);
        assert_eq!(m.target_alignment, 1.0);
        assert_eq!(m.risk, 1.0);
    }

    #[test]
    fn test_single_position_is_undiversified() {
        let m = PortfolioMetrics::compute(&values(&[("AAPL", 1000.0)]), 0.0, &BTreeMap::new(), 0.35);
        assert_eq!(m.diversification, 0.0);
        assert_eq!(m.largest_weight, 1.0);
        assert_eq!(m.risk, 0.0);
        assert_eq!(m.over_limit, vec!["AAPL".to_string()]);
    }

    #[test]
    fn test_equal_weights_diversification() {
        let m = PortfolioMetrics::compute(
            &values(&[("A", 250.0), ("B", 250.0), ("C", 250.0), ("D", 250.0)]),
            0.0,
            &BTreeMap::new(),
            0.35,
        );
        assert!((m.diversification - 0.75).abs() < 1e-12);
        assert_eq!(m.risk, 1.0);
        assert!(m.over_limit.is_empty());
    }

    #[test]
    fn test_cash_utilization_and_alignment() {
        let targets = values(&[("A", 0.5), ("B", 0.5)]);
        let m = PortfolioMetrics::compute(&values(&[("A", 500.0)]), 500.0, &targets, 0.6);
        assert!((m.cash_utilization - 0.5).abs() < 1e-12);
        // A on target, B missing 0.5 → deviation 0.5 → alignment 0.75
        assert!((m.target_alignment - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_untargeted_holdings_count_as_deviation() {
        let targets = values(&[("A", 1.0)]);
        let m = PortfolioMetrics::compute(&values(&[("A", 500.0), ("Z", 500.0)]), 0.0, &targets, 1.0);
        assert!((m.target_alignment - 0.5).abs() < 1e-12);
    }
}
