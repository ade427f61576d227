//! Applying an action sequence to a private working copy of a portfolio.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::entities::action_sequence::ActionCandidate;
use crate::domain::entities::portfolio_state::PortfolioState;
use crate::domain::error::SimulationError;
use crate::domain::values::metrics::PortfolioMetrics;
use crate::domain::values::planner_config::FeeSchedule;
use crate::domain::values::side::Side;

/// Tolerance for float noise when checking cash and position sufficiency.
const EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimPosition {
    pub quantity: f64,
    pub currency: String,
    pub price: f64,
}

/// Metrics snapshot taken after one applied leg.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepMetrics {
    pub step: usize,
    pub fee: f64,
    pub cash_value: f64,
    pub total_value: f64,
    pub diversification: f64,
}

/// Outcome of a successful simulation, handed to the scoring function.
#[derive(Debug, Clone)]
pub struct SimulatedState {
    pub actions: Vec<ActionCandidate>,
    pub positions: BTreeMap<String, SimPosition>,
    pub cash: BTreeMap<String, f64>,
    pub fees_paid: f64,
    pub initial_value: f64,
    pub metrics: PortfolioMetrics,
    pub trajectory: Vec<StepMetrics>,
}

impl SimulatedState {
    pub fn end_positions(&self) -> BTreeMap<String, f64> {
        self.positions
            .iter()
            .map(|(s, p)| (s.clone(), p.quantity))
            .collect()
    }
}

/// Working copy of a portfolio. Each evaluation builds its own.
pub struct SimulatedPortfolio<'a> {
    state: &'a PortfolioState,
    targets: BTreeMap<String, f64>,
    concentration_limit: f64,
    positions: BTreeMap<String, SimPosition>,
    cash: BTreeMap<String, f64>,
    fees_paid: f64,
}

impl<'a> SimulatedPortfolio<'a> {
    pub fn new(state: &'a PortfolioState, concentration_limit: f64) -> Self {
        let positions = state
            .holdings
            .iter()
            .filter(|h| h.quantity > 0.0)
            .map(|h| {
                (
                    h.symbol.clone(),
                    SimPosition {
                        quantity: h.quantity,
                        currency: h.currency.clone(),
                        price: h.price,
                    },
                )
            })
            .collect();
        let cash = state
            .cash
            .iter()
            .map(|c| (c.currency.clone(), c.amount))
            .collect();
        Self {
            state,
            targets: state.target_weights(),
            concentration_limit,
            positions,
            cash,
            fees_paid: 0.0,
        }
    }

    fn currency_for(&self, action: &ActionCandidate) -> String {
        action
            .currency
            .clone()
            .or_else(|| self.positions.get(&action.symbol).map(|p| p.currency.clone()))
            .unwrap_or_else(|| self.state.base_currency.clone())
    }

    /// Apply one leg. Returns the fee charged.
    pub fn apply(
        &mut self,
        step: usize,
        action: &ActionCandidate,
        fees: &FeeSchedule,
    ) -> Result<f64, SimulationError> {
        if action.quantity <= 0.0 || action.price <= 0.0 {
            return Err(SimulationError::InvalidAction {
                step,
                reason: format!("{} {} has non-positive size or price", action.side, action.symbol),
            });
        }

        let currency = self.currency_for(action);
        if let Some(existing) = self.positions.get(&action.symbol) {
            if existing.currency != currency {
                return Err(SimulationError::InvalidAction {
                    step,
                    reason: format!(
                        "{} is held in {} but action trades in {}",
                        action.symbol, existing.currency, currency
                    ),
                });
            }
        }

        let notional = action.notional();
        let fee = fees.fee_for(notional);
        let available = self.cash.get(&currency).copied().unwrap_or(0.0);

        match action.side {
            Side::Buy => {
                let required = notional + fee;
                if required > available + EPSILON {
                    return Err(SimulationError::InsufficientCash {
                        symbol: action.symbol.clone(),
                        currency,
                        required,
                        available,
                    });
                }
                self.cash.insert(currency.clone(), available - required);
                let pos = self
                    .positions
                    .entry(action.symbol.clone())
                    .or_insert_with(|| SimPosition {
                        quantity: 0.0,
                        currency,
                        price: action.price,
                    });
                pos.quantity += action.quantity;
                pos.price = action.price;
            }
            Side::Sell => {
                let held = self
                    .positions
                    .get(&action.symbol)
                    .map(|p| p.quantity)
                    .unwrap_or(0.0);
                if action.quantity > held + EPSILON {
                    return Err(SimulationError::InsufficientPosition {
                        symbol: action.symbol.clone(),
                        requested: action.quantity,
                        held,
                    });
                }
                let proceeds = notional - fee;
                if available + proceeds < -EPSILON {
                    return Err(SimulationError::InsufficientCash {
                        symbol: action.symbol.clone(),
                        currency,
                        required: fee,
                        available: available + notional,
                    });
                }
                self.cash.insert(currency, available + proceeds);
                let remaining = held - action.quantity;
                if remaining <= EPSILON {
                    self.positions.remove(&action.symbol);
                } else if let Some(pos) = self.positions.get_mut(&action.symbol) {
                    pos.quantity = remaining;
                    pos.price = action.price;
                }
            }
        }

        self.fees_paid += fee;
        Ok(fee)
    }

    pub fn metrics(&self) -> PortfolioMetrics {
        let position_values: BTreeMap<String, f64> = self
            .positions
            .iter()
            .map(|(s, p)| (s.clone(), p.quantity * p.price * self.state.fx_rate(&p.currency)))
            .collect();
        let cash_value: f64 = self
            .cash
            .iter()
            .map(|(c, amount)| amount * self.state.fx_rate(c))
            .sum();
        PortfolioMetrics::compute(
            &position_values,
            cash_value,
            &self.targets,
            self.concentration_limit,
        )
    }

    /// Apply every action in order, recording metrics after each step.
    pub fn run(
        mut self,
        actions: &[ActionCandidate],
        fees: &FeeSchedule,
    ) -> Result<SimulatedState, SimulationError> {
        let initial_value = self.metrics().total_value;
        let mut trajectory = Vec::with_capacity(actions.len());
        for (step, action) in actions.iter().enumerate() {
            let fee = self.apply(step, action, fees)?;
            let m = self.metrics();
            trajectory.push(StepMetrics {
                step,
                fee,
                cash_value: m.cash_value,
                total_value: m.total_value,
                diversification: m.diversification,
            });
        }
        let metrics = self.metrics();
        Ok(SimulatedState {
            actions: actions.to_vec(),
            positions: self.positions,
            cash: self.cash,
            fees_paid: self.fees_paid,
            initial_value,
            metrics,
            trajectory,
        })
    }
}

/// Simulate `actions` against a fresh copy of `state`.
pub fn simulate(
    state: &PortfolioState,
    actions: &[ActionCandidate],
    fees: &FeeSchedule,
    concentration_limit: f64,
) -> Result<SimulatedState, SimulationError> {
    SimulatedPortfolio::new(state, concentration_limit).run(actions, fees)
}
