//! Shared test helpers.
#![allow(dead_code)]

use async_trait::async_trait;
use portplan::domain::entities::action_sequence::ActionCandidate;
use portplan::domain::entities::portfolio_state::{CashBalance, Holding, PortfolioState};
use portplan::domain::error::DomainError;
use portplan::domain::ports::opportunity_source::OpportunitySource;
use portplan::domain::values::planner_config::PlannerConfig;
use portplan::domain::values::side::Side;
use portplan::infrastructure::scoring::weighted::WeightedScorer;
use portplan::infrastructure::sources::static_source::StaticSource;
use portplan::PortPlan;
use std::sync::Arc;
use std::time::Duration;

/// No planning interval so every test cycle runs.
pub fn config() -> PlannerConfig {
    PlannerConfig {
        min_planning_interval: Duration::ZERO,
        cycle_budget: Duration::from_secs(30),
        ..PlannerConfig::default()
    }
}

pub fn setup_with(
    db_path: &str,
    candidates: Vec<ActionCandidate>,
    config: PlannerConfig,
) -> PortPlan {
    PortPlan::with_providers(
        db_path,
        Arc::new(StaticSource::new(candidates)),
        Arc::new(WeightedScorer::new(config.weights)),
        config,
    )
    .unwrap()
}

pub fn setup(candidates: Vec<ActionCandidate>) -> PortPlan {
    setup_with(":memory:", candidates, config())
}

pub fn holding(symbol: &str, quantity: f64, price: f64) -> Holding {
    Holding {
        symbol: symbol.into(),
        quantity,
        currency: "EUR".into(),
        price,
    }
}

pub fn eur(amount: f64) -> CashBalance {
    CashBalance {
        currency: "EUR".into(),
        amount,
    }
}

/// 5 MSFT at 400 plus some EUR cash.
pub fn msft_state(cash: f64) -> PortfolioState {
    PortfolioState {
        holdings: vec![holding("MSFT", 5.0, 400.0)],
        cash: vec![eur(cash)],
        ..Default::default()
    }
}

/// BUY AAPL ×10 (score 0.8) and SELL MSFT ×5 (score 0.6).
pub fn aapl_msft() -> Vec<ActionCandidate> {
    vec![
        ActionCandidate::new("AAPL", Side::Buy, 10.0, 150.0, 0.8),
        ActionCandidate::new("MSFT", Side::Sell, 5.0, 400.0, 0.6),
    ]
}

/// Source that always fails, for failed-cycle paths.
pub struct BrokenSource;

#[async_trait]
impl OpportunitySource for BrokenSource {
    fn name(&self) -> &str {
        "broken"
    }

    async fn candidate_actions(
        &self,
        _state: &PortfolioState,
    ) -> Result<Vec<ActionCandidate>, DomainError> {
        Err(DomainError::Source("broker unreachable".into()))
    }
}
