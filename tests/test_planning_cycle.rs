mod common;

use common::*;
use portplan::domain::entities::action_sequence::ActionCandidate;
use portplan::domain::entities::evaluation::INVALID_SCORE;
use portplan::domain::entities::portfolio_state::{AllocationTarget, PortfolioState};
use portplan::domain::error::DomainError;
use portplan::domain::values::cycle_state::{CycleOutcome, CycleState};
use portplan::domain::values::planner_config::PlannerConfig;
use portplan::domain::values::side::Side;
use portplan::infrastructure::scoring::weighted::WeightedScorer;
use portplan::infrastructure::sources::target_drift::{Quote, TargetDriftSource};
use portplan::PortPlan;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

fn max_valid_score(pp: &PortPlan, hash: &portplan::domain::values::content_hash::PortfolioHash) -> f64 {
    pp.list_evaluations(hash)
        .unwrap()
        .iter()
        .filter(|e| e.valid)
        .map(|e| e.end_score)
        .fold(f64::NEG_INFINITY, f64::max)
}

#[tokio::test]
async fn test_sell_then_buy_end_cash_is_fee_adjusted() {
    let pp = setup(aapl_msft());
    let state = msft_state(100.0);
    let hash = pp.portfolio_hash(&state).unwrap();

    let report = pp.force_planning_cycle(&state).await.unwrap();
    assert_eq!(report.outcome, CycleOutcome::Completed);
    assert_eq!(report.candidates, 2);
    assert_eq!(report.inserted, 3);
    assert_eq!(report.pending_count, 0);
    assert_eq!(report.completed_count, 3);

    let pair = pp
        .list_sequences(&hash, Some(true), None)
        .unwrap()
        .into_iter()
        .find(|s| s.depth == 2)
        .expect("a sequence combining both candidates");
    assert_eq!(pair.actions[0].side, Side::Sell);
    assert_eq!(pair.actions[1].symbol, "AAPL");

    let eval = pp.get_evaluation(&pair.sequence_hash, &hash).unwrap().unwrap();
    assert!(eval.valid);
    // 100 + (2000 - 2 - 4) - (1500 + 2 + 3)
    assert!((eval.end_cash - 589.0).abs() < 1e-6);
    assert!((eval.fees_paid - 11.0).abs() < 1e-9);
    assert_eq!(eval.end_positions.get("AAPL"), Some(&10.0));
    assert!(!eval.end_positions.contains_key("MSFT"));
}

#[tokio::test]
async fn test_unaffordable_sequence_is_completed_as_invalid() {
    let pp = setup(aapl_msft());
    let state = msft_state(100.0);
    let hash = pp.portfolio_hash(&state).unwrap();

    let report = pp.force_planning_cycle(&state).await.unwrap();
    // BUY AAPL alone needs 1505 EUR with only 100 available
    assert_eq!(report.failed, 1);
    assert_eq!(report.evaluated, 3);
    assert_eq!(pp.count_pending(&hash).unwrap(), 0);

    let invalid: Vec<_> = pp
        .list_evaluations(&hash)
        .unwrap()
        .into_iter()
        .filter(|e| !e.valid)
        .collect();
    assert_eq!(invalid.len(), 1);
    assert_eq!(invalid[0].end_score, INVALID_SCORE);
    assert!(invalid[0].error.as_deref().unwrap().contains("insufficient"));

    let best = pp.best_result(&hash).unwrap().unwrap();
    assert_ne!(best.sequence_hash, invalid[0].sequence_hash);
}

#[tokio::test]
async fn test_best_result_is_highest_valid_evaluation() {
    let pp = setup(aapl_msft());
    let state = msft_state(100.0);
    let hash = pp.portfolio_hash(&state).unwrap();
    let report = pp.force_planning_cycle(&state).await.unwrap();

    let best = pp.best_result(&hash).unwrap().unwrap();
    assert_eq!(best.score, max_valid_score(&pp, &hash));
    assert_eq!(report.best_score, Some(best.score));
    assert_eq!(best.plan.steps.len(), best.plan.summary.depth);
    assert_eq!(best.plan, pp.best_plan(&hash).unwrap().unwrap());
}

#[tokio::test]
async fn test_rerunning_composition_adds_no_pending_work() {
    let pp = setup(aapl_msft());
    let state = msft_state(100.0);
    let hash = pp.portfolio_hash(&state).unwrap();

    pp.force_planning_cycle(&state).await.unwrap();
    let again = pp.force_planning_cycle(&state).await.unwrap();
    assert_eq!(again.inserted, 0);
    assert_eq!(again.evaluated, 0);
    assert_eq!(pp.count_pending(&hash).unwrap(), 0);
    assert_eq!(pp.count_completed(&hash).unwrap(), 3);
}

#[tokio::test]
async fn test_cycle_within_interval_is_skipped() {
    let cfg = PlannerConfig {
        min_planning_interval: Duration::from_secs(3600),
        ..config()
    };
    let pp = setup_with(":memory:", aapl_msft(), cfg);
    let state = msft_state(100.0);

    let first = pp.run_planning_cycle(&state).await.unwrap();
    assert_eq!(first.outcome, CycleOutcome::Completed);

    let second = pp.run_planning_cycle(&state).await.unwrap();
    assert_eq!(second.outcome, CycleOutcome::Skipped);
    assert_eq!(second.evaluated, 0);
    assert_eq!(second.completed_count, 3);
    assert_eq!(second.best_score, first.best_score);

    // skipped ticks leave no history
    assert_eq!(pp.cycle_history(10).unwrap().len(), 1);

    let forced = pp.force_planning_cycle(&state).await.unwrap();
    assert_eq!(forced.outcome, CycleOutcome::Completed);
}

#[tokio::test]
async fn test_changed_portfolio_drops_stale_search_state() {
    let pp = setup(aapl_msft());
    let before = msft_state(100.0);
    let after = msft_state(250.0);
    let old_hash = pp.portfolio_hash(&before).unwrap();
    let new_hash = pp.portfolio_hash(&after).unwrap();
    assert_ne!(old_hash, new_hash);

    pp.force_planning_cycle(&before).await.unwrap();
    let report = pp.force_planning_cycle(&after).await.unwrap();

    assert_eq!(report.inserted, 3);
    assert_eq!(pp.count_pending(&old_hash).unwrap(), 0);
    assert_eq!(pp.count_completed(&old_hash).unwrap(), 0);
    assert!(pp.list_evaluations(&old_hash).unwrap().is_empty());

    let best = pp.best_result(&new_hash).unwrap().unwrap();
    assert!(pp
        .get_evaluation(&best.sequence_hash, &new_hash)
        .unwrap()
        .is_some());
    assert_eq!(best.score, max_valid_score(&pp, &new_hash));
    assert_eq!(
        pp.planner_marker().unwrap().last_portfolio_hash,
        Some(new_hash)
    );
}

#[tokio::test]
async fn test_budget_leaves_work_pending_and_resume_finishes_it() {
    let cfg = PlannerConfig {
        max_evaluations_per_cycle: Some(1),
        worker_count: 2,
        ..config()
    };
    let pp = setup_with(":memory:", aapl_msft(), cfg);
    let state = msft_state(100.0);
    let hash = pp.portfolio_hash(&state).unwrap();

    let first = pp.force_planning_cycle(&state).await.unwrap();
    assert_eq!(first.outcome, CycleOutcome::BudgetExhausted);
    assert_eq!(first.evaluated, 1);
    assert_eq!(first.pending_count, 2);

    let second = pp.resume_cycle(&hash).await.unwrap();
    assert_eq!(second.outcome, CycleOutcome::BudgetExhausted);
    assert_eq!(second.pending_count, 1);

    let third = pp.resume_cycle(&hash).await.unwrap();
    assert_eq!(third.outcome, CycleOutcome::Completed);
    assert_eq!(third.pending_count, 0);
    assert_eq!(third.completed_count, 3);
    assert_eq!(third.best_score, Some(max_valid_score(&pp, &hash)));
}

#[tokio::test]
async fn test_resume_unknown_hash_is_not_found() {
    let pp = setup(vec![]);
    let hash = portplan::domain::values::content_hash::PortfolioHash::from_hex("feedface");
    let err = pp.resume_cycle(&hash).await.unwrap_err();
    assert!(matches!(err, DomainError::NotFound(_)));
}

#[tokio::test]
async fn test_zero_candidates_completes_empty() {
    let pp = setup(vec![]);
    let state = msft_state(100.0);
    let hash = pp.portfolio_hash(&state).unwrap();

    let report = pp.force_planning_cycle(&state).await.unwrap();
    assert_eq!(report.outcome, CycleOutcome::Completed);
    assert_eq!(report.inserted, 0);
    assert!(pp.best_result(&hash).unwrap().is_none());
}

#[tokio::test]
async fn test_malformed_state_is_rejected_before_planning() {
    let pp = setup(aapl_msft());
    let mut state = msft_state(100.0);
    state.holdings[0].quantity = -5.0;

    let err = pp.force_planning_cycle(&state).await.unwrap_err();
    assert!(matches!(err, DomainError::InvalidInput(_)));
    assert!(pp.cycle_history(10).unwrap().is_empty());
}

#[tokio::test]
async fn test_source_failure_records_failed_cycle() {
    let cfg = config();
    let pp = PortPlan::with_providers(
        ":memory:",
        Arc::new(BrokenSource),
        Arc::new(WeightedScorer::new(cfg.weights)),
        cfg,
    )
    .unwrap();

    let err = pp.force_planning_cycle(&msft_state(100.0)).await.unwrap_err();
    assert!(matches!(err, DomainError::Source(_)));

    let history = pp.cycle_history(10).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].outcome, CycleOutcome::Failed);
    assert!(history[0].error.as_deref().unwrap().contains("broker unreachable"));
    assert_eq!(pp.planner_marker().unwrap().phase, CycleState::Idle);
}

#[tokio::test]
async fn test_history_records_each_cycle() {
    let pp = setup(aapl_msft());
    let state = msft_state(100.0);
    pp.force_planning_cycle(&state).await.unwrap();
    pp.force_planning_cycle(&state).await.unwrap();

    let history = pp.cycle_history(10).unwrap();
    assert_eq!(history.len(), 2);
    assert!(history.iter().all(|r| r.outcome == CycleOutcome::Completed));
    assert_eq!(history.iter().map(|r| r.evaluated).sum::<usize>(), 3);
    assert_eq!(pp.planner_marker().unwrap().phase, CycleState::Idle);
}

#[tokio::test]
async fn test_progress_survives_reopening_the_database() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("plan.db");
    let path = path.to_str().unwrap();
    let state = msft_state(100.0);

    let hash = {
        let cfg = PlannerConfig {
            max_evaluations_per_cycle: Some(1),
            ..config()
        };
        let pp = setup_with(path, aapl_msft(), cfg);
        let report = pp.force_planning_cycle(&state).await.unwrap();
        assert_eq!(report.pending_count, 2);
        report.portfolio_hash
    };

    let pp = setup_with(path, vec![], config());
    assert_eq!(pp.count_pending(&hash).unwrap(), 2);
    let report = pp.resume_cycle(&hash).await.unwrap();
    assert_eq!(report.outcome, CycleOutcome::Completed);
    assert_eq!(report.completed_count, 3);
    assert!(pp.best_result(&hash).unwrap().is_some());
    assert_eq!(pp.cycle_history(10).unwrap().len(), 2);
}

#[tokio::test]
async fn test_target_drift_source_end_to_end() {
    let state = PortfolioState {
        holdings: vec![holding("OLD", 50.0, 20.0)],
        cash: vec![eur(1000.0)],
        targets: vec![AllocationTarget {
            symbol: "NEW".into(),
            weight: 0.5,
        }],
        ..Default::default()
    };
    let mut quotes = BTreeMap::new();
    quotes.insert(
        "NEW".to_string(),
        Quote {
            price: 10.0,
            currency: "EUR".into(),
        },
    );
    let cfg = config();
    let pp = PortPlan::with_providers(
        ":memory:",
        Arc::new(TargetDriftSource::new(quotes)),
        Arc::new(WeightedScorer::new(cfg.weights)),
        cfg,
    )
    .unwrap();

    let report = pp.force_planning_cycle(&state).await.unwrap();
    assert_eq!(report.candidates, 2);
    assert_eq!(report.outcome, CycleOutcome::Completed);

    let best = pp.best_result(&report.portfolio_hash).unwrap().unwrap();
    assert!(!best.plan.steps.is_empty());
    assert!(best.score > INVALID_SCORE);
}

#[tokio::test]
async fn test_resume_uses_latest_prices_for_the_hash() {
    let cfg = PlannerConfig {
        max_evaluations_per_cycle: Some(1),
        worker_count: 1,
        ..config()
    };
    let buys = vec![
        ActionCandidate::new("AAPL", Side::Buy, 1.0, 150.0, 0.8),
        ActionCandidate::new("GOOG", Side::Buy, 1.0, 100.0, 0.6),
        ActionCandidate::new("NVDA", Side::Buy, 1.0, 120.0, 0.4),
    ];
    let pp = setup_with(":memory:", buys, cfg);

    let first_state = msft_state(100_000.0);
    let mut repriced = first_state.clone();
    repriced.holdings[0].price = 800.0;
    let hash = pp.portfolio_hash(&first_state).unwrap();
    assert_eq!(pp.portfolio_hash(&repriced).unwrap(), hash);

    pp.force_planning_cycle(&first_state).await.unwrap();
    pp.force_planning_cycle(&repriced).await.unwrap();
    assert!(pp.count_pending(&hash).unwrap() > 0);

    pp.resume_cycle(&hash).await.unwrap();
    let latest = pp
        .list_evaluations(&hash)
        .unwrap()
        .into_iter()
        .max_by_key(|e| e.evaluated_at)
        .unwrap();
    // 5 MSFT at 800 plus roughly 100k cash; the 400 snapshot would land near 102k
    assert!(latest.valid);
    assert!(latest.total_value > 103_000.0, "got {}", latest.total_value);
}
