mod common;

use common::*;
use portplan::domain::error::DomainError;
use portplan::domain::values::content_hash::PortfolioHash;
use portplan::domain::values::recommendation_status::RecommendationStatus;

#[tokio::test]
async fn test_materialize_one_recommendation_per_step() {
    let pp = setup(aapl_msft());
    let state = msft_state(100.0);
    let report = pp.force_planning_cycle(&state).await.unwrap();
    let best = pp.best_result(&report.portfolio_hash).unwrap().unwrap();

    let recs = pp.materialize_recommendations(&report.portfolio_hash).unwrap();
    assert_eq!(recs.len(), best.plan.steps.len());
    for (i, rec) in recs.iter().enumerate() {
        assert_eq!(rec.step_index, i);
        assert_eq!(rec.symbol, best.plan.steps[i].symbol);
        assert_eq!(rec.sequence_hash, best.sequence_hash);
        assert_eq!(rec.status, RecommendationStatus::Pending);
    }

    let listed = pp
        .recommendations(Some(RecommendationStatus::Pending), None)
        .unwrap();
    assert_eq!(listed.len(), recs.len());
}

#[tokio::test]
async fn test_rematerializing_replaces_only_pending() {
    let pp = setup(aapl_msft());
    let report = pp.force_planning_cycle(&msft_state(100.0)).await.unwrap();
    let hash = report.portfolio_hash;

    let first = pp.materialize_recommendations(&hash).unwrap();
    pp.set_recommendation_status(&first[0].id, RecommendationStatus::Executed)
        .unwrap();

    let second = pp.materialize_recommendations(&hash).unwrap();
    let pending = pp
        .recommendations(Some(RecommendationStatus::Pending), None)
        .unwrap();
    assert_eq!(pending.len(), second.len());
    assert!(pending.iter().all(|r| first.iter().all(|f| f.id != r.id)));

    let executed = pp
        .recommendations(Some(RecommendationStatus::Executed), None)
        .unwrap();
    assert_eq!(executed.len(), 1);
    assert_eq!(executed[0].id, first[0].id);
}

#[tokio::test]
async fn test_materialize_without_best_result_is_not_found() {
    let pp = setup(vec![]);
    let err = pp
        .materialize_recommendations(&PortfolioHash::from_hex("nothing"))
        .unwrap_err();
    assert!(matches!(err, DomainError::NotFound(_)));
}

#[test]
fn test_unknown_recommendation_status_update_is_not_found() {
    let pp = setup(vec![]);
    let err = pp
        .set_recommendation_status("missing", RecommendationStatus::Dismissed)
        .unwrap_err();
    assert!(matches!(err, DomainError::NotFound(_)));
}
