pub mod application;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod logging;

use crate::application::best_result::BestResultTracker;
use crate::application::planner::{CycleReport, PlannerOrchestrator};
use crate::application::recommendations::RecommendationUseCase;
use crate::domain::entities::action_sequence::ActionSequence;
use crate::domain::entities::best_result::{BestResult, Plan};
use crate::domain::entities::cycle_run::{CycleRun, PlannerMarker};
use crate::domain::entities::evaluation::EvaluationResult;
use crate::domain::entities::portfolio_state::PortfolioState;
use crate::domain::entities::recommendation::Recommendation;
use crate::domain::error::DomainError;
use crate::domain::ports::best_result_repository::BestResultRepository;
use crate::domain::ports::cycle_repository::CycleRepository;
use crate::domain::ports::opportunity_source::OpportunitySource;
use crate::domain::ports::recommendation_repository::RecommendationRepository;
use crate::domain::ports::scoring::ScoringFunction;
use crate::domain::ports::sequence_repository::{SequenceFilter, SequenceRepository};
use crate::domain::values::content_hash::{PortfolioHash, SequenceHash};
use crate::domain::values::planner_config::PlannerConfig;
use crate::domain::values::recommendation_status::RecommendationStatus;
use crate::infrastructure::scoring::weighted::WeightedScorer;
use crate::infrastructure::sqlite;
use crate::infrastructure::sqlite::best_result_repo::SqliteBestResultRepo;
use crate::infrastructure::sqlite::cycle_repo::SqliteCycleRepo;
use crate::infrastructure::sqlite::recommendation_repo::SqliteRecommendationRepo;
use crate::infrastructure::sqlite::sequence_repo::SqliteSequenceRepo;
use std::sync::Arc;

pub struct PortPlan {
    planner: PlannerOrchestrator,
    sequences: Arc<dyn SequenceRepository>,
    cycles: Arc<dyn CycleRepository>,
    tracker: Arc<BestResultTracker>,
    recommendations: RecommendationUseCase,
}

impl PortPlan {
    /// Planner with `PORTPLAN_*` configuration and the default weighted scorer.
    pub fn new(db_path: &str, source: Arc<dyn OpportunitySource>) -> Result<Self, DomainError> {
        let config = PlannerConfig::from_env();
        let scorer = Arc::new(WeightedScorer::new(config.weights));
        Self::with_providers(db_path, source, scorer, config)
    }

    pub fn with_providers(
        db_path: &str,
        source: Arc<dyn OpportunitySource>,
        scorer: Arc<dyn ScoringFunction>,
        config: PlannerConfig,
    ) -> Result<Self, DomainError> {
        let conn = sqlite::open(db_path)?;

        let sequences: Arc<dyn SequenceRepository> = Arc::new(SqliteSequenceRepo::new(conn.clone()));
        let cycles: Arc<dyn CycleRepository> = Arc::new(SqliteCycleRepo::new(conn.clone()));
        let best_repo: Arc<dyn BestResultRepository> = Arc::new(SqliteBestResultRepo::new(conn.clone()));
        let rec_repo: Arc<dyn RecommendationRepository> = Arc::new(SqliteRecommendationRepo::new(conn));

        let tracker = Arc::new(BestResultTracker::new(best_repo));
        tracing::debug!(db_path, scorer = scorer.name(), workers = config.worker_count, "planner initialised");

        Ok(Self {
            planner: PlannerOrchestrator::new(
                source,
                sequences.clone(),
                cycles.clone(),
                tracker.clone(),
                scorer,
                config,
            ),
            recommendations: RecommendationUseCase::new(rec_repo, tracker.clone()),
            sequences,
            cycles,
            tracker,
        })
    }

    // Planning

    /// Scheduler entry point; respects the minimum planning interval.
    pub async fn run_planning_cycle(&self, state: &PortfolioState) -> Result<CycleReport, DomainError> {
        self.planner.run_cycle(state, false).await
    }

    /// Manual trigger that ignores the minimum planning interval.
    pub async fn force_planning_cycle(&self, state: &PortfolioState) -> Result<CycleReport, DomainError> {
        self.planner.run_cycle(state, true).await
    }

    pub async fn resume_cycle(&self, portfolio_hash: &PortfolioHash) -> Result<CycleReport, DomainError> {
        self.planner.resume_cycle(portfolio_hash).await
    }

    pub fn portfolio_hash(&self, state: &PortfolioState) -> Result<PortfolioHash, DomainError> {
        state.validate()?;
        Ok(state.hash())
    }

    // Search state

    pub fn best_result(&self, portfolio_hash: &PortfolioHash) -> Result<Option<BestResult>, DomainError> {
        self.tracker.get(portfolio_hash)
    }

    pub fn best_plan(&self, portfolio_hash: &PortfolioHash) -> Result<Option<Plan>, DomainError> {
        Ok(self.tracker.get(portfolio_hash)?.map(|b| b.plan))
    }

    pub fn reset_best_result(&self, portfolio_hash: &PortfolioHash) -> Result<bool, DomainError> {
        self.tracker.reset(portfolio_hash)
    }

    pub fn count_pending(&self, portfolio_hash: &PortfolioHash) -> Result<usize, DomainError> {
        self.sequences.count_pending(portfolio_hash)
    }

    pub fn count_completed(&self, portfolio_hash: &PortfolioHash) -> Result<usize, DomainError> {
        self.sequences.count_completed(portfolio_hash)
    }

    pub fn list_sequences(
        &self,
        portfolio_hash: &PortfolioHash,
        completed: Option<bool>,
        limit: Option<usize>,
    ) -> Result<Vec<ActionSequence>, DomainError> {
        self.sequences.list_sequences(&SequenceFilter {
            portfolio_hash: portfolio_hash.clone(),
            completed,
            limit,
        })
    }

    pub fn get_evaluation(
        &self,
        sequence_hash: &SequenceHash,
        portfolio_hash: &PortfolioHash,
    ) -> Result<Option<EvaluationResult>, DomainError> {
        self.sequences.get_evaluation(sequence_hash, portfolio_hash)
    }

    pub fn list_evaluations(&self, portfolio_hash: &PortfolioHash) -> Result<Vec<EvaluationResult>, DomainError> {
        self.sequences.list_evaluations(portfolio_hash)
    }

    pub fn cycle_history(&self, limit: usize) -> Result<Vec<CycleRun>, DomainError> {
        self.cycles.list_runs(limit)
    }

    pub fn planner_marker(&self) -> Result<PlannerMarker, DomainError> {
        self.cycles.marker()
    }

    // Recommendations

    pub fn materialize_recommendations(
        &self,
        portfolio_hash: &PortfolioHash,
    ) -> Result<Vec<Recommendation>, DomainError> {
        self.recommendations.materialize(portfolio_hash)
    }

    pub fn recommendations(
        &self,
        status: Option<RecommendationStatus>,
        limit: Option<usize>,
    ) -> Result<Vec<Recommendation>, DomainError> {
        self.recommendations.list(status, limit)
    }

    pub fn set_recommendation_status(&self, id: &str, status: RecommendationStatus) -> Result<(), DomainError> {
        self.recommendations.set_status(id, status)
    }
}
