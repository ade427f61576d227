//! Planning cycle state machine.
//!
//! `Idle → Generating → Composing → Evaluating → Selecting → Idle`
//!
//! The orchestrator holds nothing between calls. The last cycle start, the
//! last portfolio hash and the current phase live in `planner_state`; the
//! state a hash was computed from lives in `portfolio_states`; pending work
//! lives in `sequences`. Any tick can therefore pick up where a crashed or
//! time-boxed cycle stopped.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::application::best_result::BestResultTracker;
use crate::application::compose::SequenceComposer;
use crate::application::evaluate::{EvaluationBudget, EvaluationEngine};
use crate::domain::entities::cycle_run::CycleRun;
use crate::domain::entities::portfolio_state::PortfolioState;
use crate::domain::error::DomainError;
use crate::domain::ports::cycle_repository::CycleRepository;
use crate::domain::ports::opportunity_source::OpportunitySource;
use crate::domain::ports::scoring::ScoringFunction;
use crate::domain::ports::sequence_repository::SequenceRepository;
use crate::domain::values::content_hash::PortfolioHash;
use crate::domain::values::cycle_state::{CycleOutcome, CycleState};
use crate::domain::values::planner_config::PlannerConfig;

/// What one invocation of the state machine did.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleReport {
    pub cycle_id: String,
    pub portfolio_hash: PortfolioHash,
    pub outcome: CycleOutcome,
    pub candidates: usize,
    pub inserted: usize,
    pub evaluated: usize,
    pub failed: usize,
    pub pending_count: usize,
    pub completed_count: usize,
    pub best_score: Option<f64>,
}

impl CycleReport {
    fn started(portfolio_hash: &PortfolioHash) -> Self {
        Self {
            cycle_id: uuid::Uuid::new_v4().to_string(),
            portfolio_hash: portfolio_hash.clone(),
            outcome: CycleOutcome::Failed,
            candidates: 0,
            inserted: 0,
            evaluated: 0,
            failed: 0,
            pending_count: 0,
            completed_count: 0,
            best_score: None,
        }
    }

    fn to_run(&self, started_at: DateTime<Utc>, error: Option<String>) -> CycleRun {
        CycleRun {
            id: self.cycle_id.clone(),
            portfolio_hash: self.portfolio_hash.clone(),
            outcome: self.outcome,
            candidates: self.candidates,
            inserted: self.inserted,
            evaluated: self.evaluated,
            failed: self.failed,
            pending_count: self.pending_count,
            completed_count: self.completed_count,
            best_score: self.best_score,
            error,
            started_at,
            finished_at: Utc::now(),
        }
    }
}

pub struct PlannerOrchestrator {
    source: Arc<dyn OpportunitySource>,
    sequences: Arc<dyn SequenceRepository>,
    cycles: Arc<dyn CycleRepository>,
    tracker: Arc<BestResultTracker>,
    composer: SequenceComposer,
    engine: EvaluationEngine,
    config: PlannerConfig,
}

impl PlannerOrchestrator {
    pub fn new(
        source: Arc<dyn OpportunitySource>,
        sequences: Arc<dyn SequenceRepository>,
        cycles: Arc<dyn CycleRepository>,
        tracker: Arc<BestResultTracker>,
        scorer: Arc<dyn ScoringFunction>,
        config: PlannerConfig,
    ) -> Self {
        Self {
            composer: SequenceComposer::new(&config),
            engine: EvaluationEngine::new(sequences.clone(), tracker.clone(), scorer, &config),
            source,
            sequences,
            cycles,
            tracker,
            config,
        }
    }

    /// One scheduler tick for `state`.
    ///
    /// Returns a `Skipped` report without touching the store when the
    /// minimum planning interval has not elapsed, unless `force` is set.
    /// Malformed state is rejected before anything is hashed.
    pub async fn run_cycle(&self, state: &PortfolioState, force: bool) -> Result<CycleReport, DomainError> {
        state.validate()?;
        let hash = state.hash();
        let marker = self.cycles.marker()?;
        let now = Utc::now();

        if !force {
            if let Some(last) = marker.last_cycle_start {
                let elapsed = (now - last).to_std().unwrap_or_default();
                if elapsed < self.config.min_planning_interval {
                    info!(
                        portfolio_hash = %hash.short(),
                        elapsed_secs = elapsed.as_secs(),
                        interval_secs = self.config.min_planning_interval.as_secs(),
                        "planning interval not elapsed, skipping cycle"
                    );
                    return self.skipped(&hash);
                }
            }
        }

        let mut report = CycleReport::started(&hash);
        info!(cycle_id = %report.cycle_id, portfolio_hash = %hash.short(), "planning cycle started");
        let result = self
            .generate_and_compose(state, &hash, marker.last_portfolio_hash.as_ref(), now, &mut report)
            .await;
        let result = match result {
            Ok(()) => self.evaluate_and_select(Arc::new(state.clone()), &mut report).await,
            Err(e) => Err(e),
        };
        self.finish(report, now, result)
    }

    /// Re-enter Evaluating and Selecting for a hash whose state snapshot was
    /// stored by an earlier cycle. No new candidates are fetched.
    pub async fn resume_cycle(&self, portfolio_hash: &PortfolioHash) -> Result<CycleReport, DomainError> {
        let state = self.cycles.load_snapshot(portfolio_hash)?.ok_or_else(|| {
            DomainError::NotFound(format!("no stored portfolio state for {portfolio_hash}"))
        })?;
        let started_at = Utc::now();
        let mut report = CycleReport::started(portfolio_hash);
        info!(cycle_id = %report.cycle_id, portfolio_hash = %portfolio_hash.short(), "resuming planning cycle");
        let result = self.evaluate_and_select(Arc::new(state), &mut report).await;
        self.finish(report, started_at, result)
    }

    fn enter(&self, phase: CycleState) -> Result<(), DomainError> {
        self.cycles.set_phase(phase)?;
        debug!(phase = %phase, "cycle phase");
        Ok(())
    }

    fn skipped(&self, hash: &PortfolioHash) -> Result<CycleReport, DomainError> {
        let mut report = CycleReport::started(hash);
        report.outcome = CycleOutcome::Skipped;
        report.pending_count = self.sequences.count_pending(hash)?;
        report.completed_count = self.sequences.count_completed(hash)?;
        report.best_score = self.tracker.get(hash)?.map(|b| b.score);
        Ok(report)
    }

    async fn generate_and_compose(
        &self,
        state: &PortfolioState,
        hash: &PortfolioHash,
        previous: Option<&PortfolioHash>,
        started_at: DateTime<Utc>,
        report: &mut CycleReport,
    ) -> Result<(), DomainError> {
        self.cycles.begin_cycle(hash, started_at)?;
        debug!(phase = %CycleState::Generating, "cycle phase");

        if previous != Some(hash) {
            let sequences = self.sequences.delete_stale(hash)?;
            let snapshots = self.cycles.delete_stale_snapshots(hash)?;
            if sequences + snapshots > 0 {
                info!(
                    portfolio_hash = %hash.short(),
                    previous = previous.map(|p| p.short()).unwrap_or("-"),
                    rows = sequences,
                    snapshots,
                    "portfolio changed, dropped stale search state"
                );
            }
        }
        self.cycles.save_snapshot(hash, state)?;

        let candidates = self
            .source
            .candidate_actions(state)
            .await
            .map_err(|e| match e {
                DomainError::Source(msg) => DomainError::Source(msg),
                other => DomainError::Source(format!("{}: {other}", self.source.name())),
            })?;
        report.candidates = candidates.len();
        debug!(source = self.source.name(), candidates = candidates.len(), "candidates fetched");

        self.enter(CycleState::Composing)?;
        let sequences = self.composer.compose(hash, &candidates)?;
        let inserted = self.sequences.insert_sequences(&sequences)?;
        report.inserted = inserted.len();
        info!(
            portfolio_hash = %hash.short(),
            composed = sequences.len(),
            inserted = inserted.len(),
            "sequences composed"
        );
        Ok(())
    }

    async fn evaluate_and_select(
        &self,
        state: Arc<PortfolioState>,
        report: &mut CycleReport,
    ) -> Result<(), DomainError> {
        let hash = report.portfolio_hash.clone();

        self.enter(CycleState::Evaluating)?;
        let budget = EvaluationBudget::new(self.config.cycle_budget, self.config.max_evaluations_per_cycle);
        let evaluation = self.engine.run(state, &hash, budget).await?;
        report.evaluated = evaluation.evaluated;
        report.failed = evaluation.failed;

        self.enter(CycleState::Selecting)?;
        self.reconcile_best(&hash)?;
        report.pending_count = self.sequences.count_pending(&hash)?;
        report.completed_count = self.sequences.count_completed(&hash)?;
        report.best_score = self.tracker.get(&hash)?.map(|b| b.score);
        report.outcome = if report.pending_count == 0 {
            CycleOutcome::Completed
        } else {
            CycleOutcome::BudgetExhausted
        };

        self.enter(CycleState::Idle)?;
        Ok(())
    }

    /// Make sure the best stored evaluation is reflected in `best_result`,
    /// covering a worker that committed an evaluation but failed before
    /// its best-result upsert.
    fn reconcile_best(&self, hash: &PortfolioHash) -> Result<(), DomainError> {
        let evaluations = self.sequences.list_evaluations(hash)?;
        let Some(top) = evaluations.iter().find(|e| e.valid) else {
            return Ok(());
        };
        if let Some(sequence) = self.sequences.get_sequence(&top.sequence_hash, hash)? {
            self.tracker.upsert_if_better(&sequence, top)?;
        }
        Ok(())
    }

    fn finish(
        &self,
        mut report: CycleReport,
        started_at: DateTime<Utc>,
        result: Result<(), DomainError>,
    ) -> Result<CycleReport, DomainError> {
        match result {
            Ok(()) => {
                if let Err(e) = self.cycles.record_run(&report.to_run(started_at, None)) {
                    warn!(cycle_id = %report.cycle_id, error = %e, "failed to record cycle run");
                }
                info!(
                    cycle_id = %report.cycle_id,
                    portfolio_hash = %report.portfolio_hash.short(),
                    outcome = %report.outcome,
                    evaluated = report.evaluated,
                    pending = report.pending_count,
                    completed = report.completed_count,
                    best_score = ?report.best_score,
                    "planning cycle finished"
                );
                Ok(report)
            }
            Err(e) => {
                report.outcome = CycleOutcome::Failed;
                error!(
                    cycle_id = %report.cycle_id,
                    portfolio_hash = %report.portfolio_hash.short(),
                    error = %e,
                    "planning cycle failed"
                );
                // best effort: the store may be the thing that failed
                if let Err(record_err) = self.cycles.record_run(&report.to_run(started_at, Some(e.to_string()))) {
                    warn!(cycle_id = %report.cycle_id, error = %record_err, "failed to record failed cycle");
                }
                if let Err(phase_err) = self.cycles.set_phase(CycleState::Idle) {
                    warn!(error = %phase_err, "failed to reset planner phase");
                }
                Err(e)
            }
        }
    }
}
