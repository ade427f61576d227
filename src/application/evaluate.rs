//! Evaluation engine: a fixed pool of workers draining the pending queue.
//!
//! Workers never share mutable state. Each claims a sequence through the
//! store, simulates it on a private copy of the portfolio, and commits the
//! evaluation together with the completion flag. Simulation failures are
//! recorded as invalid evaluations; only persistence failures stop the pool.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::application::best_result::BestResultTracker;
use crate::domain::entities::action_sequence::ActionSequence;
use crate::domain::entities::evaluation::EvaluationResult;
use crate::domain::entities::portfolio_state::PortfolioState;
use crate::domain::entities::simulation::simulate;
use crate::domain::error::DomainError;
use crate::domain::ports::scoring::ScoringFunction;
use crate::domain::ports::sequence_repository::SequenceRepository;
use crate::domain::values::content_hash::PortfolioHash;
use crate::domain::values::planner_config::{FeeSchedule, PlannerConfig};

/// Limits for one evaluation pass.
#[derive(Debug, Clone, Copy)]
pub struct EvaluationBudget {
    pub deadline: Instant,
    pub max_evaluations: Option<usize>,
}

impl EvaluationBudget {
    pub fn new(time: Duration, max_evaluations: Option<usize>) -> Self {
        Self {
            deadline: Instant::now() + time,
            max_evaluations,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EvaluationReport {
    /// Sequences completed by this pass, valid or not.
    pub evaluated: usize,
    /// Completed with an invalid evaluation (simulation or scoring failure).
    pub failed: usize,
    /// Times the best result was raised.
    pub improved: usize,
    pub budget_exhausted: bool,
}

#[derive(Default)]
struct Counters {
    evaluated: AtomicUsize,
    failed: AtomicUsize,
    improved: AtomicUsize,
    claims: AtomicUsize,
    exhausted: AtomicBool,
    abort: AtomicBool,
}

/// Everything one worker needs, cloned per worker.
#[derive(Clone)]
struct WorkerContext {
    sequences: Arc<dyn SequenceRepository>,
    tracker: Arc<BestResultTracker>,
    scorer: Arc<dyn ScoringFunction>,
    state: Arc<PortfolioState>,
    portfolio_hash: PortfolioHash,
    fees: FeeSchedule,
    concentration_limit: f64,
    claim_lease: Duration,
    budget: EvaluationBudget,
    counters: Arc<Counters>,
}

impl WorkerContext {
    fn out_of_budget(&self) -> bool {
        if self.counters.abort.load(Ordering::SeqCst) {
            return true;
        }
        if Instant::now() >= self.budget.deadline {
            self.counters.exhausted.store(true, Ordering::SeqCst);
            return true;
        }
        if let Some(max) = self.budget.max_evaluations {
            // reserve a slot before claiming so the pool as a whole stops at `max`
            if self.counters.claims.fetch_add(1, Ordering::SeqCst) >= max {
                self.counters.exhausted.store(true, Ordering::SeqCst);
                return true;
            }
        }
        false
    }

    fn evaluate(&self, sequence: &ActionSequence) -> EvaluationResult {
        match simulate(
            &self.state,
            &sequence.actions,
            &self.fees,
            self.concentration_limit,
        ) {
            Ok(sim) => {
                // a misbehaving scorer invalidates this sequence only
                let scored = panic::catch_unwind(AssertUnwindSafe(|| self.scorer.score(&sim)));
                let reason = match scored {
                    Ok(outcome) if outcome.is_finite() => {
                        return EvaluationResult::from_simulation(
                            sequence.sequence_hash.clone(),
                            sequence.portfolio_hash.clone(),
                            &sim,
                            outcome.end_score,
                            outcome.breakdown,
                        );
                    }
                    Ok(_) => "scoring produced non-finite score",
                    Err(_) => "scoring function panicked",
                };
                warn!(
                    sequence_hash = %sequence.sequence_hash.short(),
                    scorer = self.scorer.name(),
                    reason,
                    "recording invalid evaluation"
                );
                EvaluationResult::invalid(
                    sequence.sequence_hash.clone(),
                    sequence.portfolio_hash.clone(),
                    reason.to_string(),
                )
            }
            Err(e) => {
                debug!(
                    sequence_hash = %sequence.sequence_hash.short(),
                    error = %e,
                    "simulation failed, recording invalid evaluation"
                );
                EvaluationResult::invalid(
                    sequence.sequence_hash.clone(),
                    sequence.portfolio_hash.clone(),
                    e.to_string(),
                )
            }
        }
    }

    /// Blocking worker loop. Returns on empty queue, budget or error.
    fn run(self, worker: String) -> Result<(), DomainError> {
        debug!(worker = %worker, "evaluation worker started");
        let result = self.drain(&worker);
        if result.is_err() {
            self.counters.abort.store(true, Ordering::SeqCst);
        }
        debug!(worker = %worker, ok = result.is_ok(), "evaluation worker stopped");
        result
    }

    fn drain(&self, worker: &str) -> Result<(), DomainError> {
        while !self.out_of_budget() {
            let Some(sequence) =
                self.sequences
                    .claim_next(&self.portfolio_hash, worker, self.claim_lease)?
            else {
                return Ok(());
            };

            let evaluation = self.evaluate(&sequence);
            match self.sequences.complete(&evaluation, worker) {
                Ok(true) => {
                    self.counters.evaluated.fetch_add(1, Ordering::SeqCst);
                    if !evaluation.valid {
                        self.counters.failed.fetch_add(1, Ordering::SeqCst);
                    } else if self.tracker.upsert_if_better(&sequence, &evaluation)? {
                        self.counters.improved.fetch_add(1, Ordering::SeqCst);
                    }
                }
                Ok(false) => {
                    warn!(
                        worker,
                        sequence_hash = %sequence.sequence_hash.short(),
                        "claim lost before completion, discarding evaluation"
                    );
                }
                Err(e) => {
                    if let Err(release_err) = self.sequences.release(
                        &sequence.sequence_hash,
                        &sequence.portfolio_hash,
                        worker,
                    ) {
                        warn!(worker, error = %release_err, "failed to release claim");
                    }
                    return Err(e);
                }
            }
        }
        Ok(())
    }
}

pub struct EvaluationEngine {
    sequences: Arc<dyn SequenceRepository>,
    tracker: Arc<BestResultTracker>,
    scorer: Arc<dyn ScoringFunction>,
    worker_count: usize,
    fees: FeeSchedule,
    concentration_limit: f64,
    claim_lease: Duration,
}

impl EvaluationEngine {
    pub fn new(
        sequences: Arc<dyn SequenceRepository>,
        tracker: Arc<BestResultTracker>,
        scorer: Arc<dyn ScoringFunction>,
        config: &PlannerConfig,
    ) -> Self {
        Self {
            sequences,
            tracker,
            scorer,
            worker_count: config.worker_count.max(1),
            fees: config.fees,
            concentration_limit: config.concentration_limit,
            claim_lease: config.claim_lease,
        }
    }

    /// Run the worker pool against the pending queue of `portfolio_hash`
    /// until it is empty or `budget` runs out.
    pub async fn run(
        &self,
        state: Arc<PortfolioState>,
        portfolio_hash: &PortfolioHash,
        budget: EvaluationBudget,
    ) -> Result<EvaluationReport, DomainError> {
        let counters = Arc::new(Counters::default());
        let ctx = WorkerContext {
            sequences: self.sequences.clone(),
            tracker: self.tracker.clone(),
            scorer: self.scorer.clone(),
            state,
            portfolio_hash: portfolio_hash.clone(),
            fees: self.fees,
            concentration_limit: self.concentration_limit,
            claim_lease: self.claim_lease,
            budget,
            counters: counters.clone(),
        };

        let mut workers = JoinSet::new();
        for _ in 0..self.worker_count {
            let ctx = ctx.clone();
            let worker = uuid::Uuid::new_v4().to_string();
            workers.spawn_blocking(move || ctx.run(worker));
        }

        let mut first_error: Option<DomainError> = None;
        while let Some(joined) = workers.join_next().await {
            let outcome = joined.map_err(DomainError::from).and_then(|r| r);
            if let Err(e) = outcome {
                error!(portfolio_hash = %portfolio_hash.short(), error = %e, "evaluation worker failed");
                counters.abort.store(true, Ordering::SeqCst);
                first_error.get_or_insert(e);
            }
        }
        if let Some(e) = first_error {
            return Err(e);
        }

        let report = EvaluationReport {
            evaluated: counters.evaluated.load(Ordering::SeqCst),
            failed: counters.failed.load(Ordering::SeqCst),
            improved: counters.improved.load(Ordering::SeqCst),
            budget_exhausted: counters.exhausted.load(Ordering::SeqCst),
        };
        info!(
            portfolio_hash = %portfolio_hash.short(),
            workers = self.worker_count,
            evaluated = report.evaluated,
            failed = report.failed,
            improved = report.improved,
            budget_exhausted = report.budget_exhausted,
            "evaluation pass finished"
        );
        Ok(report)
    }
}
