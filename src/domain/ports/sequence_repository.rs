use crate::domain::entities::action_sequence::ActionSequence;
use crate::domain::entities::evaluation::EvaluationResult;
use crate::domain::error::DomainError;
use crate::domain::values::content_hash::{PortfolioHash, SequenceHash};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct SequenceFilter {
    pub portfolio_hash: PortfolioHash,
    pub completed: Option<bool>,
    pub limit: Option<usize>,
}

/// Storage for pending work (`sequences`) and its results (`evaluations`).
///
/// Every operation is keyed by (sequence hash, portfolio hash) and must be
/// safe under concurrent callers.
pub trait SequenceRepository: Send + Sync {
    /// Insert-or-ignore. Returns the hashes that were actually new.
    fn insert_sequences(&self, sequences: &[ActionSequence]) -> Result<Vec<SequenceHash>, DomainError>;

    /// Atomically claim the next pending sequence in search order.
    /// Claims older than `lease` are treated as abandoned.
    fn claim_next(
        &self,
        portfolio_hash: &PortfolioHash,
        worker: &str,
        lease: Duration,
    ) -> Result<Option<ActionSequence>, DomainError>;

    /// Write the evaluation and mark the sequence completed in one
    /// transaction. Returns `false` (and writes nothing) if `worker` no
    /// longer holds the claim or the sequence is already completed.
    fn complete(&self, evaluation: &EvaluationResult, worker: &str) -> Result<bool, DomainError>;

    /// Return a claimed sequence to the pending pool.
    fn release(
        &self,
        sequence_hash: &SequenceHash,
        portfolio_hash: &PortfolioHash,
        worker: &str,
    ) -> Result<(), DomainError>;

    fn get_sequence(
        &self,
        sequence_hash: &SequenceHash,
        portfolio_hash: &PortfolioHash,
    ) -> Result<Option<ActionSequence>, DomainError>;

    fn list_sequences(&self, filter: &SequenceFilter) -> Result<Vec<ActionSequence>, DomainError>;

    fn count_pending(&self, portfolio_hash: &PortfolioHash) -> Result<usize, DomainError>;

    fn count_completed(&self, portfolio_hash: &PortfolioHash) -> Result<usize, DomainError>;

    fn get_evaluation(
        &self,
        sequence_hash: &SequenceHash,
        portfolio_hash: &PortfolioHash,
    ) -> Result<Option<EvaluationResult>, DomainError>;

    fn list_evaluations(&self, portfolio_hash: &PortfolioHash) -> Result<Vec<EvaluationResult>, DomainError>;

    /// Delete sequences and evaluations of every hash except `keep`.
    fn delete_stale(&self, keep: &PortfolioHash) -> Result<usize, DomainError>;
}
