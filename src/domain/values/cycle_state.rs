use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Phase of a planning cycle. Persisted so an interrupted cycle is visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CycleState {
    Idle,
    Generating,
    Composing,
    Evaluating,
    Selecting,
}

impl fmt::Display for CycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CycleState::Idle => write!(f, "idle"),
            CycleState::Generating => write!(f, "generating"),
            CycleState::Composing => write!(f, "composing"),
            CycleState::Evaluating => write!(f, "evaluating"),
            CycleState::Selecting => write!(f, "selecting"),
        }
    }
}

impl FromStr for CycleState {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "idle" => Ok(CycleState::Idle),
            "generating" => Ok(CycleState::Generating),
            "composing" => Ok(CycleState::Composing),
            "evaluating" => Ok(CycleState::Evaluating),
            "selecting" => Ok(CycleState::Selecting),
            _ => Err(format!("Unknown cycle state: {s}")),
        }
    }
}

/// How a cycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleOutcome {
    /// Every sequence for the hash is completed.
    Completed,
    /// Time or evaluation budget ran out; the rest stays pending.
    BudgetExhausted,
    /// Minimum planning interval not yet elapsed.
    Skipped,
    /// Persistence or source failure; retried on the next tick.
    Failed,
}

impl fmt::Display for CycleOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CycleOutcome::Completed => write!(f, "completed"),
            CycleOutcome::BudgetExhausted => write!(f, "budget_exhausted"),
            CycleOutcome::Skipped => write!(f, "skipped"),
            CycleOutcome::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for CycleOutcome {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "completed" => Ok(CycleOutcome::Completed),
            "budget_exhausted" => Ok(CycleOutcome::BudgetExhausted),
            "skipped" => Ok(CycleOutcome::Skipped),
            "failed" => Ok(CycleOutcome::Failed),
            _ => Err(format!("Unknown cycle outcome: {s}")),
        }
    }
}
