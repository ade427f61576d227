use crate::domain::entities::evaluation::ScoreBreakdown;
use crate::domain::entities::simulation::SimulatedState;

/// End score plus the named components it was built from.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreOutcome {
    pub end_score: f64,
    pub breakdown: ScoreBreakdown,
}

impl ScoreOutcome {
    /// False when the score or any component is NaN or infinite.
    pub fn is_finite(&self) -> bool {
        self.end_score.is_finite() && self.breakdown.values().all(|v| v.is_finite())
    }
}

/// Injectable strategy ranking a simulated end state.
///
/// Must be pure: the same simulated state always yields the same outcome,
/// which is what makes re-written evaluations idempotent.
pub trait ScoringFunction: Send + Sync {
    fn name(&self) -> &str;

    fn score(&self, state: &SimulatedState) -> ScoreOutcome;
}
