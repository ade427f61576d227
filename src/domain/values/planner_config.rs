//! Planner configuration.
//!
//! Defaults are tuned for a small retail portfolio planned every quarter
//! hour. [`PlannerConfig::from_env`] overlays `PORTPLAN_*` variables.

use std::time::Duration;

use tracing::warn;

use crate::domain::values::pattern_type::PatternType;

/// Per-leg transaction cost: `fixed + rate × notional`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeeSchedule {
    pub fixed: f64,
    pub rate: f64,
}

impl FeeSchedule {
    pub fn fee_for(&self, notional: f64) -> f64 {
        self.fixed + self.rate * notional.abs()
    }
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self {
            fixed: 2.0,
            rate: 0.002,
        }
    }
}

/// Weights for [`WeightedScorer`](crate::infrastructure::scoring::weighted::WeightedScorer).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreWeights {
    pub diversification: f64,
    pub cash_utilization: f64,
    pub target_alignment: f64,
    pub risk: f64,
    pub opportunity: f64,
    /// Multiplier on fees as a fraction of total value (subtracted).
    pub fee_penalty: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            diversification: 0.25,
            cash_utilization: 0.20,
            target_alignment: 0.25,
            risk: 0.15,
            opportunity: 0.15,
            fee_penalty: 1.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PlannerConfig {
    /// Maximum number of legs in a sequence.
    pub max_depth: usize,
    /// Candidates kept (by opportunity score) before combination.
    pub fan_out_limit: usize,
    /// Upper bound on sequences emitted by one composition pass.
    pub max_sequences_per_cycle: usize,
    pub worker_count: usize,
    pub min_planning_interval: Duration,
    /// Wall-clock budget for the Evaluating phase.
    pub cycle_budget: Duration,
    pub max_evaluations_per_cycle: Option<usize>,
    /// After this long a claimed but unfinished sequence may be reclaimed.
    pub claim_lease: Duration,
    pub fees: FeeSchedule,
    pub weights: ScoreWeights,
    /// Largest single-position weight before the risk component is penalised.
    pub concentration_limit: f64,
    pub patterns: Vec<PatternType>,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            max_depth: 3,
            fan_out_limit: 10,
            max_sequences_per_cycle: 500,
            worker_count: 4,
            min_planning_interval: Duration::from_secs(15 * 60),
            cycle_budget: Duration::from_secs(60),
            max_evaluations_per_cycle: None,
            claim_lease: Duration::from_secs(5 * 60),
            fees: FeeSchedule::default(),
            weights: ScoreWeights::default(),
            concentration_limit: 0.35,
            patterns: PatternType::ALL.to_vec(),
        }
    }
}

impl PlannerConfig {
    /// Defaults overlaid with any `PORTPLAN_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string());

        if let Some(v) = parse_var::<usize>("PORTPLAN_MAX_DEPTH", get("PORTPLAN_MAX_DEPTH")) {
            cfg.max_depth = v.max(1);
        }
        if let Some(v) = parse_var::<usize>("PORTPLAN_FAN_OUT", get("PORTPLAN_FAN_OUT")) {
            cfg.fan_out_limit = v;
        }
        if let Some(v) =
            parse_var::<usize>("PORTPLAN_MAX_SEQUENCES", get("PORTPLAN_MAX_SEQUENCES"))
        {
            cfg.max_sequences_per_cycle = v;
        }
        if let Some(v) = parse_var::<usize>("PORTPLAN_WORKERS", get("PORTPLAN_WORKERS")) {
            cfg.worker_count = v.max(1);
        }
        if let Some(v) =
            parse_var::<u64>("PORTPLAN_MIN_INTERVAL_SECS", get("PORTPLAN_MIN_INTERVAL_SECS"))
        {
            cfg.min_planning_interval = Duration::from_secs(v);
        }
        if let Some(v) =
            parse_var::<u64>("PORTPLAN_CYCLE_BUDGET_SECS", get("PORTPLAN_CYCLE_BUDGET_SECS"))
        {
            cfg.cycle_budget = Duration::from_secs(v);
        }
        if let Some(v) =
            parse_var::<usize>("PORTPLAN_MAX_EVALUATIONS", get("PORTPLAN_MAX_EVALUATIONS"))
        {
            cfg.max_evaluations_per_cycle = Some(v);
        }
        if let Some(v) =
            parse_var::<u64>("PORTPLAN_CLAIM_LEASE_SECS", get("PORTPLAN_CLAIM_LEASE_SECS"))
        {
            cfg.claim_lease = Duration::from_secs(v);
        }
        if let Some(v) = parse_var::<f64>("PORTPLAN_FEE_FIXED", get("PORTPLAN_FEE_FIXED")) {
            cfg.fees.fixed = v;
        }
        if let Some(v) = parse_var::<f64>("PORTPLAN_FEE_RATE", get("PORTPLAN_FEE_RATE")) {
            cfg.fees.rate = v;
        }
        if let Some(v) = parse_var::<f64>(
            "PORTPLAN_CONCENTRATION_LIMIT",
            get("PORTPLAN_CONCENTRATION_LIMIT"),
        ) {
            cfg.concentration_limit = v.clamp(0.0, 1.0);
        }
        if let Some(raw) = get("PORTPLAN_PATTERNS") {
            let parsed: Result<Vec<PatternType>, String> = raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::parse)
                .collect();
            match parsed {
                Ok(p) if !p.is_empty() => cfg.patterns = p,
                Ok(_) => warn!(key = "PORTPLAN_PATTERNS", "empty pattern list, keeping defaults"),
                Err(e) => warn!(key = "PORTPLAN_PATTERNS", error = %e, "ignoring invalid value"),
            }
        }

        cfg
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, raw: Option<String>) -> Option<T> {
    let raw = raw?;
    match raw.parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!(key, value = %raw, "ignoring unparsable config value");
            None
        }
    }
}
