//! Sequence composition: expands ranked candidates into action sequences.
//!
//! Composition is pure CPU work. The caller persists the output with an
//! insert-or-ignore, so composing the same candidates twice for the same
//! portfolio hash never creates new pending work.

use std::collections::HashSet;

use tracing::debug;

use crate::domain::entities::action_sequence::{ActionCandidate, ActionSequence};
use crate::domain::error::DomainError;
use crate::domain::values::content_hash::PortfolioHash;
use crate::domain::values::pattern_type::PatternType;
use crate::domain::values::planner_config::PlannerConfig;

pub struct SequenceComposer {
    max_depth: usize,
    /// 0 disables truncation.
    fan_out_limit: usize,
    /// 0 disables the cap.
    max_sequences: usize,
    patterns: Vec<PatternType>,
}

impl SequenceComposer {
    pub fn new(config: &PlannerConfig) -> Self {
        Self {
            max_depth: config.max_depth.max(1),
            fan_out_limit: config.fan_out_limit,
            max_sequences: config.max_sequences_per_cycle,
            patterns: config.patterns.clone(),
        }
    }

    /// Build the deduplicated, search-ordered sequence set for one state.
    ///
    /// Malformed candidates are rejected as a whole batch; an empty
    /// candidate list yields an empty set.
    pub fn compose(
        &self,
        portfolio_hash: &PortfolioHash,
        candidates: &[ActionCandidate],
    ) -> Result<Vec<ActionSequence>, DomainError> {
        for c in candidates {
            c.validate()?;
        }
        let ranked = self.rank(candidates);
        if ranked.is_empty() {
            return Ok(Vec::new());
        }

        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for pattern in PatternType::ALL {
            if !self.patterns.contains(&pattern) {
                continue;
            }
            let lists = match pattern {
                PatternType::Single => single(&ranked),
                PatternType::SellToFundBuy => sell_to_fund_buy(&ranked, self.max_depth),
                PatternType::MultiLegRebalance => multi_leg(&ranked, self.max_depth),
            };
            let before = out.len();
            for actions in lists {
                let seq = ActionSequence::new(portfolio_hash.clone(), actions, pattern);
                // first template to produce an action list owns it
                if seen.insert(seq.sequence_hash.clone()) {
                    out.push(seq);
                }
            }
            debug!(pattern = %pattern, produced = out.len() - before, "pattern expanded");
        }

        out.sort_by(ActionSequence::search_order);
        if self.max_sequences > 0 && out.len() > self.max_sequences {
            debug!(
                total = out.len(),
                cap = self.max_sequences,
                "truncating composed sequences"
            );
            out.truncate(self.max_sequences);
        }
        Ok(out)
    }

    /// Highest opportunity score first, truncated to the fan-out limit.
    fn rank(&self, candidates: &[ActionCandidate]) -> Vec<ActionCandidate> {
        let mut ranked = candidates.to_vec();
        ranked.sort_by(|a, b| {
            b.opportunity_score
                .partial_cmp(&a.opportunity_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.symbol.cmp(&b.symbol))
                .then_with(|| a.side.cmp(&b.side))
        });
        if self.fan_out_limit > 0 {
            ranked.truncate(self.fan_out_limit);
        }
        ranked
    }
}

fn single(ranked: &[ActionCandidate]) -> Vec<Vec<ActionCandidate>> {
    ranked.iter().map(|c| vec![c.clone()]).collect()
}

/// One SELL followed by 1..D-1 BUYs whose gross cost fits within the
/// sell's gross proceeds. BUYs must trade in the sell's currency.
fn sell_to_fund_buy(ranked: &[ActionCandidate], max_depth: usize) -> Vec<Vec<ActionCandidate>> {
    if max_depth < 2 {
        return Vec::new();
    }
    let mut out = Vec::new();
    for sell in ranked.iter().filter(|c| c.side.is_sell()) {
        let buys: Vec<&ActionCandidate> = ranked
            .iter()
            .filter(|c| !c.side.is_sell() && c.symbol != sell.symbol && c.currency == sell.currency)
            .collect();
        let budget = sell.notional();
        for k in 1..max_depth {
            for combo in combinations(buys.len(), k) {
                let legs: Vec<&ActionCandidate> = combo.iter().map(|&i| buys[i]).collect();
                if !distinct_symbols(&legs) {
                    continue;
                }
                let cost: f64 = legs.iter().map(|c| c.notional()).sum();
                if cost > budget {
                    continue;
                }
                let mut actions = Vec::with_capacity(k + 1);
                actions.push(sell.clone());
                actions.extend(legs.into_iter().cloned());
                out.push(actions);
            }
        }
    }
    out
}

/// Every 2..D combination of distinct symbols, sells first, each side in
/// rank order.
fn multi_leg(ranked: &[ActionCandidate], max_depth: usize) -> Vec<Vec<ActionCandidate>> {
    let mut out = Vec::new();
    for k in 2..=max_depth.min(ranked.len()) {
        for combo in combinations(ranked.len(), k) {
            let legs: Vec<&ActionCandidate> = combo.iter().map(|&i| &ranked[i]).collect();
            if !distinct_symbols(&legs) {
                continue;
            }
            let (sells, buys): (Vec<&ActionCandidate>, Vec<&ActionCandidate>) =
                legs.into_iter().partition(|c| c.side.is_sell());
            out.push(sells.into_iter().chain(buys).cloned().collect());
        }
    }
    out
}

fn distinct_symbols(legs: &[&ActionCandidate]) -> bool {
    let mut seen = HashSet::new();
    legs.iter().all(|c| seen.insert(c.symbol.as_str()))
}

/// Index combinations of size `k` from `0..n`, in lexicographic order.
fn combinations(n: usize, k: usize) -> Vec<Vec<usize>> {
    if k == 0 || k > n {
        return Vec::new();
    }
    let mut out = Vec::new();
    let mut idx: Vec<usize> = (0..k).collect();
    loop {
        out.push(idx.clone());
        // rightmost position that can still move
        let mut i = k;
        while i > 0 && idx[i - 1] == n - k + (i - 1) {
            i -= 1;
        }
        if i == 0 {
            return out;
        }
        idx[i - 1] += 1;
        for j in i..k {
            idx[j] = idx[j - 1] + 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::values::side::Side;

    fn ph() -> PortfolioHash {
        PortfolioHash::from_hex("portfolio")
    }

    fn composer(max_depth: usize) -> SequenceComposer {
        SequenceComposer::new(&PlannerConfig {
            max_depth,
            ..PlannerConfig::default()
        })
    }

    fn aapl_msft() -> Vec<ActionCandidate> {
        vec![
            ActionCandidate::new("AAPL", Side::Buy, 10.0, 150.0, 0.8),
            ActionCandidate::new("MSFT", Side::Sell, 5.0, 400.0, 0.6),
        ]
    }

    #[test]
    fn test_combinations() {
        assert_eq!(combinations(3, 2), vec![vec![0, 1], vec![0, 2], vec![1, 2]]);
        assert_eq!(combinations(4, 3).len(), 4);
        assert!(combinations(2, 3).is_empty());
    }

    #[test]
    fn test_zero_candidates_is_empty() {
        assert!(composer(3).compose(&ph(), &[]).unwrap().is_empty());
    }

    #[test]
    fn test_depth_two_combines_sell_then_buy() {
        let seqs = composer(2).compose(&ph(), &aapl_msft()).unwrap();
        // two singles + one funded pair (the multi-leg duplicate collapses)
        assert_eq!(seqs.len(), 3);
        let pair = seqs.iter().find(|s| s.depth == 2).unwrap();
        assert_eq!(pair.pattern, PatternType::SellToFundBuy);
        assert_eq!(pair.actions[0].symbol, "MSFT");
        assert_eq!(pair.actions[0].side, Side::Sell);
        assert_eq!(pair.actions[1].symbol, "AAPL");
    }

    #[test]
    fn test_unfunded_buy_falls_back_to_multi_leg() {
        let cands = vec![
            ActionCandidate::new("AAPL", Side::Buy, 100.0, 150.0, 0.8),
            ActionCandidate::new("MSFT", Side::Sell, 5.0, 400.0, 0.6),
        ];
        let seqs = composer(2).compose(&ph(), &cands).unwrap();
        let pair = seqs.iter().find(|s| s.depth == 2).unwrap();
        assert_eq!(pair.pattern, PatternType::MultiLegRebalance);
        assert!(pair.actions[0].side.is_sell());
    }

    #[test]
    fn test_depth_one_only_singles() {
        let seqs = composer(1).compose(&ph(), &aapl_msft()).unwrap();
        assert_eq!(seqs.len(), 2);
        assert!(seqs.iter().all(|s| s.pattern == PatternType::Single));
        // higher score first
        assert_eq!(seqs[0].actions[0].symbol, "AAPL");
    }

    #[test]
    fn test_composition_is_deterministic() {
        let a = composer(3).compose(&ph(), &aapl_msft()).unwrap();
        let mut reversed = aapl_msft();
        reversed.reverse();
        let b = composer(3).compose(&ph(), &reversed).unwrap();
        let ha: Vec<_> = a.iter().map(|s| s.sequence_hash.clone()).collect();
        let hb: Vec<_> = b.iter().map(|s| s.sequence_hash.clone()).collect();
        assert_eq!(ha, hb);
    }

    #[test]
    fn test_same_symbol_never_repeats_in_a_sequence() {
        let cands = vec![
            ActionCandidate::new("AAPL", Side::Buy, 1.0, 150.0, 0.8),
            ActionCandidate::new("AAPL", Side::Sell, 1.0, 150.0, 0.7),
        ];
        let seqs = composer(3).compose(&ph(), &cands).unwrap();
        assert!(seqs.iter().all(|s| s.depth == 1));
    }

    #[test]
    fn test_fan_out_limit_truncates_before_combination() {
        let cands: Vec<ActionCandidate> = (0..20)
            .map(|i| ActionCandidate::new(format!("S{i:02}"), Side::Buy, 1.0, 10.0, i as f64 / 20.0))
            .collect();
        let c = SequenceComposer::new(&PlannerConfig {
            max_depth: 2,
            fan_out_limit: 4,
            max_sequences_per_cycle: 0,
            ..PlannerConfig::default()
        });
        let seqs = c.compose(&ph(), &cands).unwrap();
        // 4 singles + C(4,2) pairs
        assert_eq!(seqs.len(), 10);
        assert!(seqs
            .iter()
            .flat_map(|s| s.actions.iter())
            .all(|a| a.opportunity_score >= 16.0 / 20.0));
    }

    #[test]
    fn test_max_sequences_keeps_highest_priority() {
        let cands: Vec<ActionCandidate> = (0..5)
            .map(|i| ActionCandidate::new(format!("S{i}"), Side::Buy, 1.0, 10.0, 0.1 * (i + 1) as f64))
            .collect();
        let c = SequenceComposer::new(&PlannerConfig {
            max_depth: 3,
            max_sequences_per_cycle: 3,
            ..PlannerConfig::default()
        });
        let seqs = c.compose(&ph(), &cands).unwrap();
        assert_eq!(seqs.len(), 3);
        assert_eq!(seqs[0].actions[0].symbol, "S4");
        assert_eq!(seqs[0].depth, 1);
    }

    #[test]
    fn test_invalid_candidate_is_rejected() {
        let cands = vec![ActionCandidate::new("AAPL", Side::Buy, -1.0, 150.0, 0.8)];
        let err = composer(2).compose(&ph(), &cands).unwrap_err();
        assert!(matches!(err, DomainError::InvalidInput(_)));
    }
}
