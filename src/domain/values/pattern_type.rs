use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Named template governing how candidates combine into a sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternType {
    /// One candidate on its own.
    Single,
    /// One SELL followed by BUYs whose cost fits in the sell's proceeds.
    SellToFundBuy,
    /// Any 2..D combination of distinct symbols, sells before buys.
    MultiLegRebalance,
}

impl PatternType {
    pub const ALL: [PatternType; 3] = [
        PatternType::Single,
        PatternType::SellToFundBuy,
        PatternType::MultiLegRebalance,
    ];
}

impl fmt::Display for PatternType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatternType::Single => write!(f, "single"),
            PatternType::SellToFundBuy => write!(f, "sell_to_fund_buy"),
            PatternType::MultiLegRebalance => write!(f, "multi_leg_rebalance"),
        }
    }
}

impl FromStr for PatternType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "single" | "single_action" => Ok(PatternType::Single),
            "sell_to_fund_buy" => Ok(PatternType::SellToFundBuy),
            "multi_leg_rebalance" | "multi_leg" => Ok(PatternType::MultiLegRebalance),
            _ => Err(format!("Unknown pattern type: {s}")),
        }
    }
}
