use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "portplan", about = "Multi-step portfolio rebalancing planner")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the content hash of a portfolio state
    Hash {
        /// Portfolio state JSON (holdings, cash, targets, base_currency, fx_rates), or @file
        state: String,
    },
    /// Run a planning cycle for a portfolio state
    Plan {
        /// Portfolio state JSON, or @file
        state: String,
        /// Candidate actions JSON array (symbol, side, quantity, price, opportunity_score), or @file.
        /// Without it, candidates are derived from target drift.
        #[arg(long)]
        candidates: Option<String>,
        /// Quotes for targeted symbols not yet held: {"SYM": {"price": 1.0, "currency": "EUR"}}, or @file
        #[arg(long, conflicts_with = "candidates")]
        quotes: Option<String>,
        /// Smallest weight gap that produces a drift trade
        #[arg(long, conflicts_with = "candidates")]
        min_drift: Option<f64>,
        /// Allow fractional quantities in drift trades
        #[arg(long, conflicts_with = "candidates")]
        fractional: bool,
        /// Ignore the minimum planning interval
        #[arg(long)]
        force: bool,
    },
    /// Continue evaluating pending sequences for a stored portfolio hash
    Resume {
        /// Portfolio hash
        hash: String,
    },
    /// Show the best plan found for a portfolio hash
    Best { hash: String },
    /// Count pending and completed sequences for a portfolio hash
    Pending { hash: String },
    /// List sequences for a portfolio hash in search order
    Sequences {
        hash: String,
        #[arg(long)]
        completed: Option<bool>,
        #[arg(long, default_value = "20")]
        limit: usize,
        /// Include each sequence's evaluation
        #[arg(long)]
        evaluations: bool,
    },
    /// Turn the best plan into pending recommendations
    Recommend { hash: String },
    /// List recommendations
    Recommendations {
        /// Status filter (pending, executed, dismissed)
        #[arg(long)]
        status: Option<String>,
        #[arg(long, default_value = "20")]
        limit: usize,
    },
    /// Mark a recommendation executed or dismissed
    RecommendationStatus {
        /// Recommendation ID
        id: String,
        /// New status (pending, executed, dismissed)
        status: String,
    },
    /// Show recent planning cycles
    History {
        #[arg(long, default_value = "20")]
        limit: usize,
    },
    /// Drop the stored best result for a portfolio hash
    Reset { hash: String },
}
