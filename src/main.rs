use clap::Parser;
use portplan::cli::commands::{Cli, Commands};
use portplan::domain::entities::action_sequence::ActionCandidate;
use portplan::domain::entities::portfolio_state::PortfolioState;
use portplan::domain::ports::opportunity_source::OpportunitySource;
use portplan::domain::values::content_hash::PortfolioHash;
use portplan::domain::values::recommendation_status::RecommendationStatus;
use portplan::infrastructure::sources::static_source::StaticSource;
use portplan::infrastructure::sources::target_drift::{Quote, TargetDriftSource};
use portplan::PortPlan;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let log_level = std::env::var("PORTPLAN_LOG_LEVEL").unwrap_or_else(|_| "info".into());
    let log_format = std::env::var("PORTPLAN_LOG_FORMAT").unwrap_or_else(|_| "pretty".into());
    portplan::logging::init_logging(&log_level, &log_format);

    let db_path = std::env::var("PORTPLAN_DB").unwrap_or_else(|_| "./portplan.db".into());

    if let Err(e) = run_command(&db_path, cli.command).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn open(db_path: &str, source: Arc<dyn OpportunitySource>) -> Result<PortPlan, Box<dyn std::error::Error>> {
    PortPlan::new(db_path, source).map_err(|e| format!("Error initializing planner: {e}").into())
}

async fn run_command(db_path: &str, cmd: Commands) -> Result<(), Box<dyn std::error::Error>> {
    match cmd {
        Commands::Hash { state } => {
            let state: PortfolioState = parse_json_arg(&state)?;
            state.validate()?;
            println!("{}", state.hash());
        }
        Commands::Plan {
            state,
            candidates,
            quotes,
            min_drift,
            fractional,
            force,
        } => {
            let state: PortfolioState = parse_json_arg(&state)?;
            let source: Arc<dyn OpportunitySource> = match candidates {
                Some(raw) => {
                    let candidates: Vec<ActionCandidate> = parse_json_arg(&raw)?;
                    Arc::new(StaticSource::new(candidates))
                }
                None => {
                    let quotes: BTreeMap<String, Quote> = match quotes {
                        Some(raw) => parse_json_arg(&raw)?,
                        None => BTreeMap::new(),
                    };
                    let mut drift = TargetDriftSource::new(quotes).with_fractional(fractional);
                    if let Some(min_drift) = min_drift {
                        drift = drift.with_min_drift(min_drift);
                    }
                    Arc::new(drift)
                }
            };
            let pp = open(db_path, source)?;
            let report = if force {
                pp.force_planning_cycle(&state).await?
            } else {
                pp.run_planning_cycle(&state).await?
            };
            print_json(&report)?;
        }
        Commands::Resume { hash } => {
            let pp = open(db_path, Arc::new(StaticSource::default()))?;
            let report = pp.resume_cycle(&PortfolioHash::from_hex(hash)).await?;
            print_json(&report)?;
        }
        Commands::Best { hash } => {
            let pp = open(db_path, Arc::new(StaticSource::default()))?;
            match pp.best_result(&PortfolioHash::from_hex(hash.clone()))? {
                Some(best) => print_json(&best)?,
                None => return Err(format!("No best result for {hash}").into()),
            }
        }
        Commands::Pending { hash } => {
            let pp = open(db_path, Arc::new(StaticSource::default()))?;
            let hash = PortfolioHash::from_hex(hash);
            print_json(&serde_json::json!({
                "portfolio_hash": hash,
                "pending": pp.count_pending(&hash)?,
                "completed": pp.count_completed(&hash)?,
            }))?;
        }
        Commands::Sequences {
            hash,
            completed,
            limit,
            evaluations,
        } => {
            let pp = open(db_path, Arc::new(StaticSource::default()))?;
            let hash = PortfolioHash::from_hex(hash);
            let sequences = pp.list_sequences(&hash, completed, Some(limit))?;
            if evaluations {
                let mut rows = Vec::with_capacity(sequences.len());
                for seq in sequences {
                    let evaluation = pp.get_evaluation(&seq.sequence_hash, &hash)?;
                    rows.push(serde_json::json!({ "sequence": seq, "evaluation": evaluation }));
                }
                print_json(&rows)?;
            } else {
                print_json(&sequences)?;
            }
        }
        Commands::Recommend { hash } => {
            let pp = open(db_path, Arc::new(StaticSource::default()))?;
            let recs = pp.materialize_recommendations(&PortfolioHash::from_hex(hash))?;
            print_json(&recs)?;
        }
        Commands::Recommendations { status, limit } => {
            let pp = open(db_path, Arc::new(StaticSource::default()))?;
            let status: Option<RecommendationStatus> = status
                .map(|s| s.parse())
                .transpose()
                .map_err(|e: String| e)?;
            let recs = pp.recommendations(status, Some(limit))?;
            print_json(&recs)?;
        }
        Commands::RecommendationStatus { id, status } => {
            let pp = open(db_path, Arc::new(StaticSource::default()))?;
            let st: RecommendationStatus = status.parse().map_err(|e: String| e)?;
            pp.set_recommendation_status(&id, st)?;
            println!("Recommendation {id} marked {st}");
        }
        Commands::History { limit } => {
            let pp = open(db_path, Arc::new(StaticSource::default()))?;
            print_json(&pp.cycle_history(limit)?)?;
        }
        Commands::Reset { hash } => {
            let pp = open(db_path, Arc::new(StaticSource::default()))?;
            if pp.reset_best_result(&PortfolioHash::from_hex(hash.clone()))? {
                println!("Best result for {hash} reset");
            } else {
                println!("No best result for {hash}");
            }
        }
    }
    Ok(())
}

/// Inline JSON, or `@path` to read it from a file.
fn parse_json_arg<T: serde::de::DeserializeOwned>(raw: &str) -> Result<T, Box<dyn std::error::Error>> {
    let text = match raw.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(path).map_err(|e| format!("Cannot read {path}: {e}"))?,
        None => raw.to_string(),
    };
    Ok(serde_json::from_str(&text)?)
}

fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
