pub mod action_sequence;
pub mod best_result;
pub mod cycle_run;
pub mod evaluation;
pub mod portfolio_state;
pub mod recommendation;
pub mod simulation;
