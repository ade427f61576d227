pub mod best_result;
pub mod compose;
pub mod evaluate;
pub mod planner;
pub mod recommendations;
