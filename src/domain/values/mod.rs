pub mod content_hash;
pub mod cycle_state;
pub mod metrics;
pub mod pattern_type;
pub mod planner_config;
pub mod recommendation_status;
pub mod side;
