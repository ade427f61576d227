pub mod best_result_repository;
pub mod cycle_repository;
pub mod opportunity_source;
pub mod recommendation_repository;
pub mod scoring;
pub mod sequence_repository;
