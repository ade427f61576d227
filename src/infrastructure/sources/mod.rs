pub mod static_source;
pub mod target_drift;
