pub mod scoring;
pub mod sources;
pub mod sqlite;
