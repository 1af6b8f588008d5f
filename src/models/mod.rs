//! Data models module
//!
//! Contains the per-iteration run statistics record emitted by benchmark
//! workers and aggregated by the coordinator.

pub mod result;

pub use result::RunStatistics;
