//! ctrbench - container engine lifecycle micro-benchmarks
//!
//! Measures per-operation latency and error rates of container lifecycle
//! commands (create, run, stop, remove, pause, unpause, wait, stats, exec)
//! against pluggable engine drivers under a configurable concurrent
//! workload.

use thiserror::Error;

pub mod bench;
pub mod config;
pub mod driver;
pub mod models;
pub mod util;

/// Common error type for all benchmark and driver operations.
#[derive(Debug, Error)]
pub enum BenchError {
    /// I/O failure while talking to an engine binary or stream
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Configuration validation error
    #[error("configuration error: {0}")]
    Config(String),
    /// Engine driver reported a failure
    #[error("driver error: {0}")]
    Driver(String),
    /// The configured engine type has no driver implementation
    #[error("no driver implementation for engine {0}")]
    UnsupportedEngine(driver::EngineType),
    /// The single-container validation lifecycle failed
    #[error("driver validation: error {phase} test container: {source}")]
    Validation {
        phase: &'static str,
        #[source]
        source: Box<BenchError>,
    },
    /// Benchmark coordination error
    #[error("benchmark error: {0}")]
    Bench(String),
    /// The ambient cancellation token fired while an operation was in flight
    #[error("operation cancelled")]
    Cancelled,
}

/// Result type alias for ctrbench operations
pub type Result<T> = std::result::Result<T, BenchError>;

pub const APP_NAME: &str = "ctrbench";

/// Name prefix for every container this harness creates. Drivers match on
/// it during `clean`, so generated names and cleanup stay in sync.
pub const CONTAINER_NAME_PREFIX: &str = "ctb-ctr";
