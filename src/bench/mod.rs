//! Benchmark engine module
//!
//! Contains the benchmark coordinator, the per-thread worker loop, and the
//! command sequence parsing shared between them.

use serde::{Deserialize, Serialize};

pub mod command;
pub mod lifecycle;
pub(crate) mod worker;

// Re-export commonly used types
pub use command::LifecycleCommand;
pub use lifecycle::LifecycleBenchmark;

/// Benchmark lifecycle state. Transitions are monotonic:
/// `Created` → `Running` → `Completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum State {
    /// Constructed and probed, not yet running
    Created,
    /// Workers are executing iterations
    Running,
    /// All workers joined and results aggregated
    Completed,
}
