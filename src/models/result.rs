//! Benchmark run record models
//!
//! One `RunStatistics` record is emitted per completed iteration of the
//! command sequence, carrying per-command wall-clock durations and error
//! counts plus the UTC completion time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Timings and error counts for one iteration of the command sequence.
///
/// `durations` holds one entry per attempted recognized command, keyed by
/// the canonical command name; `errors` holds an entry only for commands
/// that failed at least once in this iteration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunStatistics {
    /// Wall-clock duration per canonical command key
    #[serde(with = "duration_map_serde")]
    pub durations: HashMap<String, Duration>,
    /// Failure count per canonical command key
    pub errors: HashMap<String, u32>,
    /// UTC wall-clock at iteration completion
    pub timestamp: DateTime<Utc>,
}

impl RunStatistics {
    /// Create a record stamped with the current UTC time
    pub fn new(durations: HashMap<String, Duration>, errors: HashMap<String, u32>) -> Self {
        Self {
            durations,
            errors,
            timestamp: Utc::now(),
        }
    }

    /// Duration recorded for a canonical command key, if the command ran
    pub fn duration(&self, key: &str) -> Option<Duration> {
        self.durations.get(key).copied()
    }

    /// Error count for a canonical command key; absent keys count as zero
    pub fn error_count(&self, key: &str) -> u32 {
        self.errors.get(key).copied().unwrap_or(0)
    }

    /// Longest single command duration within this iteration
    pub fn max_duration(&self) -> Duration {
        self.durations.values().copied().max().unwrap_or_default()
    }
}

// Serializes the duration map as whole nanoseconds keyed by command name.
mod duration_map_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::collections::HashMap;
    use std::time::Duration;

    pub fn serialize<S>(
        durations: &HashMap<String, Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let nanos_map: HashMap<&str, u128> = durations
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_nanos()))
            .collect();
        nanos_map.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<HashMap<String, Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let nanos_map = HashMap::<String, u128>::deserialize(deserializer)?;
        Ok(nanos_map
            .into_iter()
            .map(|(k, v)| (k, Duration::from_nanos(v as u64)))
            .collect())
    }
}
