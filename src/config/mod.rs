//! Engine configuration module
//!
//! Holds the immutable driver configuration shared read-only between the
//! benchmark coordinator and the driver factory.

use serde::{Deserialize, Serialize};

use crate::driver::EngineType;
use crate::{BenchError, Result};

/// Configuration handed to the driver factory for every driver instance.
///
/// The record is constructed once per benchmark and only ever shared by
/// reference afterwards; drivers copy out whatever they need.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Engine backend the benchmark targets
    pub engine: EngineType,
    /// Path to the engine client binary; empty selects the driver default
    pub binary_path: String,
    /// Log driver handed to the engine on container start, if any
    pub log_driver: Option<String>,
    /// Whether drivers should keep stats streams open until cancelled
    pub stream_stats: bool,
}

impl EngineConfig {
    /// Create a configuration for the given engine with driver defaults
    pub fn new(engine: EngineType) -> Self {
        Self {
            engine,
            binary_path: String::new(),
            log_driver: None,
            stream_stats: true,
        }
    }

    /// Set an explicit client binary path
    pub fn with_binary_path(mut self, path: impl Into<String>) -> Self {
        self.binary_path = path.into();
        self
    }

    /// Set the log driver passed through to container starts
    pub fn with_log_driver(mut self, log_driver: impl Into<String>) -> Self {
        self.log_driver = Some(log_driver.into());
        self
    }

    /// Set whether stats streams stay open until their token is cancelled
    pub fn with_stream_stats(mut self, stream: bool) -> Self {
        self.stream_stats = stream;
        self
    }

    /// Validate the configuration parameters
    pub fn validate(&self) -> Result<()> {
        if self.binary_path.chars().any(char::is_whitespace) {
            return Err(BenchError::Config(format!(
                "binary path must be a single path, got {:?}",
                self.binary_path
            )));
        }

        if let Some(log_driver) = &self.log_driver {
            if log_driver.is_empty() {
                return Err(BenchError::Config(
                    "log driver must not be empty when set".to_string(),
                ));
            }
        }

        Ok(())
    }
}
