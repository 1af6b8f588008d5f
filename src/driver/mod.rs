//! Engine driver contract
//!
//! Defines the capability set every pluggable container-engine backend
//! implements, the opaque container handle exchanged with drivers, and the
//! factory that is the core's sole injection point for engine plurality.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::AsyncRead;
use tokio_util::sync::CancellationToken;

use crate::config::EngineConfig;
use crate::{BenchError, Result};

pub mod docker;

pub use docker::DockerDriver;

/// Tag identifying a container engine backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EngineType {
    Docker,
    Containerd,
    Runc,
    Cri,
}

impl fmt::Display for EngineType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EngineType::Docker => "docker",
            EngineType::Containerd => "containerd",
            EngineType::Runc => "runc",
            EngineType::Cri => "cri",
        };
        f.write_str(name)
    }
}

/// Opaque handle for one container produced by [`Driver::create`] and
/// consumed by every subsequent driver operation in the same iteration.
#[derive(Debug, Clone)]
pub struct Container {
    name: String,
    image: String,
    command: Option<String>,
    detached: bool,
    trace: bool,
    pod_id: Option<String>,
}

impl Container {
    pub fn new(
        name: impl Into<String>,
        image: impl Into<String>,
        command: Option<&str>,
        detached: bool,
        trace: bool,
    ) -> Self {
        Self {
            name: name.into(),
            image: image.into(),
            command: command.map(str::to_string),
            detached,
            trace,
            pod_id: None,
        }
    }

    /// Attach the pod identifier used by pod-scoped engines
    pub fn with_pod_id(mut self, pod_id: impl Into<String>) -> Self {
        self.pod_id = Some(pod_id.into());
        self
    }

    /// Unique name of the container within this run
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Image reference the container is created from
    pub fn image(&self) -> &str {
        &self.image
    }

    /// Optional command override replacing the image default
    pub fn command(&self) -> Option<&str> {
        self.command.as_deref()
    }

    /// Whether the container should start detached
    pub fn detached(&self) -> bool {
        self.detached
    }

    /// Whether engine-side tracing is requested for this container
    pub fn trace(&self) -> bool {
        self.trace
    }

    /// Pod identifier, populated only by pod-scoped engines
    pub fn pod_id(&self) -> Option<&str> {
        self.pod_id.as_deref()
    }
}

/// Output captured from a completed engine operation together with the
/// wall-clock duration the driver measured across its external work.
#[derive(Debug, Clone)]
pub struct OpOutput {
    pub output: String,
    pub elapsed: Duration,
}

/// A failed engine operation.
///
/// Keeps whatever output and timing were observed before the failure so
/// callers can still record a duration sample for the attempt.
#[derive(Debug, Error)]
#[error("{source}")]
pub struct OpError {
    pub output: String,
    pub elapsed: Duration,
    #[source]
    pub source: BenchError,
}

impl From<OpError> for BenchError {
    fn from(err: OpError) -> Self {
        let output = err.output.trim();
        if output.is_empty() {
            err.source
        } else {
            BenchError::Driver(format!("{} (output: {})", err.source, output))
        }
    }
}

/// Result of a timed engine operation.
pub type OpResult = std::result::Result<OpOutput, OpError>;

/// Open byte stream returned by [`Driver::stats`]. The stream terminates
/// when the token supplied to `stats` is cancelled; the caller drains it.
pub type StatsStream = Box<dyn AsyncRead + Send + Unpin>;

/// Capability set of one engine-backend session.
///
/// A driver owns whatever backend resources it allocates and must be
/// released with [`Driver::close`] exactly once. Drivers are not assumed to
/// be safe for concurrent use; each benchmark worker owns its own instance.
#[async_trait]
pub trait Driver: Send {
    /// Engine backend this driver talks to
    fn engine_type(&self) -> EngineType;

    /// Descriptive engine string; also validates backend reachability for
    /// daemon-based engines
    async fn info(&self) -> Result<String>;

    /// Idempotent teardown of containers left over from prior harness runs,
    /// matched by the shared name prefix. Non-existence is success.
    async fn clean(&self) -> Result<()>;

    /// Allocate a container handle. For some engines this is purely
    /// metadata allocation and does not touch the backend.
    async fn create(
        &self,
        name: &str,
        image: &str,
        cmd_override: Option<&str>,
        detached: bool,
        trace: bool,
    ) -> Result<Container>;

    /// Start the container; blocks until the backend reports the start
    async fn run(&self, ctr: &Container) -> OpResult;

    /// Force cessation of the container (kill semantics)
    async fn stop(&self, ctr: &Container) -> OpResult;

    /// Delete all engine-side state for the container
    async fn remove(&self, ctr: &Container) -> OpResult;

    /// Pause the container; drivers without pause support return an error
    async fn pause(&self, ctr: &Container) -> OpResult;

    /// Resume a paused container; drivers without pause support return an
    /// error
    async fn unpause(&self, ctr: &Container) -> OpResult;

    /// Block until the container exits
    async fn wait(&self, ctr: &Container) -> OpResult;

    /// Open a streaming stats reader for the container. The stream
    /// terminates when `cancel` fires; the caller must drain it.
    async fn stats(&self, cancel: CancellationToken, ctr: &Container) -> Result<StatsStream>;

    /// Synchronous exec of `args` inside the running container
    async fn exec_sync(&self, ctr: &Container, args: &[String]) -> OpResult;

    /// Release driver-owned resources. Must be called exactly once.
    async fn close(&mut self) -> Result<()>;
}

/// Factory producing fresh driver instances bound to an engine config.
///
/// The benchmark core depends on no concrete driver; one instance is built
/// per worker so that backends with thread-unsafe clients stay isolated.
#[async_trait]
pub trait DriverFactory: Send + Sync {
    async fn new_driver(
        &self,
        cancel: CancellationToken,
        config: &EngineConfig,
    ) -> Result<Box<dyn Driver>>;
}

/// Default factory dispatching on the configured engine type.
#[derive(Debug, Default)]
pub struct EngineFactory;

#[async_trait]
impl DriverFactory for EngineFactory {
    async fn new_driver(
        &self,
        cancel: CancellationToken,
        config: &EngineConfig,
    ) -> Result<Box<dyn Driver>> {
        match config.engine {
            EngineType::Docker => Ok(Box::new(DockerDriver::new(cancel, config).await?)),
            other => Err(BenchError::UnsupportedEngine(other)),
        }
    }
}
