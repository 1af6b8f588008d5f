//! Shared mock engine driver and factory for integration tests.
//!
//! The mock records every interesting interaction (containers created,
//! exec args, stream cancellations, driver closes) and can be scripted to
//! fail specific operations, so tests can assert both the happy path and
//! the error-counting behavior of the benchmark core.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;

use ctrbench::bench::LifecycleBenchmark;
use ctrbench::config::EngineConfig;
use ctrbench::driver::{
    Container, Driver, DriverFactory, EngineType, OpError, OpOutput, OpResult, StatsStream,
};
use ctrbench::{BenchError, Result};

/// Scripted failure behavior for mock drivers of one run.
#[derive(Debug, Clone, Default)]
pub struct MockScript {
    /// Fail `create` when the container's (thread, iteration) matches
    pub fail_create_at: Option<(usize, usize)>,
    /// Fail `stop` on odd iteration indices
    pub fail_stop_on_odd: bool,
    /// Canonical keys whose operations always fail
    pub fail_commands: HashSet<&'static str>,
    /// Fail opening the stats stream
    pub fail_stats_open: bool,
    /// Fixed latency added to every lifecycle operation
    pub op_delay: Option<Duration>,
    /// 0-based driver construction index that fails (the coordinator's
    /// driver is index 0)
    pub fail_driver_at: Option<usize>,
    /// Fail `clean` on every call after the first (the post-run cleanup)
    pub fail_final_clean: bool,
}

/// Observations recorded across all mock driver instances of a run.
#[derive(Debug, Default)]
pub struct MockRecorder {
    pub created: Mutex<Vec<String>>,
    pub exec_args: Mutex<Vec<Vec<String>>>,
    pub drivers_built: AtomicUsize,
    pub drivers_closed: AtomicUsize,
    pub cleans: AtomicUsize,
    pub streams_opened: AtomicUsize,
    pub streams_cancelled: AtomicUsize,
}

pub struct MockDriver {
    script: MockScript,
    recorder: Arc<MockRecorder>,
}

/// Recover (thread, iteration) from a generated container name; names that
/// do not end in two numeric segments map to (0, 0).
fn ids_of(name: &str) -> (usize, usize) {
    let mut parts = name.rsplit('-');
    let iteration = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);
    let thread = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);
    (thread, iteration)
}

impl MockDriver {
    async fn op(&self, key: &'static str, ctr: &Container) -> OpResult {
        let start = Instant::now();
        if let Some(delay) = self.script.op_delay {
            tokio::time::sleep(delay).await;
        }

        let (_, iteration) = ids_of(ctr.name());
        let fail = self.script.fail_commands.contains(key)
            || (key == "stop" && self.script.fail_stop_on_odd && iteration % 2 == 1);

        if fail {
            Err(OpError {
                output: format!("mock {key} failure output"),
                elapsed: start.elapsed(),
                source: BenchError::Driver(format!("mock {key}: exit status 1")),
            })
        } else {
            Ok(OpOutput {
                output: String::new(),
                elapsed: start.elapsed(),
            })
        }
    }
}

#[async_trait]
impl Driver for MockDriver {
    fn engine_type(&self) -> EngineType {
        EngineType::Docker
    }

    async fn info(&self) -> Result<String> {
        Ok("mock driver (in-memory)".to_string())
    }

    async fn clean(&self) -> Result<()> {
        let calls = self.recorder.cleans.fetch_add(1, Ordering::SeqCst);
        if self.script.fail_final_clean && calls > 0 {
            return Err(BenchError::Driver("mock cleanup failure".to_string()));
        }
        Ok(())
    }

    async fn create(
        &self,
        name: &str,
        image: &str,
        cmd_override: Option<&str>,
        detached: bool,
        trace: bool,
    ) -> Result<Container> {
        if self.script.fail_create_at == Some(ids_of(name)) {
            return Err(BenchError::Driver(format!("mock create failure for {name}")));
        }
        self.recorder
            .created
            .lock()
            .expect("created lock")
            .push(name.to_string());
        Ok(Container::new(name, image, cmd_override, detached, trace))
    }

    async fn run(&self, ctr: &Container) -> OpResult {
        self.op("run", ctr).await
    }

    async fn stop(&self, ctr: &Container) -> OpResult {
        self.op("stop", ctr).await
    }

    async fn remove(&self, ctr: &Container) -> OpResult {
        self.op("remove", ctr).await
    }

    async fn pause(&self, ctr: &Container) -> OpResult {
        self.op("pause", ctr).await
    }

    async fn unpause(&self, ctr: &Container) -> OpResult {
        self.op("resume", ctr).await
    }

    async fn wait(&self, ctr: &Container) -> OpResult {
        self.op("wait", ctr).await
    }

    async fn stats(&self, cancel: CancellationToken, _ctr: &Container) -> Result<StatsStream> {
        if self.script.fail_stats_open {
            return Err(BenchError::Driver("mock stats failure".to_string()));
        }
        self.recorder.streams_opened.fetch_add(1, Ordering::SeqCst);

        let (mut writer, reader) = tokio::io::duplex(64);
        let recorder = Arc::clone(&self.recorder);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        recorder.streams_cancelled.fetch_add(1, Ordering::SeqCst);
                        break;
                    }
                    _ = tokio::time::sleep(Duration::from_millis(1)) => {
                        if writer.write_all(b"{\"cpu\":0}\n").await.is_err() {
                            break;
                        }
                    }
                }
            }
            // dropping the writer hands the draining reader its EOF
        });

        Ok(Box::new(reader))
    }

    async fn exec_sync(&self, ctr: &Container, args: &[String]) -> OpResult {
        self.recorder
            .exec_args
            .lock()
            .expect("exec args lock")
            .push(args.to_vec());
        self.op("execsync", ctr).await
    }

    async fn close(&mut self) -> Result<()> {
        self.recorder.drivers_closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub struct MockFactory {
    script: MockScript,
    recorder: Arc<MockRecorder>,
}

impl MockFactory {
    pub fn new(script: MockScript) -> (Arc<Self>, Arc<MockRecorder>) {
        let recorder = Arc::new(MockRecorder::default());
        let factory = Arc::new(Self {
            script,
            recorder: Arc::clone(&recorder),
        });
        (factory, recorder)
    }
}

#[async_trait]
impl DriverFactory for MockFactory {
    async fn new_driver(
        &self,
        _cancel: CancellationToken,
        _config: &EngineConfig,
    ) -> Result<Box<dyn Driver>> {
        let index = self.recorder.drivers_built.fetch_add(1, Ordering::SeqCst);
        if self.script.fail_driver_at == Some(index) {
            return Err(BenchError::Driver(format!(
                "mock driver construction failure at index {index}"
            )));
        }
        Ok(Box::new(MockDriver {
            script: self.script.clone(),
            recorder: Arc::clone(&self.recorder),
        }))
    }
}

/// Build an initialized benchmark wired to a scripted mock factory.
pub async fn mock_benchmark(script: MockScript) -> (LifecycleBenchmark, Arc<MockRecorder>) {
    let (factory, recorder) = MockFactory::new(script);
    let bench = LifecycleBenchmark::init(
        "mock-bench",
        "busybox:latest",
        None,
        false,
        EngineConfig::new(EngineType::Docker),
        factory,
        CancellationToken::new(),
    )
    .await
    .expect("benchmark init");
    (bench, recorder)
}

pub fn seq(commands: &[&str]) -> Vec<String> {
    commands.iter().map(|c| c.to_string()).collect()
}

/// Sorted duration keys of a record, for exact-set assertions.
pub fn duration_keys(record: &ctrbench::models::RunStatistics) -> Vec<String> {
    let mut keys: Vec<String> = record.durations.keys().cloned().collect();
    keys.sort_unstable();
    keys
}
