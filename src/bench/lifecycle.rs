//! Benchmark coordinator
//!
//! Owns the run configuration, spawns one worker per thread (each with its
//! own driver instance), joins them, and aggregates the per-thread
//! statistics channels into a single run result.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::bench::worker::{run_worker, Workload};
use crate::bench::State;
use crate::config::EngineConfig;
use crate::driver::{Driver, DriverFactory, EngineType};
use crate::models::RunStatistics;
use crate::{BenchError, Result, CONTAINER_NAME_PREFIX};

/// Pause between stop and remove during validation; stopped-state metadata
/// is eventually consistent on some engines.
const QUIESCE_DELAY: Duration = Duration::from_millis(50);

/// Coordinator for one container-lifecycle benchmark.
///
/// Holds its own driver instance for probing and cleanup; every worker
/// thread gets a fresh instance from the factory because drivers are not
/// assumed safe for concurrent use.
pub struct LifecycleBenchmark {
    name: String,
    config: EngineConfig,
    image: String,
    cmd_override: Option<String>,
    trace: bool,
    factory: Arc<dyn DriverFactory>,
    cancel: CancellationToken,
    driver: Box<dyn Driver>,
    stats: Vec<RunStatistics>,
    elapsed: Duration,
    state_tx: watch::Sender<State>,
}

impl LifecycleBenchmark {
    /// Initialize the benchmark: build the coordinator driver, probe the
    /// backend, and normalize the pre-run environment.
    pub async fn init(
        name: impl Into<String>,
        image: impl Into<String>,
        cmd_override: Option<String>,
        trace: bool,
        config: EngineConfig,
        factory: Arc<dyn DriverFactory>,
        cancel: CancellationToken,
    ) -> Result<Self> {
        config.validate()?;

        let driver = factory.new_driver(cancel.clone(), &config).await?;

        // also validates that daemon-based backends are up and reachable
        let info = driver.info().await?;
        info!(driver = %info, "driver initialized");

        driver.clean().await?;

        let (state_tx, _) = watch::channel(State::Created);
        Ok(Self {
            name: name.into(),
            config,
            image: image.into(),
            cmd_override,
            trace,
            factory,
            cancel,
            driver,
            stats: Vec::new(),
            elapsed: Duration::ZERO,
            state_tx,
        })
    }

    /// Run one full container lifecycle against the coordinator driver,
    /// failing fast with the offending phase named.
    pub async fn validate(&self) -> Result<()> {
        let name = format!("{CONTAINER_NAME_PREFIX}-validate");
        let ctr = self
            .driver
            .create(&name, &self.image, self.cmd_override.as_deref(), true, self.trace)
            .await
            .map_err(|err| BenchError::Validation {
                phase: "creating",
                source: Box::new(err),
            })?;

        self.driver.run(&ctr).await.map_err(|err| BenchError::Validation {
            phase: "running",
            source: Box::new(err.into()),
        })?;

        self.driver.stop(&ctr).await.map_err(|err| BenchError::Validation {
            phase: "stopping",
            source: Box::new(err.into()),
        })?;

        // let the stopped state quiesce in engine metadata before removal
        tokio::time::sleep(QUIESCE_DELAY).await;

        self.driver.remove(&ctr).await.map_err(|err| BenchError::Validation {
            phase: "removing",
            source: Box::new(err.into()),
        })?;

        Ok(())
    }

    /// Execute the benchmark: `threads` workers each run `commands` for
    /// `iterations` iterations on a fresh container per iteration.
    ///
    /// A per-thread driver construction failure aborts the run; workers
    /// already spawned run to completion and their output is discarded.
    pub async fn run(
        &mut self,
        threads: usize,
        iterations: usize,
        commands: &[String],
    ) -> Result<()> {
        if threads == 0 {
            return Err(BenchError::Config(
                "thread count must be at least 1".to_string(),
            ));
        }
        if iterations == 0 {
            return Err(BenchError::Config(
                "iteration count must be at least 1".to_string(),
            ));
        }

        info!(
            benchmark = %self.name,
            threads,
            iterations,
            "starting lifecycle benchmark run"
        );

        let workload = Arc::new(Workload {
            image: self.image.clone(),
            cmd_override: self.cmd_override.clone(),
            trace: self.trace,
            commands: commands.to_vec(),
        });

        self.state_tx.send_replace(State::Running);
        let start = Instant::now();

        let mut receivers = Vec::with_capacity(threads);
        let mut handles = Vec::with_capacity(threads);
        for thread in 0..threads {
            // one driver per thread, so backends with thread-unsafe
            // clients stay isolated
            let driver = self
                .factory
                .new_driver(self.cancel.clone(), &self.config)
                .await
                .map_err(|err| {
                    BenchError::Driver(format!(
                        "error creating new driver for thread {thread}: {err}"
                    ))
                })?;

            // capacity covers every record a worker can emit, so a send
            // never blocks before the post-join drain
            let (tx, rx) = mpsc::channel(iterations);
            receivers.push(rx);
            handles.push(tokio::spawn(run_worker(
                driver,
                thread,
                iterations,
                Arc::clone(&workload),
                self.cancel.clone(),
                tx,
            )));
        }

        for (thread, handle) in handles.into_iter().enumerate() {
            if let Err(err) = handle.await {
                error!(thread, "worker task failed to join: {err}");
            }
        }
        self.elapsed = start.elapsed();

        info!(
            benchmark = %self.name,
            elapsed = ?self.elapsed,
            "benchmark threads complete"
        );

        // drain in thread order so the aggregate keeps (thread, iteration)
        // ordering
        for mut rx in receivers {
            while let Some(record) = rx.recv().await {
                self.stats.push(record);
            }
        }

        self.state_tx.send_replace(State::Completed);

        // a cleanup failure is reported but the collected results stand
        if let Err(err) = self.driver.clean().await {
            return Err(BenchError::Driver(format!(
                "error during final cleanup: {err}"
            )));
        }
        Ok(())
    }

    /// Aggregated per-iteration records, in (thread, iteration) order.
    /// Empty until the benchmark has completed.
    pub fn stats(&self) -> &[RunStatistics] {
        if self.state() == State::Completed {
            &self.stats
        } else {
            &[]
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> State {
        *self.state_tx.borrow()
    }

    /// Watch receiver for observing state transitions concurrently
    pub fn subscribe_state(&self) -> watch::Receiver<State> {
        self.state_tx.subscribe()
    }

    /// Total wall-clock duration from run start to workers joined
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Engine backend this benchmark targets
    pub fn engine_type(&self) -> EngineType {
        self.config.engine
    }

    /// Benchmark name supplied at init
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Descriptive driver string for the configured backend
    pub async fn info(&self) -> Result<String> {
        self.driver.info().await
    }

    /// Release the coordinator's driver instance.
    pub async fn close(&mut self) -> Result<()> {
        self.driver.close().await
    }
}
