//! Benchmark worker loop
//!
//! Drives one command sequence over one fresh container per iteration on a
//! dedicated driver instance and emits one statistics record per completed
//! iteration on a private channel. Driver errors are data: they are counted
//! and logged, never propagated.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::bench::command::LifecycleCommand;
use crate::driver::Driver;
use crate::models::RunStatistics;
use crate::CONTAINER_NAME_PREFIX;

/// Inputs shared read-only by every worker of one run.
#[derive(Debug)]
pub(crate) struct Workload {
    pub image: String,
    pub cmd_override: Option<String>,
    pub trace: bool,
    pub commands: Vec<String>,
}

/// Run `iterations` passes of the command sequence, one fresh container
/// per iteration, on a driver owned exclusively by this worker.
///
/// The driver is closed and the statistics channel dropped on every exit
/// path, including an abort after a failed `create`.
pub(crate) async fn run_worker(
    mut driver: Box<dyn Driver>,
    thread: usize,
    iterations: usize,
    workload: Arc<Workload>,
    cancel: CancellationToken,
    stats_tx: mpsc::Sender<RunStatistics>,
) {
    for iteration in 0..iterations {
        let mut durations = HashMap::new();
        let mut errors: HashMap<String, u32> = HashMap::new();

        let name = format!("{CONTAINER_NAME_PREFIX}-{thread}-{iteration}");
        let ctr = match driver
            .create(
                &name,
                &workload.image,
                workload.cmd_override.as_deref(),
                true,
                workload.trace,
            )
            .await
        {
            Ok(ctr) => ctr,
            Err(err) => {
                // every later command needs the handle, so the worker is done
                error!(
                    thread,
                    container = %name,
                    image = %workload.image,
                    "error creating container, aborting worker: {err}"
                );
                break;
            }
        };

        // bounds any streaming stats call to the current iteration
        let stats_cancel = cancel.child_token();

        for raw in &workload.commands {
            let Some(command) = LifecycleCommand::parse(raw) else {
                error!(thread, command = %raw, "unrecognized command in sequence, skipping");
                continue;
            };
            let key = command.key();
            debug!(thread, command = key, "running command");

            if command == LifecycleCommand::Metrics {
                let opened = Instant::now();
                match driver.stats(stats_cancel.clone(), &ctr).await {
                    Ok(mut reader) => {
                        durations.insert(key.to_string(), opened.elapsed());
                        // the overhead of collecting stats is the
                        // measurement; the payload itself is discarded
                        tokio::spawn(async move {
                            let _ = tokio::io::copy(&mut reader, &mut tokio::io::sink()).await;
                        });
                    }
                    Err(err) => {
                        durations.insert(key.to_string(), opened.elapsed());
                        *errors.entry(key.to_string()).or_insert(0) += 1;
                        warn!(
                            thread,
                            container = %ctr.name(),
                            "error opening stats stream: {err}"
                        );
                    }
                }
                continue;
            }

            let result = match &command {
                LifecycleCommand::Run => driver.run(&ctr).await,
                LifecycleCommand::Stop => driver.stop(&ctr).await,
                LifecycleCommand::Remove => driver.remove(&ctr).await,
                LifecycleCommand::Pause => driver.pause(&ctr).await,
                LifecycleCommand::Unpause => driver.unpause(&ctr).await,
                LifecycleCommand::Wait => driver.wait(&ctr).await,
                LifecycleCommand::ExecSync(args) => driver.exec_sync(&ctr, args).await,
                // handled above so the stream can be scoped to the iteration
                LifecycleCommand::Metrics => continue,
            };

            match result {
                Ok(out) => {
                    durations.insert(key.to_string(), out.elapsed);
                    debug!(thread, command = key, output = %out.output, "command complete");
                }
                Err(err) => {
                    durations.insert(key.to_string(), err.elapsed);
                    *errors.entry(key.to_string()).or_insert(0) += 1;
                    warn!(
                        thread,
                        container = %ctr.name(),
                        command = key,
                        output = %err.output,
                        "error during container command: {}",
                        err.source
                    );
                }
            }
        }

        // terminates any still-streaming stats reader for this iteration
        stats_cancel.cancel();

        let record = RunStatistics::new(durations, errors);
        if stats_tx.send(record).await.is_err() {
            // receiver gone: the run was aborted and results are discarded
            debug!(thread, iteration, "statistics receiver dropped");
        }
    }

    if let Err(err) = driver.close().await {
        error!(thread, "error closing driver: {err}");
    }
}
