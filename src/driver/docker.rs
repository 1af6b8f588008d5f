//! Docker engine driver
//!
//! Drives the Docker engine through its client binary. Instance metadata is
//! not protected for concurrent use; the benchmark gives every worker its
//! own driver instance.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::driver::{Container, Driver, EngineType, OpResult, StatsStream};
use crate::util::proc::{exec_timed, resolve_binary};
use crate::{BenchError, Result, CONTAINER_NAME_PREFIX};

const DEFAULT_DOCKER_BINARY: &str = "docker";

/// Driver for the Docker engine backed by the `docker` client binary.
pub struct DockerDriver {
    binary: PathBuf,
    info: String,
    log_driver: Option<String>,
    stream_stats: bool,
    cancel: CancellationToken,
}

impl DockerDriver {
    /// Create a Docker driver from the engine configuration, resolving the
    /// client binary and probing the daemon.
    pub async fn new(cancel: CancellationToken, config: &EngineConfig) -> Result<Self> {
        let binary_path = if config.binary_path.is_empty() {
            DEFAULT_DOCKER_BINARY
        } else {
            &config.binary_path
        };
        let binary = resolve_binary(binary_path)?;

        let mut driver = Self {
            binary,
            info: String::new(),
            log_driver: config.log_driver.clone(),
            stream_stats: config.stream_stats,
            cancel,
        };
        driver.info = driver.probe_info().await?;

        debug!(
            info = %driver.info,
            log_driver = ?driver.log_driver,
            "docker driver ready"
        );
        Ok(driver)
    }

    /// Query version and daemon info, condensed into a single line.
    async fn probe_info(&self) -> Result<String> {
        let version = self.exec_checked(&["version"]).await?;
        let daemon = self.exec_checked(&["info"]).await.map_err(|err| {
            BenchError::Driver(format!("error retrieving docker daemon info: {err}"))
        })?;

        Ok(format!(
            "docker driver (binary: {})\n{}",
            self.binary.display(),
            condense_daemon_info(&version, &daemon)
        ))
    }

    /// Run the client binary, discarding timing and failing on any error.
    async fn exec_checked(&self, args: &[&str]) -> Result<String> {
        match exec_timed(&self.cancel, &self.binary, args).await {
            Ok(out) => Ok(out.output),
            Err(err) => Err(err.into()),
        }
    }

    async fn timed(&self, args: &[&str]) -> OpResult {
        exec_timed(&self.cancel, &self.binary, args).await
    }

    /// List container ids matching the harness name prefix. `all` includes
    /// exited containers.
    async fn harness_container_ids(&self, all: bool) -> Result<Vec<String>> {
        let filter = format!("name={CONTAINER_NAME_PREFIX}");
        let args: Vec<&str> = if all {
            vec!["ps", "-aq", "-f", &filter]
        } else {
            vec!["ps", "-q", "-f", &filter]
        };
        let listing = self.exec_checked(&args).await?;
        Ok(listing.split_whitespace().map(str::to_string).collect())
    }
}

/// Assemble the `docker run` argument list for a container handle.
fn run_args(ctr: &Container, log_driver: Option<&str>) -> Vec<String> {
    let mut args = vec!["run".to_string()];

    if ctr.detached() {
        args.push("-d".to_string());
    }
    if let Some(log_driver) = log_driver {
        args.push("--log-driver".to_string());
        args.push(log_driver.to_string());
    }

    args.push("--name".to_string());
    args.push(ctr.name().to_string());
    args.push(ctr.image().to_string());

    if let Some(command) = ctr.command() {
        args.extend(command.split_whitespace().map(str::to_string));
    }

    args
}

#[async_trait]
impl Driver for DockerDriver {
    fn engine_type(&self) -> EngineType {
        EngineType::Docker
    }

    async fn info(&self) -> Result<String> {
        Ok(self.info.clone())
    }

    async fn clean(&self) -> Result<()> {
        info!("docker: stopping harness containers from prior runs");
        match self.harness_container_ids(false).await {
            Ok(ids) if !ids.is_empty() => {
                let mut args = vec!["stop"];
                args.extend(ids.iter().map(String::as_str));
                if let Err(err) = self.exec_checked(&args).await {
                    warn!("docker: failed to stop running {CONTAINER_NAME_PREFIX} containers: {err}");
                }
            }
            Ok(_) => {}
            Err(err) => warn!("docker: failed to list running harness containers: {err}"),
        }

        info!("docker: removing exited harness containers");
        match self.harness_container_ids(true).await {
            Ok(ids) if !ids.is_empty() => {
                let mut args = vec!["rm", "-f"];
                args.extend(ids.iter().map(String::as_str));
                if let Err(err) = self.exec_checked(&args).await {
                    warn!("docker: failed to remove {CONTAINER_NAME_PREFIX} containers: {err}");
                }
            }
            Ok(_) => {}
            Err(err) => warn!("docker: failed to list harness containers: {err}"),
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
        // docker defers all engine-side work to `run`; creation is pure
        // metadata allocation
        Ok(Container::new(name, image, cmd_override, detached, trace))
    }

    async fn run(&self, ctr: &Container) -> OpResult {
        let args = run_args(ctr, self.log_driver.as_deref());
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        self.timed(&args).await
    }

    async fn stop(&self, ctr: &Container) -> OpResult {
        self.timed(&["kill", ctr.name()]).await
    }

    async fn remove(&self, ctr: &Container) -> OpResult {
        self.timed(&["rm", ctr.name()]).await
    }

    async fn pause(&self, ctr: &Container) -> OpResult {
        self.timed(&["pause", ctr.name()]).await
    }

    async fn unpause(&self, ctr: &Container) -> OpResult {
        self.timed(&["unpause", ctr.name()]).await
    }

    async fn wait(&self, ctr: &Container) -> OpResult {
        self.timed(&["wait", ctr.name()]).await
    }

    async fn stats(&self, cancel: CancellationToken, ctr: &Container) -> Result<StatsStream> {
        let mut cmd = Command::new(&self.binary);
        if self.stream_stats {
            cmd.args(["stats", ctr.name()]);
        } else {
            cmd.args(["stats", "--no-stream", ctr.name()]);
        }
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(BenchError::Io)?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| BenchError::Driver("docker stats produced no stdout".to_string()))?;

        // the stream is scoped to one iteration; the token kills the child
        // so the reader observes EOF
        tokio::spawn(async move {
            cancel.cancelled().await;
            let _ = child.kill().await;
        });

        Ok(Box::new(stdout))
    }

    async fn exec_sync(&self, ctr: &Container, args: &[String]) -> OpResult {
        let mut full: Vec<&str> = vec!["exec", ctr.name()];
        full.extend(args.iter().map(String::as_str));
        self.timed(&full).await
    }

    async fn close(&mut self) -> Result<()> {
        // the docker client binary holds no session state to release
        Ok(())
    }
}

/// Condense `docker version` and `docker info` output into one line of
/// client and server facts.
fn condense_daemon_info(version: &str, info: &str) -> String {
    let mut client_version = String::new();
    let mut client_api = String::new();
    let mut server_version = String::new();

    for line in version.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        match key.trim() {
            "Version" => {
                if client_version.is_empty() {
                    // first occurrence is the client section
                    client_version = value.to_string();
                } else {
                    server_version = value.to_string();
                }
            }
            "API version" => {
                if client_api.is_empty() {
                    client_api = value.to_string();
                    client_version = format!("{client_version}|API:{value}");
                } else {
                    server_version = format!("{server_version}|API:{value}");
                }
            }
            _ => {}
        }
    }

    for line in info.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        match key.trim() {
            "Kernel Version" => server_version = format!("{server_version}|Kernel:{value}"),
            "Storage Driver" => server_version = format!("{server_version}|Storage:{value}"),
            "Backing Filesystem" => server_version = format!("{server_version}|BackingFS:{value}"),
            _ => {}
        }
    }

    format!("[CLIENT:{client_version}][SERVER:{server_version}]")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_args_detached_with_overrides() {
        let ctr = Container::new("ctb-ctr-0-1", "busybox:latest", Some("sleep 30"), true, false);
        let args = run_args(&ctr, Some("json-file"));
        assert_eq!(
            args,
            vec![
                "run",
                "-d",
                "--log-driver",
                "json-file",
                "--name",
                "ctb-ctr-0-1",
                "busybox:latest",
                "sleep",
                "30",
            ]
        );
    }

    #[test]
    fn test_run_args_minimal() {
        let ctr = Container::new("ctb-ctr-2-0", "alpine", None, false, false);
        assert_eq!(
            run_args(&ctr, None),
            vec!["run", "--name", "ctb-ctr-2-0", "alpine"]
        );
    }

    #[test]
    fn test_condense_daemon_info() {
        let version = "\
Client:
 Version: 24.0.7
 API version: 1.43

Server:
 Version: 24.0.7
 API version: 1.43
";
        let info = "\
 Kernel Version: 6.1.0
 Storage Driver: overlay2
  Backing Filesystem: extfs
";
        let condensed = condense_daemon_info(version, info);
        assert_eq!(
            condensed,
            "[CLIENT:24.0.7|API:1.43][SERVER:24.0.7|API:1.43|Kernel:6.1.0|Storage:overlay2|BackingFS:extfs]"
        );
    }

    #[test]
    fn test_condense_daemon_info_empty_input() {
        assert_eq!(condense_daemon_info("", ""), "[CLIENT:][SERVER:]");
    }
}
