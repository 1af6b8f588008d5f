//! Timed subprocess execution
//!
//! Runs engine client binaries, measuring wall-clock across the whole
//! invocation and capturing combined output. In-flight commands race the
//! ambient cancellation token and are killed when it fires.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Instant;

use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use crate::driver::{OpError, OpOutput, OpResult};
use crate::{BenchError, Result};

/// Resolve a binary name or path to an executable file.
///
/// Names without a path separator are searched on `PATH`; explicit paths
/// are only checked for existence and executability.
pub fn resolve_binary(binary: &str) -> Result<PathBuf> {
    let candidate = Path::new(binary);
    if candidate.components().count() > 1 {
        if is_executable(candidate) {
            return Ok(candidate.to_path_buf());
        }
        return Err(BenchError::Config(format!(
            "binary {binary:?} does not exist or is not executable"
        )));
    }

    let path_var = std::env::var_os("PATH").unwrap_or_default();
    for dir in std::env::split_paths(&path_var) {
        let full = dir.join(binary);
        if is_executable(&full) {
            return Ok(full);
        }
    }

    Err(BenchError::Config(format!(
        "binary {binary:?} not found on PATH"
    )))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// Run `binary` with `args`, returning combined output and elapsed time.
///
/// A non-zero exit status is an error; the captured output and measured
/// duration are preserved on both paths. Cancellation of `cancel` kills
/// the child and surfaces as [`BenchError::Cancelled`].
pub async fn exec_timed(cancel: &CancellationToken, binary: &Path, args: &[&str]) -> OpResult {
    let start = Instant::now();

    let mut cmd = Command::new(binary);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let child = cmd.spawn().map_err(|err| OpError {
        output: String::new(),
        elapsed: start.elapsed(),
        source: BenchError::Io(err),
    })?;

    let wait = child.wait_with_output();
    tokio::pin!(wait);

    let output = tokio::select! {
        result = &mut wait => result.map_err(|err| OpError {
            output: String::new(),
            elapsed: start.elapsed(),
            source: BenchError::Io(err),
        })?,
        _ = cancel.cancelled() => {
            // dropping the wait future reaps the child via kill_on_drop
            return Err(OpError {
                output: String::new(),
                elapsed: start.elapsed(),
                source: BenchError::Cancelled,
            });
        }
    };

    let elapsed = start.elapsed();
    let combined = combine_output(&output.stdout, &output.stderr);

    if output.status.success() {
        Ok(OpOutput {
            output: combined,
            elapsed,
        })
    } else {
        Err(OpError {
            output: combined,
            elapsed,
            source: BenchError::Driver(format!(
                "{} {} exited with {}",
                binary.display(),
                args.join(" "),
                output.status
            )),
        })
    }
}

fn combine_output(stdout: &[u8], stderr: &[u8]) -> String {
    let mut combined = String::from_utf8_lossy(stdout).into_owned();
    if !stderr.is_empty() {
        if !combined.is_empty() && !combined.ends_with('\n') {
            combined.push('\n');
        }
        combined.push_str(&String::from_utf8_lossy(stderr));
    }
    combined
}
