//! Single command invocation inside one package directory.

use std::collections::BTreeMap;
use std::process::Stdio;
use std::time::Instant;

use tokio::process::Command;
use tracing::{debug, warn};

use crate::package::Package;
use crate::result::{ExecutionResult, ExecutionStatus};

/// A command string plus the environment it runs with.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandSpec {
    pub command: String,
    pub env: BTreeMap<String, String>,
}

impl CommandSpec {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            env: BTreeMap::new(),
        }
    }

    /// Adds environment variables, replacing existing keys.
    pub fn with_env<I, K, V>(mut self, env: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env
            .extend(env.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Layers this command's environment over `base`. Keys set here win.
    pub fn merged_env(&self, base: &BTreeMap<String, String>) -> BTreeMap<String, String> {
        let mut merged = base.clone();
        merged.extend(self.env.iter().map(|(k, v)| (k.clone(), v.clone())));
        merged
    }
}

/// Runs `spec` through `sh -c` with the package directory as working
/// directory.
///
/// Output is captured fully; both pipes are drained while the child runs.
/// Failure to spawn is reported as a failed result without an exit code.
pub async fn run_in_package(package: &Package, index: usize, spec: &CommandSpec) -> ExecutionResult {
    let start = Instant::now();
    debug!(package = %package.name, command = %spec.command, "spawning");

    let output = Command::new("sh")
        .arg("-c")
        .arg(&spec.command)
        .current_dir(&package.path)
        .envs(&spec.env)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await;

    let duration = start.elapsed();
    match output {
        Ok(output) => {
            let status = if output.status.success() {
                ExecutionStatus::Success
            } else {
                ExecutionStatus::Failure
            };
            debug!(
                package = %package.name,
                status = %status,
                code = ?output.status.code(),
                elapsed_ms = duration.as_millis() as u64,
                "finished"
            );
            ExecutionResult {
                package: package.name.clone(),
                index,
                status,
                exit_code: output.status.code(),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                duration,
                error: None,
                command: spec.command.clone(),
            }
        }
        Err(e) => {
            warn!(package = %package.name, error = %e, "failed to spawn command");
            ExecutionResult {
                package: package.name.clone(),
                index,
                status: ExecutionStatus::Failure,
                exit_code: None,
                stdout: String::new(),
                stderr: String::new(),
                duration,
                error: Some(format!(
                    "failed to run in {}: {}",
                    package.path.display(),
                    e
                )),
                command: spec.command.clone(),
            }
        }
    }
}
