//! Container command execution.
//!
//! Runs commands in running containers through the exec API and collects
//! stdout, stderr and the exit code.

use crate::container::{ContainerError, Result};
use bollard::Docker;
use bollard::exec::{CreateExecOptions, StartExecResults};
use futures::stream::StreamExt;
use serde::Serialize;
use tracing::debug;

/// Execution configuration builder.
pub struct ExecConfigBuilder {
    cmd: Vec<String>,
    env: Vec<String>,
    working_dir: Option<String>,
    attach_stdin: bool,
    tty: bool,
}

impl Default for ExecConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecConfigBuilder {
    /// Create a new execution configuration builder.
    pub fn new() -> Self {
        Self {
            cmd: Vec::new(),
            env: Vec::new(),
            working_dir: None,
            attach_stdin: false,
            tty: false,
        }
    }

    /// Set the command to execute.
    pub fn cmd<I, S>(mut self, cmd: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cmd = cmd.into_iter().map(|s| s.into()).collect();
        self
    }

    /// Add an environment variable.
    pub fn env<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.env.push(format!("{}={}", key.into(), value.into()));
        self
    }

    /// Set the working directory.
    pub fn working_dir<S: Into<String>>(mut self, dir: S) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Attach to stdin.
    pub fn attach_stdin(mut self, attach: bool) -> Self {
        self.attach_stdin = attach;
        self
    }

    /// Enable TTY allocation.
    pub fn tty(mut self, enable: bool) -> Self {
        self.tty = enable;
        self
    }

    /// Build the execution configuration.
    pub fn build(self) -> ExecConfig {
        ExecConfig {
            cmd: self.cmd,
            env: self.env,
            working_dir: self.working_dir,
            attach_stdin: self.attach_stdin,
            tty: self.tty,
        }
    }
}

/// Container execution configuration.
#[derive(Debug, Clone)]
pub struct ExecConfig {
    cmd: Vec<String>,
    env: Vec<String>,
    working_dir: Option<String>,
    attach_stdin: bool,
    tty: bool,
}

impl ExecConfig {
    /// Create a new execution configuration builder.
    pub fn builder() -> ExecConfigBuilder {
        ExecConfigBuilder::new()
    }

    /// Get the command.
    pub fn cmd(&self) -> &[String] {
        &self.cmd
    }

    /// Get the environment as `KEY=value` entries.
    pub fn env(&self) -> &[String] {
        &self.env
    }

    /// Get the working directory.
    pub fn working_dir(&self) -> Option<&str> {
        self.working_dir.as_deref()
    }

    /// Whether a TTY is requested.
    pub fn tty(&self) -> bool {
        self.tty
    }

    /// Whether stdin is attached.
    pub fn attach_stdin(&self) -> bool {
        self.attach_stdin
    }
}

/// Output from command execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecOutput {
    /// Standard output
    pub stdout: String,
    /// Standard error
    pub stderr: String,
    /// Exit code (None if not available)
    pub exit_code: Option<i64>,
}

impl ExecOutput {
    /// Check if the command succeeded (exit code 0).
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Execute a command in a running container.
///
/// # Errors
///
/// Returns [`ContainerError::NotFound`] if the daemon does not know the
/// container, or an API error if the exec could not be run at all. A non-zero
/// exit code is not an error.
pub async fn execute(
    docker: &Docker,
    container_id: &str,
    config: &ExecConfig,
) -> Result<ExecOutput> {
    debug!(
        "Executing command in container {}: {:?}",
        container_id, config.cmd
    );

    let exec_options = CreateExecOptions {
        cmd: Some(config.cmd.clone()),
        env: if config.env.is_empty() {
            None
        } else {
            Some(config.env.clone())
        },
        working_dir: config.working_dir.clone(),
        attach_stdin: Some(config.attach_stdin),
        attach_stdout: Some(true),
        attach_stderr: Some(true),
        tty: Some(config.tty),
        ..Default::default()
    };

    let exec = docker
        .create_exec(container_id, exec_options)
        .await
        .map_err(|e| match e {
            bollard::errors::Error::DockerResponseServerError {
                status_code: 404, ..
            } => ContainerError::NotFound(container_id.to_string()),
            e => ContainerError::ApiError(e),
        })?;

    let start_results = docker.start_exec(&exec.id, None).await?;

    let mut stdout = String::new();
    let mut stderr = String::new();

    match start_results {
        StartExecResults::Attached { mut output, .. } => {
            while let Some(result) = output.next().await {
                match result {
                    Ok(bollard::container::LogOutput::StdOut { message }) => {
                        stdout.push_str(&String::from_utf8_lossy(&message));
                    }
                    Ok(bollard::container::LogOutput::StdErr { message }) => {
                        stderr.push_str(&String::from_utf8_lossy(&message));
                    }
                    Ok(bollard::container::LogOutput::Console { message }) => {
                        stdout.push_str(&String::from_utf8_lossy(&message));
                    }
                    Ok(_) => {}
                    Err(e) => {
                        return Err(ContainerError::ExecutionError(format!(
                            "Failed to read output: {}",
                            e
                        )));
                    }
                }
            }
        }
        StartExecResults::Detached => {
            return Err(ContainerError::ExecutionError(
                "Unexpected detached execution".to_string(),
            ));
        }
    }

    let inspect = docker.inspect_exec(&exec.id).await?;
    let exit_code = inspect.exit_code;

    debug!("Command executed with exit code: {:?}", exit_code);

    Ok(ExecOutput {
        stdout,
        stderr,
        exit_code,
    })
}
