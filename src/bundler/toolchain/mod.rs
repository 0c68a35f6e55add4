//! External tool execution.
//!
//! Every external program the packager drives, on the host or inside a
//! container, goes through the [`CommandRunner`] seam:
//!
//! - [`process`] - spawning and streaming output of a single process
//! - [`container`] - docker/podman invocation building and working directories
//! - [`detection`] - discovering which container engine is installed

pub mod container;
pub mod detection;
pub mod process;

pub use container::{
    BUILDER_IMAGE, ContainerEngine, ContainerRunner, EngineKind, VolumeMount, WORK_MOUNT, quote,
};
pub use detection::{CONTAINER_ENGINE, select_engine, select_engine_with};
pub use process::ProcessHandle;

use crate::bundler::error::{Error, Result};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

/// A program plus its arguments, ready to be executed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInvocation {
    program: String,
    args: Vec<String>,
    working_dir: Option<PathBuf>,
}

impl ToolInvocation {
    /// Starts an invocation of `program` with no arguments.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
        }
    }

    /// Appends one argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Appends one path argument.
    pub fn path_arg(self, path: &Path) -> Self {
        self.arg(path.to_string_lossy())
    }

    /// Appends several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Runs the program from `dir`.
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Program to execute.
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Arguments, excluding the program.
    pub fn arguments(&self) -> &[String] {
        &self.args
    }

    /// Directory the program is started from, if any.
    pub fn working_dir(&self) -> Option<&Path> {
        self.working_dir.as_deref()
    }

    /// Space-joined command line, for logs and diagnostics.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Final result of a terminated process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Exit code; `-1` when the process was killed by a signal.
    pub code: i32,
    /// Everything written to stdout.
    pub stdout: String,
    /// Everything written to stderr.
    pub stderr: String,
}

impl ProcessOutput {
    /// Whether the process exited with code 0.
    pub fn success(&self) -> bool {
        self.code == 0
    }
}

/// Executes tool invocations.
///
/// A non-zero exit code is not an error at this level; callers decide
/// whether a step is required ([`require_success`]) or best-effort.
pub trait CommandRunner: Send + Sync {
    /// Runs `invocation` to completion and returns its exit code and output.
    fn output(
        &self,
        invocation: &ToolInvocation,
    ) -> impl Future<Output = Result<ProcessOutput>> + Send;
}

/// Runs tools as child processes of this host.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostRunner;

impl CommandRunner for HostRunner {
    async fn output(&self, invocation: &ToolInvocation) -> Result<ProcessOutput> {
        log::debug!("Running: {}", invocation.command_line());

        let mut handle = ProcessHandle::spawn(invocation)?;
        let stdout = Arc::new(Mutex::new(Vec::new()));
        let stderr = Arc::new(Mutex::new(Vec::new()));

        let stdout_sink = stdout.clone();
        let stderr_sink = stderr.clone();
        handle
            .add_stdout_listener(move |chunk| {
                log::debug!("  {}", String::from_utf8_lossy(chunk).trim_end());
                stdout_sink
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .extend_from_slice(chunk);
            })
            .add_stderr_listener(move |chunk| {
                log::debug!("  ! {}", String::from_utf8_lossy(chunk).trim_end());
                stderr_sink
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .extend_from_slice(chunk);
            });

        let code = handle.wait_for().await?;

        let stdout = std::mem::take(&mut *stdout.lock().unwrap_or_else(PoisonError::into_inner));
        let stderr = std::mem::take(&mut *stderr.lock().unwrap_or_else(PoisonError::into_inner));

        Ok(ProcessOutput {
            code,
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
        })
    }
}

/// Runs `invocation` and fails with [`Error::ToolFailed`] on a non-zero exit.
pub async fn require_success<R: CommandRunner>(
    runner: &R,
    invocation: &ToolInvocation,
    step: &str,
) -> Result<ProcessOutput> {
    let output = runner.output(invocation).await?;
    if !output.success() {
        log::error!(
            "{} failed (exit code {}): {}",
            step,
            output.code,
            output.stderr.trim()
        );
        return Err(Error::ToolFailed {
            step: step.to_string(),
            code: output.code,
        });
    }
    Ok(output)
}
