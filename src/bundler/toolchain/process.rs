//! External process execution with streamed output.

use super::ToolInvocation;
use crate::bundler::error::{Error, Result};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};

type Listener = Box<dyn FnMut(&[u8]) + Send>;

/// Handle to a spawned external process.
///
/// Listeners can only be attached while the handle is alive; [`wait_for`]
/// consumes it, so nothing can be registered once the process has finished.
///
/// [`wait_for`]: ProcessHandle::wait_for
pub struct ProcessHandle {
    command: String,
    child: Child,
    stdout_listeners: Vec<Listener>,
    stderr_listeners: Vec<Listener>,
}

impl std::fmt::Debug for ProcessHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessHandle")
            .field("command", &self.command)
            .field("stdout_listeners", &self.stdout_listeners.len())
            .field("stderr_listeners", &self.stderr_listeners.len())
            .finish()
    }
}

impl ProcessHandle {
    /// Spawns `invocation` with both output streams piped.
    pub fn spawn(invocation: &ToolInvocation) -> Result<Self> {
        let command = invocation.command_line();
        let mut cmd = Command::new(invocation.program());
        cmd.args(invocation.arguments())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = invocation.working_dir() {
            cmd.current_dir(dir);
        }

        let child = cmd.spawn().map_err(|error| Error::CommandFailed {
            command: command.clone(),
            error,
        })?;

        Ok(Self {
            command,
            child,
            stdout_listeners: Vec::new(),
            stderr_listeners: Vec::new(),
        })
    }

    /// Registers a listener for stdout chunks.
    pub fn add_stdout_listener(&mut self, listener: impl FnMut(&[u8]) + Send + 'static) -> &mut Self {
        self.stdout_listeners.push(Box::new(listener));
        self
    }

    /// Registers a listener for stderr chunks.
    pub fn add_stderr_listener(&mut self, listener: impl FnMut(&[u8]) + Send + 'static) -> &mut Self {
        self.stderr_listeners.push(Box::new(listener));
        self
    }

    /// Waits for the process to exit and returns its exit code.
    ///
    /// Both streams are drained to EOF before the exit status is collected,
    /// so every chunk has reached the listeners by the time this returns.
    /// A non-zero code is returned as-is; a process killed by a signal reports `-1`.
    pub async fn wait_for(mut self) -> Result<i32> {
        let stdout = self.child.stdout.take();
        let stderr = self.child.stderr.take();
        let mut stdout_listeners = std::mem::take(&mut self.stdout_listeners);
        let mut stderr_listeners = std::mem::take(&mut self.stderr_listeners);

        tokio::join!(
            pump(stdout, &mut stdout_listeners),
            pump(stderr, &mut stderr_listeners)
        );

        let status = self.child.wait().await.map_err(|error| Error::CommandFailed {
            command: self.command.clone(),
            error,
        })?;

        Ok(status.code().unwrap_or(-1))
    }
}

async fn pump<R: AsyncRead + Unpin>(reader: Option<R>, listeners: &mut [Listener]) {
    let Some(reader) = reader else {
        return;
    };

    let mut reader = BufReader::new(reader);
    let mut chunk = Vec::new();
    loop {
        chunk.clear();
        match reader.read_until(b'\n', &mut chunk).await {
            Ok(0) => break,
            Ok(_) => {
                for listener in listeners.iter_mut() {
                    listener(&chunk);
                }
            }
            Err(e) => {
                log::debug!("Stopped reading process output: {}", e);
                break;
            }
        }
    }
}
