#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::{
    ffi::{OsStr, OsString},
    io::Write,
    path::Path,
    process::Stdio,
    time::Duration,
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::{
    io::{AsyncReadExt, BufReader},
    process::{Child, Command},
    time::timeout,
};

/// Drop guard that terminates a spawned child process if callers forget to
/// await it.
struct ChildDropGuard(Option<Child>);

impl ChildDropGuard {
    /// Wraps the provided child process with the drop guard.
    fn new(child: Child) -> Self {
        Self(Some(child))
    }

    /// Returns a mutable reference to the underlying child process.
    fn child_mut(&mut self) -> anyhow::Result<&mut Child> {
        self.0
            .as_mut()
            .context("child process already taken from guard")
    }

    /// Prevents the guard from killing the process on drop.
    fn disarm(mut self) {
        self.0 = None;
    }
}

impl Drop for ChildDropGuard {
    fn drop(&mut self) {
        if let Some(child) = self.0.as_mut() {
            let _ = child.start_kill();
        }
    }
}

/// How one supervised execution terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionStatus {
    /// The process exited on its own before the deadline.
    Completed(i32),
    /// The deadline elapsed and the process was forcibly terminated.
    TimedOut,
    /// The process died on a signal before the deadline.
    Killed(i32),
}

/// Captured result of a finished subprocess.
#[derive(Debug)]
pub struct Collected {
    /// Exit status returned by the process.
    pub status: std::process::ExitStatus,
    /// Contents written to stdout.
    pub stdout: Vec<u8>,
    /// Contents written to stderr.
    pub stderr: Vec<u8>,
}

/// Result of one artifact execution whose stdout went to a capture file.
#[derive(Debug)]
pub struct Execution {
    /// How the process terminated.
    pub status: ExecutionStatus,
    /// Contents written to stderr.
    pub stderr: Vec<u8>,
}

/// Classifies a finished process's exit status.
fn classify_exit(status: std::process::ExitStatus) -> ExecutionStatus {
    match status.code() {
        Some(code) => ExecutionStatus::Completed(code),
        None => killed_status(status),
    }
}

/// Maps a signal death to its status.
#[cfg(unix)]
fn killed_status(status: std::process::ExitStatus) -> ExecutionStatus {
    use std::os::unix::process::ExitStatusExt;
    ExecutionStatus::Killed(status.signal().unwrap_or(-1))
}

/// Maps a signal death to its status.
#[cfg(not(unix))]
fn killed_status(_status: std::process::ExitStatus) -> ExecutionStatus {
    ExecutionStatus::Killed(-1)
}

/// Spawns a command with no stdin attached and collects stdout/stderr in
/// memory. Used for compiler invocations; a `deadline` overrun is an error.
pub async fn run_collect(
    program: impl AsRef<OsStr>,
    args: &[OsString],
    cwd: Option<&Path>,
    deadline: Option<Duration>,
) -> Result<Collected> {
    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }

    let mut guard = ChildDropGuard::new(cmd.spawn().context("failed to spawn process")?);

    let stdout = guard
        .child_mut()?
        .stdout
        .take()
        .context("missing stdout pipe")?;
    let stderr = guard
        .child_mut()?
        .stderr
        .take()
        .context("missing stderr pipe")?;

    let out_task = tokio::spawn(async move {
        let mut reader = BufReader::new(stdout);
        let mut buf = Vec::new();
        reader
            .read_to_end(&mut buf)
            .await
            .context("failed to read stdout")?;
        Ok::<Vec<u8>, anyhow::Error>(buf)
    });

    let err_task = tokio::spawn(async move {
        let mut reader = BufReader::new(stderr);
        let mut buf = Vec::new();
        reader
            .read_to_end(&mut buf)
            .await
            .context("failed to read stderr")?;
        Ok::<Vec<u8>, anyhow::Error>(buf)
    });

    let wait_future = async move {
        let mut guard = guard;
        let status = guard
            .child_mut()?
            .wait()
            .await
            .context("failed to wait on process")?;
        let stdout = out_task.await.context("stdout task join error")??;
        let stderr = err_task.await.context("stderr task join error")??;
        guard.disarm();
        Ok(Collected {
            status,
            stdout,
            stderr,
        })
    };

    match deadline {
        Some(limit) => timeout(limit, wait_future)
            .await
            .context("subprocess timed out")?,
        None => wait_future.await,
    }
}

/// Runs one artifact with no stdin, stdout redirected to `capture`, and a
/// hard wall-clock `deadline`.
///
/// On expiry the process is killed with no grace period and the capture
/// gains a sentinel line naming the PID and the timeout, so a grader can
/// tell the truncation apart from program output.
pub async fn run_to_capture(
    program: impl AsRef<OsStr>,
    capture: &Path,
    deadline: Duration,
) -> Result<Execution> {
    let capture_file = std::fs::File::create(capture)
        .with_context(|| format!("Could not create capture file {}", capture.display()))?;

    let mut cmd = Command::new(program);
    cmd.stdin(Stdio::null())
        .stdout(Stdio::from(capture_file))
        .stderr(Stdio::piped());

    let mut guard = ChildDropGuard::new(cmd.spawn().context("failed to spawn artifact")?);
    let pid = guard.child_mut()?.id().unwrap_or_default();

    let stderr = guard
        .child_mut()?
        .stderr
        .take()
        .context("missing stderr pipe")?;
    let err_task = tokio::spawn(async move {
        let mut reader = BufReader::new(stderr);
        let mut buf = Vec::new();
        reader
            .read_to_end(&mut buf)
            .await
            .context("failed to read stderr")?;
        Ok::<Vec<u8>, anyhow::Error>(buf)
    });

    let waited = {
        let child = guard.child_mut()?;
        timeout(deadline, child.wait()).await
    };

    let status = match waited {
        Ok(status) => classify_exit(status.context("failed to wait on artifact")?),
        Err(_) => {
            let child = guard.child_mut()?;
            child.kill().await.context("failed to kill timed-out artifact")?;
            append_timeout_sentinel(capture, pid, deadline)?;
            ExecutionStatus::TimedOut
        }
    };

    let stderr = err_task.await.context("stderr task join error")??;
    guard.disarm();

    Ok(Execution { status, stderr })
}

/// Appends the timeout diagnostic line to a capture file.
fn append_timeout_sentinel(capture: &Path, pid: u32, deadline: Duration) -> Result<()> {
    let mut file = std::fs::OpenOptions::new()
        .append(true)
        .open(capture)
        .with_context(|| format!("Could not reopen capture file {}", capture.display()))?;
    writeln!(
        file,
        "Process {pid} is killed after {} seconds timeout.",
        deadline.as_secs_f64()
    )
    .context("Could not append the timeout sentinel")?;
    Ok(())
}
