//! Subprocess runner shared by every bridge operation.
//!
//! One call spawns one child, optionally feeds it a stdin payload, drains
//! stdout and stderr concurrently and waits for exit, all under a deadline.

use std::io;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{ChildStdin, Command};
use tracing::{debug, warn};

use super::{InvocationResult, Outcome, StreamKind};

const READ_CHUNK: usize = 8 * 1024;

/// Everything needed to run the child once.
#[derive(Debug, Clone)]
pub(crate) struct Launch {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub stdin: Option<String>,
    pub output_limit: Option<usize>,
    pub timeout: Duration,
    /// Shown in logs and failure messages.
    pub command_line: String,
}

#[derive(Error, Debug)]
enum ExchangeError {
    #[error("{stream} maxBuffer length exceeded")]
    LimitExceeded { stream: StreamKind, limit: usize },

    #[error("{0}")]
    Io(#[from] io::Error),
}

pub(crate) async fn run(launch: Launch) -> InvocationResult {
    let started = Instant::now();

    let mut cmd = Command::new(&launch.program);
    cmd.args(&launch.args)
        .stdin(if launch.stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    if let Some(ref cwd) = launch.cwd {
        cmd.current_dir(cwd);
    }

    // The child leads its own group so a kill also reaches the tool behind
    // `sh -c` and anything else it forked.
    #[cfg(unix)]
    cmd.process_group(0);

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => {
            return InvocationResult::new(
                Outcome::SpawnFailure {
                    message: format!("spawn {} {}", launch.program, e),
                },
                &[],
                &[],
                launch.command_line,
                started.elapsed(),
            );
        }
    };

    let stdin = child.stdin.take();
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let mut stdout_buf = Vec::new();
    let mut stderr_buf = Vec::new();

    let outcome = {
        let exchange = async {
            tokio::try_join!(
                feed_stdin(stdin, launch.stdin.as_deref()),
                drain(stdout, &mut stdout_buf, launch.output_limit, StreamKind::Stdout),
                drain(stderr, &mut stderr_buf, launch.output_limit, StreamKind::Stderr),
            )?;
            Ok::<_, ExchangeError>(child.wait().await?)
        };

        match tokio::time::timeout(launch.timeout, exchange).await {
            Ok(Ok(status)) if status.success() => Outcome::Success,
            Ok(Ok(status)) => Outcome::NonZeroExit {
                code: status.code(),
            },
            Ok(Err(ExchangeError::LimitExceeded { stream, limit })) => {
                Outcome::OutputLimitExceeded { stream, limit }
            }
            Ok(Err(ExchangeError::Io(e))) => Outcome::SpawnFailure {
                message: e.to_string(),
            },
            Err(_) => Outcome::TimedOut {
                after: launch.timeout,
            },
        }
    };

    if !outcome.process_exited() {
        #[cfg(unix)]
        if let Some(pid) = child.id() {
            kill_process_group(pid, &launch.program);
        }
        if let Err(e) = child.kill().await {
            warn!(program = %launch.program, "Failed to kill child process: {}", e);
        }
    }

    InvocationResult::new(
        outcome,
        &stdout_buf,
        &stderr_buf,
        launch.command_line,
        started.elapsed(),
    )
}

#[cfg(unix)]
fn kill_process_group(pid: u32, program: &str) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    if let Err(e) = killpg(Pid::from_raw(pid as i32), Signal::SIGKILL) {
        // ESRCH: the whole group is already gone
        if e != nix::errno::Errno::ESRCH {
            warn!(program = %program, "Failed to kill process group {}: {}", pid, e);
        }
    }
}

/// Writes the payload, flushes and closes stdin. A broken pipe means the
/// child exited without reading, which is not an error for the caller.
async fn feed_stdin(stdin: Option<ChildStdin>, payload: Option<&str>) -> Result<(), ExchangeError> {
    let Some(mut stdin) = stdin else {
        return Ok(());
    };

    if let Some(payload) = payload {
        let written = async {
            stdin.write_all(payload.as_bytes()).await?;
            stdin.flush().await?;
            stdin.shutdown().await
        }
        .await;

        match written {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
                debug!("Child closed stdin before the payload was written");
            }
            Err(e) => return Err(e.into()),
        }
    }

    drop(stdin);
    Ok(())
}

/// Appends chunks in arrival order until EOF. With a limit, the buffer is
/// truncated to the limit and the read stops once it is crossed.
async fn drain<R>(
    reader: Option<R>,
    buf: &mut Vec<u8>,
    limit: Option<usize>,
    stream: StreamKind,
) -> Result<(), ExchangeError>
where
    R: AsyncRead + Unpin,
{
    let Some(mut reader) = reader else {
        return Ok(());
    };

    let mut chunk = [0u8; READ_CHUNK];
    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            return Ok(());
        }
        buf.extend_from_slice(&chunk[..n]);

        if let Some(limit) = limit {
            if buf.len() > limit {
                buf.truncate(limit);
                return Err(ExchangeError::LimitExceeded { stream, limit });
            }
        }
    }
}
