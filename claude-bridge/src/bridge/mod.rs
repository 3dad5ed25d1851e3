//! Process bridge
//!
//! Runs the external `claude` tool non-interactively and captures what it
//! prints. Every operation is one-shot: spawn, feed input, drain output,
//! observe termination. Nothing is shared between invocations.

mod exec;
pub mod shell;

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use tracing::{info, warn};

use crate::config::{BridgeConfig, PipeMode};
use exec::Launch;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Stdout,
    Stderr,
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamKind::Stdout => write!(f, "stdout"),
            StreamKind::Stderr => write!(f, "stderr"),
        }
    }
}

/// How a single subprocess lifetime ended.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Success,
    /// `code` is `None` when the process was killed by a signal.
    NonZeroExit { code: Option<i32> },
    /// The process could not be started, or its pipes failed mid-run.
    SpawnFailure { message: String },
    TimedOut { after: Duration },
    OutputLimitExceeded { stream: StreamKind, limit: usize },
}

impl Outcome {
    /// True when the child ran to its own exit.
    pub fn process_exited(&self) -> bool {
        matches!(self, Outcome::Success | Outcome::NonZeroExit { .. })
    }

    fn label(&self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::NonZeroExit { .. } => "non_zero_exit",
            Outcome::SpawnFailure { .. } => "spawn_failure",
            Outcome::TimedOut { .. } => "timed_out",
            Outcome::OutputLimitExceeded { .. } => "output_limit_exceeded",
        }
    }
}

/// Captured streams and termination of one invocation.
#[derive(Debug, Clone)]
pub struct InvocationResult {
    pub outcome: Outcome,
    pub stdout: String,
    pub stderr: String,
    pub command_line: String,
    pub completed_at: DateTime<Utc>,
    pub duration: Duration,
}

impl InvocationResult {
    fn new(
        outcome: Outcome,
        stdout: &[u8],
        stderr: &[u8],
        command_line: String,
        duration: Duration,
    ) -> Self {
        Self {
            outcome,
            stdout: String::from_utf8_lossy(stdout).into_owned(),
            stderr: String::from_utf8_lossy(stderr).into_owned(),
            command_line,
            completed_at: Utc::now(),
            duration,
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome == Outcome::Success
    }

    /// Completion time as an ISO 8601 UTC string with milliseconds.
    pub fn timestamp(&self) -> String {
        self.completed_at.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    /// Human readable failure text, `None` on success.
    pub fn failure_message(&self) -> Option<String> {
        match &self.outcome {
            Outcome::Success => None,
            Outcome::NonZeroExit { code: Some(_) } => Some(format!(
                "Command failed: {}\n{}",
                self.command_line, self.stderr
            )),
            Outcome::NonZeroExit { code: None } => Some(format!(
                "Command terminated by signal: {}\n{}",
                self.command_line, self.stderr
            )),
            Outcome::SpawnFailure { message } => Some(message.clone()),
            Outcome::TimedOut { after } => Some(format!(
                "Command timed out after {}ms: {}",
                after.as_millis(),
                self.command_line
            )),
            Outcome::OutputLimitExceeded { stream, .. } => {
                Some(format!("{} maxBuffer length exceeded", stream))
            }
        }
    }
}

/// Runs the external tool on behalf of the HTTP handlers.
#[derive(Debug, Clone)]
pub struct ProcessBridge {
    program: String,
    args: Vec<String>,
    workspace: PathBuf,
    shell: String,
    pipe_mode: PipeMode,
    timeout: Duration,
    max_output_bytes: usize,
}

impl ProcessBridge {
    pub fn new(config: &BridgeConfig) -> Self {
        Self {
            program: config.claude_bin.clone(),
            args: config.claude_args.clone(),
            workspace: config.workspace.clone(),
            shell: config.shell.clone(),
            pipe_mode: config.pipe_mode,
            timeout: Duration::from_secs(config.invocation_timeout_secs),
            max_output_bytes: config.max_output_bytes,
        }
    }

    /// Override the per-invocation deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    /// `claude --version`, run from the server's own working directory.
    pub async fn probe_version(&self) -> InvocationResult {
        let mut args = self.args.clone();
        args.push("--version".to_string());
        let command_line = shell::tool_line(&self.program, &args);

        self.launch(
            "version",
            Launch {
                program: self.program.clone(),
                args,
                cwd: None,
                stdin: None,
                output_limit: Some(self.max_output_bytes),
                timeout: self.timeout,
                command_line,
            },
        )
        .await
    }

    /// `<program> --version` for an arbitrary tool on the search path.
    pub async fn probe_tool(&self, program: &str) -> InvocationResult {
        let args = vec!["--version".to_string()];
        let command_line = shell::tool_line(program, &args);

        self.launch(
            "tool_version",
            Launch {
                program: program.to_string(),
                args,
                cwd: None,
                stdin: None,
                output_limit: Some(self.max_output_bytes),
                timeout: self.timeout,
                command_line,
            },
        )
        .await
    }

    /// Spawns the tool in the workspace, writes `command` plus a newline to
    /// its stdin, closes stdin and collects output until exit.
    pub async fn run_stdin(&self, command: &str) -> InvocationResult {
        self.launch(
            "stdin",
            Launch {
                program: self.program.clone(),
                args: self.args.clone(),
                cwd: Some(self.workspace.clone()),
                stdin: Some(format!("{}\n", command)),
                output_limit: None,
                timeout: self.timeout,
                command_line: shell::tool_line(&self.program, &self.args),
            },
        )
        .await
    }

    /// Pipes `command` into the tool in one blocking call, with the output
    /// ceiling applied to each stream.
    pub async fn run_pipe(&self, command: &str) -> InvocationResult {
        let launch = match self.pipe_mode {
            PipeMode::Direct => Launch {
                program: self.program.clone(),
                args: self.args.clone(),
                cwd: Some(self.workspace.clone()),
                // Same bytes `echo` would write into the pipe.
                stdin: Some(format!("{}\n", command)),
                output_limit: Some(self.max_output_bytes),
                timeout: self.timeout,
                command_line: shell::tool_line(&self.program, &self.args),
            },
            PipeMode::Shell => {
                let line = shell::pipe_line(command, &self.program, &self.args);
                Launch {
                    program: self.shell.clone(),
                    args: vec!["-c".to_string(), line.clone()],
                    cwd: Some(self.workspace.clone()),
                    stdin: None,
                    output_limit: Some(self.max_output_bytes),
                    timeout: self.timeout,
                    command_line: line,
                }
            }
        };

        self.launch("pipe", launch).await
    }

    async fn launch(&self, mode: &'static str, launch: Launch) -> InvocationResult {
        let program = launch.program.clone();
        let result = exec::run(launch).await;

        if result.is_success() {
            info!(
                program = %program,
                mode,
                duration_ms = result.duration.as_millis() as u64,
                "Invocation completed"
            );
        } else {
            warn!(
                program = %program,
                mode,
                outcome = result.outcome.label(),
                duration_ms = result.duration.as_millis() as u64,
                "Invocation failed"
            );
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bridge_with(program: &str, args: &[&str], workspace: &Path) -> ProcessBridge {
        let config = BridgeConfig {
            workspace: workspace.to_path_buf(),
            claude_bin: program.to_string(),
            claude_args: args.iter().map(|s| s.to_string()).collect(),
            ..BridgeConfig::default()
        };
        ProcessBridge::new(&config).with_timeout(Duration::from_secs(10))
    }

    #[tokio::test]
    async fn test_run_stdin_appends_newline() {
        let dir = tempfile::tempdir().unwrap();
        let bridge = bridge_with("cat", &[], dir.path());

        let result = bridge.run_stdin("2+2").await;
        assert!(result.is_success());
        assert_eq!(result.stdout, "2+2\n");
        assert!(result.failure_message().is_none());
    }

    #[tokio::test]
    async fn test_run_stdin_uses_workspace_as_cwd() {
        let dir = tempfile::tempdir().unwrap();
        let bridge = bridge_with("sh", &["-c", "pwd"], dir.path());

        let result = bridge.run_stdin("ignored").await;
        assert!(result.is_success());
        let reported = PathBuf::from(result.stdout.trim());
        assert_eq!(
            reported.canonicalize().unwrap(),
            dir.path().canonicalize().unwrap()
        );
    }

    #[tokio::test]
    async fn test_shell_pipe_escapes_quotes() {
        let dir = tempfile::tempdir().unwrap();
        let config = BridgeConfig {
            workspace: dir.path().to_path_buf(),
            claude_bin: "cat".to_string(),
            pipe_mode: PipeMode::Shell,
            ..BridgeConfig::default()
        };
        let bridge = ProcessBridge::new(&config);

        let result = bridge.run_pipe("say \"hi\"").await;
        assert!(result.is_success());
        assert_eq!(result.stdout, "say \"hi\"\n");
        assert_eq!(result.command_line, "echo \"say \\\"hi\\\"\" | cat");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_shell_pipe_timeout_stops_the_tool() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("tool-finished");
        let script = format!("sleep 1; touch {}", marker.display());
        let config = BridgeConfig {
            workspace: dir.path().to_path_buf(),
            claude_bin: "sh".to_string(),
            claude_args: vec!["-c".to_string(), script],
            pipe_mode: PipeMode::Shell,
            ..BridgeConfig::default()
        };
        let bridge = ProcessBridge::new(&config).with_timeout(Duration::from_millis(300));

        let result = bridge.run_pipe("x").await;
        assert!(matches!(result.outcome, Outcome::TimedOut { .. }));

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(!marker.exists(), "tool kept running after the deadline");
    }

    #[tokio::test]
    async fn test_direct_pipe_does_not_expand_shell_syntax() {
        let dir = tempfile::tempdir().unwrap();
        let bridge = bridge_with("cat", &[], dir.path());

        let result = bridge.run_pipe("$HOME `id`").await;
        assert!(result.is_success());
        assert_eq!(result.stdout, "$HOME `id`\n");
    }

    #[tokio::test]
    async fn test_pipe_failure_message_includes_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let bridge = bridge_with("sh", &["-c", "echo broken >&2; exit 2"], dir.path());

        let result = bridge.run_pipe("hello").await;
        assert_eq!(result.outcome, Outcome::NonZeroExit { code: Some(2) });
        let message = result.failure_message().unwrap();
        assert!(message.starts_with("Command failed: sh -c"));
        assert!(message.contains("broken"));
    }

    #[tokio::test]
    async fn test_timestamp_is_iso8601_utc() {
        let dir = tempfile::tempdir().unwrap();
        let bridge = bridge_with("cat", &[], dir.path());

        let result = bridge.run_stdin("x").await;
        let ts = result.timestamp();
        assert!(ts.ends_with('Z'));
        assert!(DateTime::parse_from_rfc3339(&ts).is_ok());
    }
}
