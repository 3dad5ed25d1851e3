use serde::{Deserialize, Serialize};

use crate::bridge::{InvocationResult, Outcome};
use crate::error_handling::{AppError, AppResult};

/// Node-style version string reported in place of the runtime's `process.version`.
pub const RUNTIME_VERSION: &str = concat!("v", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RunRequest {
    #[serde(default)]
    pub command: Option<String>,
}

impl RunRequest {
    /// The command text, rejecting a missing or empty value.
    pub fn into_command(self) -> AppResult<String> {
        match self.command {
            Some(command) if !command.is_empty() => Ok(command),
            _ => Err(AppError::MissingCommand),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClaudeProbeResponse {
    #[serde(rename_all = "camelCase")]
    Available {
        success: bool,
        version: String,
        stderr: String,
        node_version: String,
    },
    #[serde(rename_all = "camelCase")]
    Unavailable {
        success: bool,
        error: String,
        stdout: String,
        stderr: String,
        node_version: String,
    },
}

impl From<InvocationResult> for ClaudeProbeResponse {
    fn from(result: InvocationResult) -> Self {
        match result.failure_message() {
            None => ClaudeProbeResponse::Available {
                success: true,
                version: result.stdout.trim().to_string(),
                stderr: result.stderr,
                node_version: RUNTIME_VERSION.to_string(),
            },
            Some(error) => ClaudeProbeResponse::Unavailable {
                success: false,
                error,
                stdout: result.stdout,
                stderr: result.stderr,
                node_version: RUNTIME_VERSION.to_string(),
            },
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RunSuccess {
    pub success: bool,
    pub output: String,
    pub error: String,
    pub timestamp: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RunFailure {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub stdout: String,
    pub stderr: String,
    pub timestamp: String,
}

impl RunSuccess {
    pub fn from_result(result: InvocationResult) -> Self {
        let timestamp = result.timestamp();
        Self {
            success: true,
            output: result.stdout,
            error: result.stderr,
            timestamp,
        }
    }
}

impl RunFailure {
    /// Stdin-piped shape: an exit code when the tool exited on its own,
    /// otherwise an error message.
    pub fn from_stdin_result(result: InvocationResult) -> Self {
        let timestamp = result.timestamp();
        let (code, error) = match result.outcome {
            Outcome::NonZeroExit { code: Some(code) } => (Some(code), None),
            _ => (None, result.failure_message()),
        };
        Self {
            success: false,
            code,
            error,
            stdout: result.stdout,
            stderr: result.stderr,
            timestamp,
        }
    }

    /// Shell-piped shape: always an error message, never a code.
    pub fn from_pipe_result(result: InvocationResult) -> Self {
        let timestamp = result.timestamp();
        let error = Some(result.failure_message().unwrap_or_default());
        Self {
            success: false,
            code: None,
            error,
            stdout: result.stdout,
            stderr: result.stderr,
            timestamp,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HealthResponse {
    #[serde(rename_all = "camelCase")]
    Ok {
        status: String,
        workspace: String,
        node_version: String,
        npm_version: String,
        process_node_version: String,
    },
    Error {
        status: String,
        error: String,
    },
}
