use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

/// How `/run-pipe` hands the command to the external tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipeMode {
    /// Argument-vector spawn, command text written to stdin.
    Direct,
    /// `echo "<command>" | claude` through `<shell> -c`.
    Shell,
}

impl FromStr for PipeMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "direct" => Ok(PipeMode::Direct),
            "shell" => Ok(PipeMode::Shell),
            other => Err(anyhow::anyhow!(
                "Invalid pipe mode '{}': expected 'direct' or 'shell'",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    pub port: u16,
    pub workspace: PathBuf,
    pub claude_bin: String,
    pub claude_args: Vec<String>,
    pub shell: String,
    pub pipe_mode: PipeMode,
    pub invocation_timeout_secs: u64,
    pub max_output_bytes: usize,
    pub max_body_bytes: usize,
    pub node_bin: String,
    pub npm_bin: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            workspace: PathBuf::from("/workspace/get-mcp-keys"),
            claude_bin: "claude".to_string(),
            claude_args: Vec::new(),
            shell: "/bin/sh".to_string(),
            pipe_mode: PipeMode::Direct,
            invocation_timeout_secs: 300, // 5 minutes
            max_output_bytes: 10 * 1024 * 1024, // 10MB
            max_body_bytes: 1024 * 1024,
            node_bin: "node".to_string(),
            npm_bin: "npm".to_string(),
        }
    }
}

/// Reads a variable, treating an empty value the same as an unset one.
fn env_value(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.is_empty())
}

impl BridgeConfig {
    pub fn load() -> anyhow::Result<Self> {
        let mut config = Self::default();

        // BRIDGE_PORT wins over the conventional PORT
        if let Some(port) = env_value("BRIDGE_PORT").or_else(|| env_value("PORT")) {
            config.port = port.parse()?;
        }

        if let Some(workspace) = env_value("BRIDGE_WORKSPACE") {
            config.workspace = PathBuf::from(workspace);
        }

        if let Some(bin) = env_value("CLAUDE_BIN") {
            config.claude_bin = bin;
        }

        if let Some(args) = env_value("CLAUDE_ARGS") {
            config.claude_args = args.split_whitespace().map(|s| s.to_string()).collect();
        }

        if let Some(shell) = env_value("BRIDGE_SHELL") {
            config.shell = shell;
        }

        if let Some(mode) = env_value("BRIDGE_PIPE_MODE") {
            config.pipe_mode = mode.parse()?;
        }

        if let Some(timeout) = env_value("BRIDGE_INVOCATION_TIMEOUT") {
            config.invocation_timeout_secs = timeout.parse()?;
        }

        if let Some(max_output) = env_value("BRIDGE_MAX_OUTPUT_BYTES") {
            config.max_output_bytes = max_output.parse()?;
        }

        if let Some(max_body) = env_value("BRIDGE_MAX_BODY_BYTES") {
            config.max_body_bytes = max_body.parse()?;
        }

        if let Some(node_bin) = env_value("BRIDGE_NODE_BIN") {
            config.node_bin = node_bin;
        }

        if let Some(npm_bin) = env_value("BRIDGE_NPM_BIN") {
            config.npm_bin = npm_bin;
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Tests in this module mutate the process environment.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    const VARS: &[&str] = &[
        "BRIDGE_PORT",
        "PORT",
        "BRIDGE_WORKSPACE",
        "CLAUDE_BIN",
        "CLAUDE_ARGS",
        "BRIDGE_SHELL",
        "BRIDGE_PIPE_MODE",
        "BRIDGE_INVOCATION_TIMEOUT",
        "BRIDGE_MAX_OUTPUT_BYTES",
        "BRIDGE_MAX_BODY_BYTES",
        "BRIDGE_NODE_BIN",
        "BRIDGE_NPM_BIN",
    ];

    /// Runs `f` with only the given bridge variables set.
    fn with_env<T>(vars: &[(&str, &str)], f: impl FnOnce() -> T) -> T {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        for key in VARS {
            env::remove_var(key);
        }
        for (key, value) in vars {
            env::set_var(key, value);
        }
        let result = f();
        for key in VARS {
            env::remove_var(key);
        }
        result
    }

    #[test]
    fn test_defaults() {
        let config = BridgeConfig::default();
        assert_eq!(config.port, 3000);
        assert_eq!(config.claude_bin, "claude");
        assert_eq!(config.pipe_mode, PipeMode::Direct);
        assert!(config.max_output_bytes >= 10 * 1024 * 1024);
    }

    #[test]
    fn test_load_without_env_uses_defaults() {
        let config = with_env(&[], BridgeConfig::load).unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.workspace, PathBuf::from("/workspace/get-mcp-keys"));
    }

    #[test]
    fn test_load_port_override() {
        let config = with_env(&[("PORT", "8080")], BridgeConfig::load).unwrap();
        assert_eq!(config.port, 8080);
    }

    #[test]
    fn test_load_bridge_port_wins_over_port() {
        let config = with_env(&[("PORT", "8080"), ("BRIDGE_PORT", "9090")], BridgeConfig::load)
            .unwrap();
        assert_eq!(config.port, 9090);
    }

    #[test]
    fn test_load_empty_port_falls_back_to_default() {
        let config = with_env(&[("PORT", "")], BridgeConfig::load).unwrap();
        assert_eq!(config.port, 3000);

        let config = with_env(&[("BRIDGE_PORT", ""), ("PORT", "4000")], BridgeConfig::load)
            .unwrap();
        assert_eq!(config.port, 4000);
    }

    #[test]
    fn test_load_rejects_unparsable_values() {
        assert!(with_env(&[("PORT", "not-a-port")], BridgeConfig::load).is_err());
        assert!(with_env(&[("BRIDGE_INVOCATION_TIMEOUT", "-1")], BridgeConfig::load).is_err());
        assert!(with_env(&[("BRIDGE_PIPE_MODE", "exec")], BridgeConfig::load).is_err());
    }

    #[test]
    fn test_load_tool_settings() {
        let config = with_env(
            &[
                ("BRIDGE_WORKSPACE", "/tmp/ws"),
                ("CLAUDE_BIN", "/opt/claude"),
                ("CLAUDE_ARGS", "--print  --verbose"),
                ("BRIDGE_PIPE_MODE", "shell"),
                ("BRIDGE_INVOCATION_TIMEOUT", "30"),
                ("BRIDGE_MAX_OUTPUT_BYTES", "1024"),
            ],
            BridgeConfig::load,
        )
        .unwrap();
        assert_eq!(config.workspace, PathBuf::from("/tmp/ws"));
        assert_eq!(config.claude_bin, "/opt/claude");
        assert_eq!(config.claude_args, vec!["--print", "--verbose"]);
        assert_eq!(config.pipe_mode, PipeMode::Shell);
        assert_eq!(config.invocation_timeout_secs, 30);
        assert_eq!(config.max_output_bytes, 1024);
    }

    #[test]
    fn test_pipe_mode_parsing() {
        assert_eq!("direct".parse::<PipeMode>().unwrap(), PipeMode::Direct);
        assert_eq!(" Shell ".parse::<PipeMode>().unwrap(), PipeMode::Shell);
        assert!("exec".parse::<PipeMode>().is_err());
    }
}
