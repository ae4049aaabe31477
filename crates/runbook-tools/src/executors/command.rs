//! Command execution, locally or inside a container.

use std::process::{Output, Stdio};
use tokio::process::Command;

use crate::block::CommandConfig;
use crate::environment::ExecutionEnvironment;
use crate::error::ExecutorError;
use crate::result::BlockResult;

/// Exit code the container runtime uses for its own failures.
const RUNTIME_FAILURE_EXIT: i32 = 125;

/// Markers the runtime prints when an image cannot be found or pulled.
const IMAGE_MISSING_MARKERS: &[&str] = &[
    "Unable to find image",
    "No such image",
    "pull access denied",
    "manifest unknown",
    "repository does not exist",
];

/// Runs command blocks with the configured shell.
#[derive(Debug, Clone)]
pub struct CommandExecutor {
    shell: String,
    container_runtime: String,
}

impl CommandExecutor {
    pub fn new(shell: impl Into<String>, container_runtime: impl Into<String>) -> Self {
        Self {
            shell: shell.into(),
            container_runtime: container_runtime.into(),
        }
    }

    /// Execute a command block, inside the environment's image when one is bound.
    pub async fn execute(
        &self,
        config: &CommandConfig,
        environment: Option<&ExecutionEnvironment>,
    ) -> BlockResult {
        let Some(command) = config.command.as_deref().filter(|c| !c.trim().is_empty()) else {
            return BlockResult::not_attempted("Command block has no command configured.");
        };

        match environment.and_then(ExecutionEnvironment::container_image) {
            Some(image) => {
                tracing::info!(image = %image, "Executing command in container");
                self.run_in_container(command, image).await
            }
            None => {
                tracing::info!("Executing command locally");
                self.run_local(command).await
            }
        }
    }

    /// Run `<shell> -c <command>` on this host.
    pub async fn run_local(&self, command: &str) -> BlockResult {
        let mut cmd = Command::new(&self.shell);
        cmd.arg("-c").arg(command);

        match spawn(cmd).await {
            Ok(output) => {
                let exit_code = output.status.code().unwrap_or(-1);
                let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
                text.push_str(&String::from_utf8_lossy(&output.stderr));
                tracing::debug!(exit_code, "Local command finished");
                BlockResult::from_exit_code(exit_code, text)
            }
            Err(e) => {
                tracing::error!(error = %e, shell = %self.shell, "Failed to run local command");
                BlockResult::not_attempted(e.to_string())
            }
        }
    }

    /// Run the command in a fresh container started from `image`.
    pub async fn run_in_container(&self, command: &str, image: &str) -> BlockResult {
        let mut cmd = Command::new(&self.container_runtime);
        cmd.args(["run", "--rm", "--network", "host", image, "sh", "-c", command]);

        let output = match spawn(cmd).await {
            Ok(output) => output,
            Err(e) => {
                tracing::error!(
                    error = %e,
                    runtime = %self.container_runtime,
                    "Failed to start container runtime"
                );
                return BlockResult::not_attempted(e.to_string());
            }
        };

        let exit_code = output.status.code().unwrap_or(-1);
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        if exit_code == RUNTIME_FAILURE_EXIT && image_missing(&stderr) {
            tracing::warn!(image = %image, "Execution environment image not found");
            return BlockResult::not_attempted(format!(
                "Execution environment image not found: {image}"
            ));
        }

        let text = format!("{stdout}\n{stderr}").trim().to_string();
        BlockResult::from_exit_code(exit_code, text)
    }
}

impl Default for CommandExecutor {
    fn default() -> Self {
        Self::new("sh", "docker")
    }
}

async fn spawn(mut cmd: Command) -> Result<Output, ExecutorError> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    cmd.output()
        .await
        .map_err(|e| ExecutorError::Process(format!("Failed to spawn process: {e}")))
}

fn image_missing(stderr: &str) -> bool {
    IMAGE_MISSING_MARKERS
        .iter()
        .any(|marker| stderr.contains(marker))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::BlockStatus;
    use uuid::Uuid;

    fn config(command: &str) -> CommandConfig {
        CommandConfig {
            command: Some(command.to_string()),
        }
    }

    #[tokio::test]
    async fn test_exit_zero_is_success() {
        let result = CommandExecutor::default().execute(&config("exit 0"), None).await;
        assert_eq!(result.status, BlockStatus::Success);
        assert_eq!(result.exit_code, 0);
    }

    #[tokio::test]
    async fn test_exit_one_is_error() {
        let result = CommandExecutor::default().execute(&config("exit 1"), None).await;
        assert_eq!(result.status, BlockStatus::Error);
        assert_eq!(result.exit_code, 1);
    }

    #[tokio::test]
    async fn test_output_is_stdout_then_stderr() {
        let result = CommandExecutor::default()
            .execute(&config("echo out; echo err >&2"), None)
            .await;
        assert!(result.is_success());
        assert_eq!(result.output, "out\nerr\n");
    }

    #[tokio::test]
    async fn test_nul_bytes_in_output_are_replaced() {
        let result = CommandExecutor::default()
            .execute(&config(r"printf 'a\000b'"), None)
            .await;
        assert!(result.is_success());
        assert_eq!(result.output, "a\u{FFFD}b");
    }

    #[tokio::test]
    async fn test_missing_command_spawns_nothing() {
        let result = CommandExecutor::default()
            .execute(&CommandConfig::default(), None)
            .await;
        assert_eq!(result.status, BlockStatus::Error);
        assert_eq!(result.exit_code, -1);
        assert_eq!(result.output, "Command block has no command configured.");
    }

    #[tokio::test]
    async fn test_signal_exit_is_minus_one() {
        let result = CommandExecutor::default()
            .execute(&config("kill -9 $$"), None)
            .await;
        assert_eq!(result.status, BlockStatus::Error);
        assert_eq!(result.exit_code, -1);
    }

    #[tokio::test]
    async fn test_missing_shell_is_error() {
        let executor = CommandExecutor::new("/nonexistent/shell", "docker");
        let result = executor.execute(&config("echo hi"), None).await;
        assert_eq!(result.exit_code, -1);
        assert!(result.output.contains("Failed to spawn process"));
    }

    #[tokio::test]
    async fn test_environment_without_image_runs_locally() {
        let env = ExecutionEnvironment {
            id: Uuid::new_v4(),
            name: "local".to_string(),
            image_tag: None,
        };
        let result = CommandExecutor::default()
            .execute(&config("echo local"), Some(&env))
            .await;
        assert!(result.is_success());
        assert_eq!(result.output.trim(), "local");
    }

    #[tokio::test]
    async fn test_missing_runtime_is_error() {
        let env = ExecutionEnvironment {
            id: Uuid::new_v4(),
            name: "boxed".to_string(),
            image_tag: Some("alpine:3.20".to_string()),
        };
        let executor = CommandExecutor::new("sh", "/nonexistent/runtime");
        let result = executor.execute(&config("echo hi"), Some(&env)).await;
        assert_eq!(result.status, BlockStatus::Error);
        assert_eq!(result.exit_code, -1);
    }

    #[test]
    fn test_image_missing_detection() {
        assert!(image_missing(
            "Unable to find image 'nope:latest' locally\ndocker: Error response from daemon"
        ));
        assert!(!image_missing("sh: 1: foo: not found"));
    }
}
