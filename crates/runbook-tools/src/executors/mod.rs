//! Leaf block executors.
//!
//! Each executor turns one block configuration into a [`BlockResult`] and
//! never returns an error to its caller; failures are folded into the result.

pub mod api;
pub mod command;
pub mod instruction;
pub mod ssh;
pub mod timer;

use std::sync::Arc;
use std::time::Duration;

use crate::block::{Block, BlockSpec};
use crate::environment::ExecutionEnvironment;
use crate::error::ExecutorError;
use crate::result::BlockResult;
use crate::secrets::SecretResolver;

pub use api::{ApiExecutor, RetryPolicy};
pub use command::CommandExecutor;
pub use ssh::SshExecutor;

/// Tunables shared by the executors.
#[derive(Debug, Clone)]
pub struct ExecutorSettings {
    /// Shell used for local commands.
    pub shell: String,

    /// Container runtime CLI used when an environment binds an image.
    pub container_runtime: String,

    /// API attempt budget and pacing.
    pub api_retry: RetryPolicy,

    /// SSH connection timeout.
    pub ssh_connect_timeout: Duration,
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self {
            shell: "sh".to_string(),
            container_runtime: "docker".to_string(),
            api_retry: RetryPolicy::default(),
            ssh_connect_timeout: Duration::from_secs(30),
        }
    }
}

/// The full set of leaf executors.
#[derive(Clone)]
pub struct Executors {
    command: CommandExecutor,
    api: ApiExecutor,
    ssh: SshExecutor,
}

impl Executors {
    /// Build the executors with a shared HTTP client.
    pub fn new(
        settings: ExecutorSettings,
        secrets: Arc<dyn SecretResolver>,
    ) -> Result<Self, ExecutorError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| ExecutorError::Http(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            command: CommandExecutor::new(settings.shell, settings.container_runtime),
            api: ApiExecutor::new(client, settings.api_retry, secrets.clone()),
            ssh: SshExecutor::new(settings.ssh_connect_timeout, secrets),
        })
    }

    pub fn command(&self) -> &CommandExecutor {
        &self.command
    }

    pub fn api(&self) -> &ApiExecutor {
        &self.api
    }

    /// Execute a leaf block.
    ///
    /// Condition and unknown blocks are not leaves; they come back as errors
    /// and callers are expected to route them elsewhere.
    #[tracing::instrument(skip(self, block, environment), fields(block_id = %block.id, kind = %block.kind()))]
    pub async fn execute(
        &self,
        block: &Block,
        environment: Option<&ExecutionEnvironment>,
    ) -> BlockResult {
        match &block.spec {
            BlockSpec::Instruction(_) => instruction::execute(),
            BlockSpec::Command(config) => self.command.execute(config, environment).await,
            BlockSpec::Api(config) => self.api.execute(config).await,
            BlockSpec::Ssh(config) => self.ssh.execute(config).await,
            BlockSpec::Timer(config) => timer::execute(config).await,
            BlockSpec::Condition(_) => {
                BlockResult::not_attempted("Condition blocks cannot be executed directly.")
            }
            BlockSpec::Unknown { kind, .. } => {
                BlockResult::not_attempted(format!("Block type '{kind}' is not supported."))
            }
            BlockSpec::Invalid { kind, reason, .. } => {
                tracing::warn!(reason = %reason, "Invalid block configuration");
                BlockResult::not_attempted(format!("Invalid {kind} block configuration: {reason}"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::BlockStatus;
    use crate::secrets::NoSecrets;
    use serde_json::json;

    fn executors() -> Executors {
        Executors::new(ExecutorSettings::default(), Arc::new(NoSecrets)).unwrap()
    }

    fn block(value: serde_json::Value) -> Block {
        serde_json::from_value(value).unwrap()
    }

    #[tokio::test]
    async fn test_dispatches_by_kind() {
        let executors = executors();

        let result = executors
            .execute(&block(json!({"type": "command", "config": {"command": "echo hi"}})), None)
            .await;
        assert_eq!(result.status, BlockStatus::Success);
        assert_eq!(result.output, "hi\n");

        let result = executors
            .execute(&block(json!({"type": "instruction", "config": {"text": "Page on-call"}})), None)
            .await;
        assert_eq!(result.output, instruction::ACKNOWLEDGED);

        let result = executors
            .execute(&block(json!({"type": "timer", "config": {"duration": 0}})), None)
            .await;
        assert_eq!(result.output, "Timer finished after 0 seconds.");
    }

    #[tokio::test]
    async fn test_invalid_config_is_not_attempted() {
        let result = executors()
            .execute(&block(json!({"type": "timer", "config": {"duration": "soon"}})), None)
            .await;
        assert_eq!(result.status, BlockStatus::Error);
        assert_eq!(result.exit_code, -1);
        assert!(result.output.starts_with("Invalid timer block configuration"));
    }

    #[tokio::test]
    async fn test_non_leaf_kinds_are_rejected() {
        let executors = executors();

        let result = executors
            .execute(&block(json!({"type": "condition"})), None)
            .await;
        assert_eq!(result.exit_code, -1);

        let result = executors
            .execute(&block(json!({"type": "webhook"})), None)
            .await;
        assert_eq!(result.output, "Block type 'webhook' is not supported.");
    }
}
