//! Engine configuration.

use runbook_tools::executors::{ExecutorSettings, RetryPolicy};
use serde::Deserialize;
use std::time::Duration;

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Engine configuration loaded from environment variables.
///
/// Environment variables are prefixed with `RUNBOOK_`:
/// - `RUNBOOK_HOST`: Server bind address (default: "0.0.0.0")
/// - `RUNBOOK_PORT`: Server port (default: 8080)
/// - `RUNBOOK_POLL_INTERVAL_MS`: Idle worker poll interval (default: 2000)
/// - `RUNBOOK_API_MAX_ATTEMPTS`: Attempts per API block (default: 4)
/// - `RUNBOOK_API_BACKOFF_MS`: Linear API backoff step (default: 1000)
/// - `RUNBOOK_API_TIMEOUT_SECS`: Per-request API timeout (default: 10)
/// - `RUNBOOK_SSH_TIMEOUT_SECS`: SSH connect timeout (default: 30)
/// - `RUNBOOK_SHELL`: Shell for local commands (default: "sh")
/// - `RUNBOOK_CONTAINER_RUNTIME`: Container CLI (default: "docker")
/// - `RUNBOOK_LOG_FORMAT`: `text` or `json` (default: text)
/// - `RUNBOOK_WORKER_ID`: Worker identity in logs (default: random)
/// - `RUNBOOK_ENCRYPTION_KEY`: Base64 32-byte credential key (optional)
/// - `RUNBOOK_RECOVER_ORPHANS`: Fail jobs left `running` at startup (default: true).
///   Disable when several workers share one database.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default = "default_api_max_attempts")]
    pub api_max_attempts: u32,

    #[serde(default = "default_api_backoff_ms")]
    pub api_backoff_ms: u64,

    #[serde(default = "default_api_timeout_secs")]
    pub api_timeout_secs: u64,

    #[serde(default = "default_ssh_timeout_secs")]
    pub ssh_timeout_secs: u64,

    #[serde(default = "default_shell")]
    pub shell: String,

    #[serde(default = "default_container_runtime")]
    pub container_runtime: String,

    #[serde(default)]
    pub log_format: LogFormat,

    #[serde(default = "default_worker_id")]
    pub worker_id: String,

    #[serde(default)]
    pub encryption_key: Option<String>,

    #[serde(default = "default_recover_orphans")]
    pub recover_orphans: bool,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_poll_interval_ms() -> u64 {
    2000
}

fn default_api_max_attempts() -> u32 {
    4
}

fn default_api_backoff_ms() -> u64 {
    1000
}

fn default_api_timeout_secs() -> u64 {
    10
}

fn default_ssh_timeout_secs() -> u64 {
    30
}

fn default_shell() -> String {
    "sh".to_string()
}

fn default_container_runtime() -> String {
    "docker".to_string()
}

fn default_recover_orphans() -> bool {
    true
}

fn default_worker_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

impl EngineConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, envy::Error> {
        envy::prefixed("RUNBOOK_").from_env::<EngineConfig>()
    }

    /// Get the server bind address as a string suitable for `TcpListener::bind`.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Executor tunables derived from this configuration.
    pub fn executor_settings(&self) -> ExecutorSettings {
        ExecutorSettings {
            shell: self.shell.clone(),
            container_runtime: self.container_runtime.clone(),
            api_retry: RetryPolicy {
                max_attempts: self.api_max_attempts,
                backoff_step: Duration::from_millis(self.api_backoff_ms),
                request_timeout: Duration::from_secs(self.api_timeout_secs),
            },
            ssh_connect_timeout: Duration::from_secs(self.ssh_timeout_secs),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            poll_interval_ms: default_poll_interval_ms(),
            api_max_attempts: default_api_max_attempts(),
            api_backoff_ms: default_api_backoff_ms(),
            api_timeout_secs: default_api_timeout_secs(),
            ssh_timeout_secs: default_ssh_timeout_secs(),
            shell: default_shell(),
            container_runtime: default_container_runtime(),
            log_format: LogFormat::default(),
            worker_id: default_worker_id(),
            encryption_key: None,
            recover_orphans: default_recover_orphans(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.bind_address(), "0.0.0.0:8080");
        assert_eq!(config.poll_interval(), Duration::from_secs(2));
        assert_eq!(config.log_format, LogFormat::Text);
        assert!(config.encryption_key.is_none());
        assert!(config.recover_orphans);

        let settings = config.executor_settings();
        assert_eq!(settings.api_retry.max_attempts, 4);
        assert_eq!(settings.api_retry.backoff_step, Duration::from_secs(1));
        assert_eq!(settings.ssh_connect_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_from_prefixed_vars() {
        let vars = vec![
            ("RUNBOOK_PORT".to_string(), "9090".to_string()),
            ("RUNBOOK_LOG_FORMAT".to_string(), "json".to_string()),
            ("RUNBOOK_API_BACKOFF_MS".to_string(), "250".to_string()),
            ("RUNBOOK_WORKER_ID".to_string(), "worker-a".to_string()),
            ("RUNBOOK_RECOVER_ORPHANS".to_string(), "false".to_string()),
            ("UNRELATED".to_string(), "x".to_string()),
        ];
        let config: EngineConfig = envy::prefixed("RUNBOOK_").from_iter(vars).unwrap();

        assert_eq!(config.port, 9090);
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.worker_id, "worker-a");
        assert!(!config.recover_orphans);
        assert_eq!(
            config.executor_settings().api_retry.backoff_step,
            Duration::from_millis(250)
        );
        assert_eq!(config.shell, "sh");
    }
}
