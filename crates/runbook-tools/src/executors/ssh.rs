//! Remote command execution over SSH.

use async_trait::async_trait;
use russh::client;
use russh::{ChannelMsg, Disconnect};
use russh_keys::key;
use std::sync::Arc;
use std::time::Duration;

use crate::block::SshConfig;
use crate::error::ExecutorError;
use crate::result::BlockResult;
use crate::secrets::{CredentialKind, SecretResolver};

/// Client handler that accepts any host key.
struct AcceptAnyHostKey;

#[async_trait]
impl client::Handler for AcceptAnyHostKey {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        _server_public_key: &key::PublicKey,
    ) -> Result<bool, Self::Error> {
        Ok(true)
    }
}

/// Runs SSH blocks.
#[derive(Clone)]
pub struct SshExecutor {
    connect_timeout: Duration,
    secrets: Arc<dyn SecretResolver>,
}

struct Target<'a> {
    host: &'a str,
    port: u16,
    username: &'a str,
    command: &'a str,
}

impl SshExecutor {
    pub fn new(connect_timeout: Duration, secrets: Arc<dyn SecretResolver>) -> Self {
        Self {
            connect_timeout,
            secrets,
        }
    }

    /// Execute an SSH block.
    pub async fn execute(&self, config: &SshConfig) -> BlockResult {
        let present = |v: &Option<String>| v.clone().filter(|s| !s.trim().is_empty());
        let (Some(host), Some(username), Some(command)) = (
            present(&config.host),
            present(&config.username),
            present(&config.command),
        ) else {
            return BlockResult::not_attempted("SSH block missing host, username, or command.");
        };

        let key = match self.load_key(config).await {
            Ok(key) => key,
            Err(e) => return BlockResult::not_attempted(e.to_string()),
        };

        let target = Target {
            host: &host,
            port: config.port,
            username: &username,
            command: &command,
        };

        match self.run(&target, key).await {
            Ok((exit_status, output)) => {
                let exit_code = exit_status
                    .and_then(|code| i32::try_from(code).ok())
                    .unwrap_or(-1);
                tracing::debug!(host = %host, exit_code, "SSH command finished");
                BlockResult::from_exit_code(exit_code, output.trim())
            }
            Err(e) => {
                tracing::error!(host = %host, port = config.port, error = %e, "SSH execution failed");
                BlockResult::not_attempted(e.to_string())
            }
        }
    }

    /// Resolve and parse the private key, if the block names an SSH credential.
    async fn load_key(&self, config: &SshConfig) -> Result<Option<key::KeyPair>, ExecutorError> {
        let Some(credential_id) = config.credential_id else {
            return Ok(None);
        };

        let secret = self
            .secrets
            .resolve(credential_id, CredentialKind::Ssh)
            .await
            .map_err(|e| ExecutorError::Key(e.to_string()))?;

        match secret {
            Some(secret) => russh_keys::decode_secret_key(&secret.value, None)
                .map(Some)
                .map_err(|e| ExecutorError::Key(e.to_string())),
            None => {
                tracing::warn!(%credential_id, "No SSH credential found, connecting without a key");
                Ok(None)
            }
        }
    }

    async fn run(
        &self,
        target: &Target<'_>,
        key: Option<key::KeyPair>,
    ) -> Result<(Option<u32>, String), ExecutorError> {
        let config = Arc::new(client::Config::default());
        let addr = (target.host, target.port);

        let mut session = tokio::time::timeout(
            self.connect_timeout,
            client::connect(config, addr, AcceptAnyHostKey),
        )
        .await
        .map_err(|_| {
            ExecutorError::Ssh(format!(
                "Connection to {}:{} timed out after {}s",
                target.host,
                target.port,
                self.connect_timeout.as_secs()
            ))
        })??;

        let authenticated = match key {
            Some(key) => {
                session
                    .authenticate_publickey(target.username, Arc::new(key))
                    .await?
            }
            None => session.authenticate_none(target.username).await?,
        };
        if !authenticated {
            return Err(ExecutorError::Ssh(format!(
                "Authentication failed for {}@{}",
                target.username, target.host
            )));
        }

        let mut channel = session.channel_open_session().await?;
        channel.exec(true, target.command).await?;

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let mut exit_status = None;

        while let Some(msg) = channel.wait().await {
            match msg {
                ChannelMsg::Data { ref data } => stdout.extend_from_slice(data),
                ChannelMsg::ExtendedData { ref data, ext: 1 } => stderr.extend_from_slice(data),
                ChannelMsg::ExitStatus { exit_status: code } => exit_status = Some(code),
                _ => {}
            }
        }

        if let Err(e) = session
            .disconnect(Disconnect::ByApplication, "", "English")
            .await
        {
            tracing::debug!(error = %e, "SSH disconnect failed");
        }

        let mut output = String::from_utf8_lossy(&stdout).into_owned();
        output.push_str(&String::from_utf8_lossy(&stderr));
        Ok((exit_status, output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SecretError;
    use crate::result::BlockStatus;
    use crate::secrets::{NoSecrets, Secret};
    use uuid::Uuid;

    struct GarbageKey;

    #[async_trait]
    impl SecretResolver for GarbageKey {
        async fn resolve(
            &self,
            _id: Uuid,
            _expected: CredentialKind,
        ) -> Result<Option<Secret>, SecretError> {
            Ok(Some(Secret {
                kind: CredentialKind::Ssh,
                value: "not a private key".to_string(),
            }))
        }
    }

    fn full_config() -> SshConfig {
        SshConfig {
            host: Some("127.0.0.1".to_string()),
            username: Some("deploy".to_string()),
            command: Some("uptime".to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_missing_fields() {
        let executor = SshExecutor::new(Duration::from_secs(1), Arc::new(NoSecrets));
        for config in [
            SshConfig {
                host: None,
                ..full_config()
            },
            SshConfig {
                username: Some(" ".to_string()),
                ..full_config()
            },
            SshConfig {
                command: None,
                ..full_config()
            },
        ] {
            let result = executor.execute(&config).await;
            assert_eq!(result.status, BlockStatus::Error);
            assert_eq!(result.exit_code, -1);
            assert_eq!(result.output, "SSH block missing host, username, or command.");
        }
    }

    #[tokio::test]
    async fn test_unparseable_key() {
        let executor = SshExecutor::new(Duration::from_secs(1), Arc::new(GarbageKey));
        let config = SshConfig {
            credential_id: Some(Uuid::new_v4()),
            ..full_config()
        };
        let result = executor.execute(&config).await;
        assert_eq!(result.exit_code, -1);
        assert!(result.output.starts_with("Failed to load SSH key:"));
    }

    #[tokio::test]
    async fn test_connection_refused() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let executor = SshExecutor::new(Duration::from_secs(5), Arc::new(NoSecrets));
        let config = SshConfig {
            port,
            ..full_config()
        };
        let result = executor.execute(&config).await;
        assert_eq!(result.status, BlockStatus::Error);
        assert_eq!(result.exit_code, -1);
        assert!(!result.output.is_empty());
    }
}
