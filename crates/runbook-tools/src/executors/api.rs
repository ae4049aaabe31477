//! HTTP API execution with retry.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::sync::Arc;
use std::time::Duration;

use crate::block::ApiConfig;
use crate::error::ExecutorError;
use crate::result::BlockResult;
use crate::secrets::{CredentialKind, SecretResolver};

/// Attempt budget and pacing for API blocks.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first request.
    pub max_attempts: u32,

    /// Linear backoff unit. Retry `n` waits `(n - 1) * backoff_step`.
    pub backoff_step: Duration,

    /// Timeout applied to each individual request.
    pub request_timeout: Duration,
}

impl RetryPolicy {
    /// Wait before retry number `retry` (1-based).
    pub fn backoff(&self, retry: u32) -> Duration {
        self.backoff_step * retry.saturating_sub(1)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            backoff_step: Duration::from_secs(1),
            request_timeout: Duration::from_secs(10),
        }
    }
}

/// Issues API block requests.
#[derive(Clone)]
pub struct ApiExecutor {
    client: reqwest::Client,
    policy: RetryPolicy,
    secrets: Arc<dyn SecretResolver>,
}

impl ApiExecutor {
    pub fn new(
        client: reqwest::Client,
        policy: RetryPolicy,
        secrets: Arc<dyn SecretResolver>,
    ) -> Self {
        Self {
            client,
            policy,
            secrets,
        }
    }

    /// Execute an API block.
    pub async fn execute(&self, config: &ApiConfig) -> BlockResult {
        let Some(url) = config.url.as_deref().filter(|u| !u.trim().is_empty()) else {
            return BlockResult::not_attempted("API block has no URL configured.");
        };

        let mut headers = config.headers.clone();
        if let Some(credential_id) = config.credential_id {
            match self.secrets.resolve(credential_id, CredentialKind::Api).await {
                Ok(Some(secret)) => {
                    headers.insert(config.auth_header().to_string(), secret.value);
                }
                Ok(None) => {
                    tracing::warn!(
                        %credential_id,
                        "No API credential found, sending request unauthenticated"
                    );
                }
                Err(e) => {
                    tracing::error!(%credential_id, error = %e, "Failed to resolve API credential");
                    return BlockResult::not_attempted(e.to_string());
                }
            }
        }

        let request = match self.build_request(config, url, &headers) {
            Ok(request) => request,
            Err(e) => return BlockResult::not_attempted(e.to_string()),
        };

        self.send_with_retry(request).await
    }

    fn build_request(
        &self,
        config: &ApiConfig,
        url: &str,
        headers: &std::collections::HashMap<String, String>,
    ) -> Result<reqwest::Request, ExecutorError> {
        let mut header_map = HeaderMap::new();
        for (name, value) in headers {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                ExecutorError::Configuration(format!("Invalid header name '{name}': {e}"))
            })?;
            let value = HeaderValue::from_str(value).map_err(|e| {
                ExecutorError::Configuration(format!("Invalid value for header '{name}': {e}"))
            })?;
            header_map.insert(name, value);
        }

        let mut builder = self
            .client
            .request(config.method.into(), url)
            .headers(header_map)
            .timeout(self.policy.request_timeout);

        if let Some(body) = &config.body {
            builder = builder.json(body);
        }

        builder
            .build()
            .map_err(|e| ExecutorError::Configuration(format!("Invalid API request: {e}")))
    }

    async fn send_with_retry(&self, request: reqwest::Request) -> BlockResult {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut last_failure: Option<BlockResult> = None;

        for attempt in 1..=max_attempts {
            if attempt > 1 {
                let delay = self.policy.backoff(attempt - 1);
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
            }

            let Some(request) = request.try_clone() else {
                return BlockResult::not_attempted("API request body cannot be resent.");
            };

            match self.client.execute(request).await {
                Ok(response) => {
                    let status = response.status();
                    let exit_code = i32::from(status.as_u16());
                    let output = render_response(response).await;

                    if status.is_success() {
                        tracing::debug!(attempt, status = exit_code, "API call succeeded");
                        return BlockResult::success(output, exit_code);
                    }
                    if !status.is_server_error() {
                        tracing::debug!(attempt, status = exit_code, "API call rejected");
                        return BlockResult::error(output, exit_code);
                    }

                    tracing::warn!(attempt, status = exit_code, "API call failed, retrying");
                    last_failure = Some(BlockResult::error(output, exit_code));
                }
                Err(e) if attempt == max_attempts => {
                    tracing::error!(attempt, error = %e, "API request failed");
                    return BlockResult::not_attempted(format!(
                        "API request failed after {attempt} attempts: {e}"
                    ));
                }
                Err(e) => {
                    tracing::warn!(attempt, error = %e, "API request failed, retrying");
                }
            }
        }

        match last_failure {
            Some(last) => BlockResult::error(
                format!(
                    "API call failed after {max_attempts} attempts.\n{}",
                    last.output
                ),
                last.exit_code,
            ),
            None => BlockResult::not_attempted("API call failed after multiple retries."),
        }
    }
}

async fn render_response(response: reqwest::Response) -> String {
    let status = response.status().as_u16();
    let headers = format!("{:?}", response.headers());
    let body = response.text().await.unwrap_or_default();
    format!("Status: {status}\nHeaders: {headers}\nBody: {body}")
}
