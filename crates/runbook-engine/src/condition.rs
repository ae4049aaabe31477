//! Condition predicate evaluation.
//!
//! Each predicate is checked by running a transient command or API request
//! through the leaf executors and comparing the observed outcome with the
//! configured expectation. Evaluation never fails; at worst it is FALSE.

use regex::Regex;
use runbook_tools::block::{ApiConfig, Predicate};
use runbook_tools::{ExecutionEnvironment, Executors};
use std::sync::{Arc, OnceLock};

/// Result of evaluating a predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionOutcome {
    pub met: bool,
    pub description: String,
}

impl ConditionOutcome {
    fn new(met: bool, description: impl Into<String>) -> Self {
        Self {
            met,
            description: description.into(),
        }
    }

    /// Text recorded on the condition's own step.
    pub fn step_output(&self) -> String {
        format!(
            "Condition evaluated: {}. Result: {}",
            self.description,
            if self.met { "TRUE" } else { "FALSE" }
        )
    }
}

fn env_var_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid regex"))
}

/// Quote a value for a POSIX shell.
fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// Evaluates condition predicates.
#[derive(Clone)]
pub struct ConditionEvaluator {
    executors: Arc<Executors>,
}

impl ConditionEvaluator {
    pub fn new(executors: Arc<Executors>) -> Self {
        Self { executors }
    }

    pub async fn evaluate(
        &self,
        predicate: &Predicate,
        environment: Option<&ExecutionEnvironment>,
    ) -> ConditionOutcome {
        match predicate {
            Predicate::CommandExitCode {
                check_command,
                expected_exit_code,
            } => {
                let exit_code = match check_command.as_deref() {
                    Some(command) => self.run_command(command, environment).await.0,
                    None => -1,
                };
                ConditionOutcome::new(
                    i64::from(exit_code) == *expected_exit_code,
                    format!("Command exit code: {exit_code} (expected {expected_exit_code})"),
                )
            }
            Predicate::ApiStatusCode {
                check_url,
                expected_status_code,
            } => {
                let config = ApiConfig {
                    url: check_url.clone(),
                    ..Default::default()
                };
                let status = self.executors.api().execute(&config).await.exit_code;
                ConditionOutcome::new(
                    i64::from(status) == *expected_status_code,
                    format!("API status code: {status} (expected {expected_status_code})"),
                )
            }
            Predicate::FileExists { file_path } => {
                let exists = match file_path.as_deref().filter(|p| !p.is_empty()) {
                    Some(path) => {
                        let command = format!("test -f {}", shell_quote(path));
                        self.run_command(&command, environment).await.0 == 0
                    }
                    None => false,
                };
                ConditionOutcome::new(
                    exists,
                    format!("File exists check: {}", if exists { "Yes" } else { "No" }),
                )
            }
            Predicate::EnvVarEquals {
                env_var_name,
                env_var_value,
            } => {
                let name = env_var_name.as_deref().unwrap_or_default();
                if !env_var_name_pattern().is_match(name) {
                    return ConditionOutcome::new(
                        false,
                        format!("Invalid environment variable name '{name}'"),
                    );
                }

                let command = format!("echo \"${name}\"");
                let (_, output) = self.run_command(&command, environment).await;
                let actual = output.trim();
                let expected = env_var_value.as_deref().unwrap_or_default();
                ConditionOutcome::new(
                    env_var_value.as_deref() == Some(actual),
                    format!("Env var value: '{actual}' (expected '{expected}')"),
                )
            }
            Predicate::Unknown(kind) => {
                tracing::warn!(condition_type = %kind, "Unknown condition type");
                ConditionOutcome::new(false, format!("Unknown condition type '{kind}'"))
            }
        }
    }

    async fn run_command(
        &self,
        command: &str,
        environment: Option<&ExecutionEnvironment>,
    ) -> (i32, String) {
        let config = runbook_tools::block::CommandConfig {
            command: Some(command.to_string()),
        };
        let result = self.executors.command().execute(&config, environment).await;
        (result.exit_code, result.output)
    }
}
