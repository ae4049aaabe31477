//! Typed block model.
//!
//! Blocks are stored as `{ "id", "name", "type", "config", "order" }` where
//! `config` is an open key/value map whose shape depends on `type`. The map is
//! converted once, at load time, into a [`BlockSpec`] variant. Kinds this
//! engine does not know become [`BlockSpec::Unknown`]; known kinds whose
//! configuration does not parse become [`BlockSpec::Invalid`].

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::time::Duration;
use uuid::Uuid;

/// One typed, configured unit of work inside a runbook version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawBlock", into = "RawBlock")]
pub struct Block {
    pub id: Uuid,
    pub name: Option<String>,
    /// Sort key only; not guaranteed contiguous or unique.
    pub order: i64,
    pub spec: BlockSpec,
}

impl Block {
    /// Create a block with a fresh id and order 0.
    pub fn new(spec: BlockSpec) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: None,
            order: 0,
            spec,
        }
    }

    /// Set the block name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the sort order.
    pub fn with_order(mut self, order: i64) -> Self {
        self.order = order;
        self
    }

    /// Shorthand for a command block.
    pub fn command(command: impl Into<String>) -> Self {
        Self::new(BlockSpec::Command(CommandConfig {
            command: Some(command.into()),
        }))
    }

    /// The kind name as it appears in storage.
    pub fn kind(&self) -> &str {
        self.spec.kind()
    }
}

/// Kind-specific block configuration.
#[derive(Debug, Clone, PartialEq)]
pub enum BlockSpec {
    /// Operator-facing note; the map holds whatever the author wrote.
    Instruction(Map<String, Value>),
    Command(CommandConfig),
    Api(ApiConfig),
    Ssh(SshConfig),
    Timer(TimerConfig),
    Condition(ConditionConfig),
    /// A kind this engine does not recognize.
    Unknown {
        kind: String,
        config: Map<String, Value>,
    },
    /// A known kind whose configuration failed to parse.
    Invalid {
        kind: String,
        config: Map<String, Value>,
        reason: String,
    },
}

impl BlockSpec {
    /// Parse a configuration map for the given kind.
    pub fn parse(kind: &str, config: Map<String, Value>) -> Self {
        fn typed<T: for<'de> Deserialize<'de>>(
            kind: &str,
            config: Map<String, Value>,
            wrap: fn(T) -> BlockSpec,
        ) -> BlockSpec {
            match serde_json::from_value::<T>(Value::Object(config.clone())) {
                Ok(parsed) => wrap(parsed),
                Err(e) => BlockSpec::Invalid {
                    kind: kind.to_string(),
                    config,
                    reason: e.to_string(),
                },
            }
        }

        match kind {
            "instruction" => BlockSpec::Instruction(config),
            "command" => typed(kind, config, BlockSpec::Command),
            "api" => typed(kind, config, BlockSpec::Api),
            "ssh" => typed(kind, config, BlockSpec::Ssh),
            "timer" => typed(kind, config, BlockSpec::Timer),
            "condition" => typed(kind, config, BlockSpec::Condition),
            other => BlockSpec::Unknown {
                kind: other.to_string(),
                config,
            },
        }
    }

    /// The kind name as it appears in storage.
    pub fn kind(&self) -> &str {
        match self {
            BlockSpec::Instruction(_) => "instruction",
            BlockSpec::Command(_) => "command",
            BlockSpec::Api(_) => "api",
            BlockSpec::Ssh(_) => "ssh",
            BlockSpec::Timer(_) => "timer",
            BlockSpec::Condition(_) => "condition",
            BlockSpec::Unknown { kind, .. } | BlockSpec::Invalid { kind, .. } => kind,
        }
    }

    /// The configuration map in storage form.
    pub fn to_config(&self) -> Map<String, Value> {
        match self {
            BlockSpec::Instruction(config)
            | BlockSpec::Unknown { config, .. }
            | BlockSpec::Invalid { config, .. } => config.clone(),
            BlockSpec::Command(c) => to_map(c),
            BlockSpec::Api(c) => to_map(c),
            BlockSpec::Ssh(c) => to_map(c),
            BlockSpec::Timer(c) => to_map(c),
            BlockSpec::Condition(c) => to_map(c),
        }
    }
}

fn to_map<T: Serialize>(value: &T) -> Map<String, Value> {
    match serde_json::to_value(value) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawBlock {
    #[serde(default = "Uuid::new_v4")]
    id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(rename = "type", alias = "kind")]
    kind: String,
    #[serde(default, deserialize_with = "null_as_default")]
    config: Map<String, Value>,
    #[serde(default, deserialize_with = "null_as_default")]
    order: i64,
}

impl From<RawBlock> for Block {
    fn from(raw: RawBlock) -> Self {
        Self {
            id: raw.id,
            name: raw.name,
            order: raw.order,
            spec: BlockSpec::parse(&raw.kind, raw.config),
        }
    }
}

impl From<Block> for RawBlock {
    fn from(block: Block) -> Self {
        Self {
            id: block.id,
            name: block.name,
            kind: block.spec.kind().to_string(),
            config: block.spec.to_config(),
            order: block.order,
        }
    }
}

/// Configuration of a command block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommandConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
}

/// HTTP method for API blocks. Parsed case-insensitively.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
}

impl std::str::FromStr for HttpMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "PATCH" => Ok(HttpMethod::Patch),
            "DELETE" => Ok(HttpMethod::Delete),
            "HEAD" => Ok(HttpMethod::Head),
            "OPTIONS" => Ok(HttpMethod::Options),
            other => Err(format!("unsupported HTTP method '{other}'")),
        }
    }
}

impl<'de> Deserialize<'de> for HttpMethod {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        match raw {
            None => Ok(HttpMethod::default()),
            Some(s) if s.trim().is_empty() => Ok(HttpMethod::default()),
            Some(s) => s.trim().parse().map_err(serde::de::Error::custom),
        }
    }
}

impl From<HttpMethod> for reqwest::Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Delete => reqwest::Method::DELETE,
            HttpMethod::Head => reqwest::Method::HEAD,
            HttpMethod::Options => reqwest::Method::OPTIONS,
        }
    }
}

/// Configuration of an API block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default)]
    pub method: HttpMethod,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub headers: HashMap<String, String>,

    /// JSON body; sent only when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,

    #[serde(
        default,
        deserialize_with = "optional_uuid",
        skip_serializing_if = "Option::is_none"
    )]
    pub credential_id: Option<Uuid>,

    /// Header that receives the credential secret (default `Authorization`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_header_name: Option<String>,
}

impl ApiConfig {
    /// A GET request to `url` with no headers, body or credential.
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Default::default()
        }
    }

    pub fn auth_header(&self) -> &str {
        self.auth_header_name
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or("Authorization")
    }
}

/// Configuration of an SSH block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SshConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,

    #[serde(default = "default_ssh_port")]
    pub port: u16,

    #[serde(
        default,
        deserialize_with = "optional_uuid",
        skip_serializing_if = "Option::is_none"
    )]
    pub credential_id: Option<Uuid>,
}

fn default_ssh_port() -> u16 {
    22
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            host: None,
            username: None,
            command: None,
            port: default_ssh_port(),
            credential_id: None,
        }
    }
}

/// Configuration of a timer block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimerConfig {
    /// Seconds to wait.
    #[serde(default, deserialize_with = "timer_seconds")]
    pub duration: f64,
}

impl TimerConfig {
    /// The wait as a [`Duration`]; negative or NaN values wait zero and
    /// values beyond [`Duration::MAX`] saturate.
    pub fn wait(&self) -> Duration {
        if self.duration.is_nan() || self.duration <= 0.0 {
            return Duration::ZERO;
        }
        Duration::try_from_secs_f64(self.duration).unwrap_or(Duration::MAX)
    }

    /// The duration as operators wrote it: `5` rather than `5.0`.
    pub fn display_duration(&self) -> String {
        if self.duration.fract() == 0.0 && self.duration.abs() < i64::MAX as f64 {
            format!("{}", self.duration as i64)
        } else {
            format!("{}", self.duration)
        }
    }
}

/// The predicate checked by a condition block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    CommandExitCode {
        check_command: Option<String>,
        expected_exit_code: i64,
    },
    ApiStatusCode {
        check_url: Option<String>,
        expected_status_code: i64,
    },
    FileExists {
        file_path: Option<String>,
    },
    EnvVarEquals {
        env_var_name: Option<String>,
        env_var_value: Option<String>,
    },
    /// Unrecognized `condition_type`; always evaluates to false.
    Unknown(String),
}

/// Configuration of a condition block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawCondition", into = "RawCondition")]
pub struct ConditionConfig {
    pub predicate: Predicate,
    /// Run when the predicate holds.
    pub nested_blocks: Vec<Block>,
    /// Run when it does not.
    pub else_blocks: Vec<Block>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct RawCondition {
    #[serde(default, deserialize_with = "null_as_default")]
    condition_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    check_command: Option<String>,
    #[serde(default, deserialize_with = "lenient_i64", skip_serializing_if = "Option::is_none")]
    expected_exit_code: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    check_url: Option<String>,
    #[serde(default, deserialize_with = "lenient_i64", skip_serializing_if = "Option::is_none")]
    expected_status_code: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    file_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    env_var_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    env_var_value: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    nested_blocks: Vec<Block>,
    #[serde(default, deserialize_with = "null_as_default")]
    else_blocks: Vec<Block>,
}

impl From<RawCondition> for ConditionConfig {
    fn from(raw: RawCondition) -> Self {
        let predicate = match raw.condition_type.as_str() {
            "" | "command_exit_code" => Predicate::CommandExitCode {
                check_command: raw.check_command,
                expected_exit_code: raw.expected_exit_code.unwrap_or(0),
            },
            "api_status_code" => Predicate::ApiStatusCode {
                check_url: raw.check_url,
                expected_status_code: raw.expected_status_code.unwrap_or(200),
            },
            "file_exists" => Predicate::FileExists {
                file_path: raw.file_path,
            },
            "env_var_equals" => Predicate::EnvVarEquals {
                env_var_name: raw.env_var_name,
                env_var_value: raw.env_var_value,
            },
            other => Predicate::Unknown(other.to_string()),
        };

        Self {
            predicate,
            nested_blocks: raw.nested_blocks,
            else_blocks: raw.else_blocks,
        }
    }
}

impl From<ConditionConfig> for RawCondition {
    fn from(config: ConditionConfig) -> Self {
        let mut raw = RawCondition {
            nested_blocks: config.nested_blocks,
            else_blocks: config.else_blocks,
            ..Default::default()
        };
        match config.predicate {
            Predicate::CommandExitCode {
                check_command,
                expected_exit_code,
            } => {
                raw.condition_type = "command_exit_code".to_string();
                raw.check_command = check_command;
                raw.expected_exit_code = Some(expected_exit_code);
            }
            Predicate::ApiStatusCode {
                check_url,
                expected_status_code,
            } => {
                raw.condition_type = "api_status_code".to_string();
                raw.check_url = check_url;
                raw.expected_status_code = Some(expected_status_code);
            }
            Predicate::FileExists { file_path } => {
                raw.condition_type = "file_exists".to_string();
                raw.file_path = file_path;
            }
            Predicate::EnvVarEquals {
                env_var_name,
                env_var_value,
            } => {
                raw.condition_type = "env_var_equals".to_string();
                raw.env_var_name = env_var_name;
                raw.env_var_value = env_var_value;
            }
            Predicate::Unknown(kind) => raw.condition_type = kind,
        }
        raw
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Blank strings mean "no credential".
fn optional_uuid<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Uuid>, D::Error> {
    match Option::<String>::deserialize(deserializer)? {
        None => Ok(None),
        Some(s) if s.trim().is_empty() => Ok(None),
        Some(s) => Uuid::parse_str(s.trim())
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

/// Accepts a JSON integer or a numeric string.
fn lenient_i64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("expected an integer, got {n}"))),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => s
            .trim()
            .parse::<i64>()
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("expected an integer, got '{s}'"))),
        Some(other) => Err(serde::de::Error::custom(format!(
            "expected an integer, got {other}"
        ))),
    }
}

/// Accepts a JSON number or a numeric string; null means zero.
/// Timer seconds: lenient, but must fit in a [`Duration`].
fn timer_seconds<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    let seconds = lenient_f64(deserializer)?;
    if seconds > 0.0 && Duration::try_from_secs_f64(seconds).is_err() {
        return Err(serde::de::Error::custom(format!(
            "timer duration {seconds} is out of range"
        )));
    }
    Ok(seconds)
}

fn lenient_f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(0.0),
        Some(Value::Number(n)) => Ok(n.as_f64().unwrap_or(0.0)),
        Some(Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| serde::de::Error::custom(format!("expected a number, got '{s}'"))),
        Some(other) => Err(serde::de::Error::custom(format!(
            "expected a number, got {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_command_block() {
        let block: Block = serde_json::from_value(json!({
            "id": "7f1d3a52-6a0b-4a53-9d8e-0f4c1a0b2c3d",
            "name": "Check disk",
            "type": "command",
            "config": {"command": "df -h"},
            "order": 2
        }))
        .unwrap();

        assert_eq!(block.kind(), "command");
        assert_eq!(block.order, 2);
        assert_eq!(block.name.as_deref(), Some("Check disk"));
        match block.spec {
            BlockSpec::Command(c) => assert_eq!(c.command.as_deref(), Some("df -h")),
            other => panic!("unexpected spec: {other:?}"),
        }
    }

    #[test]
    fn test_defaults_for_missing_fields() {
        let block: Block = serde_json::from_value(json!({"kind": "timer"})).unwrap();
        assert_eq!(block.order, 0);
        assert!(block.name.is_none());
        match block.spec {
            BlockSpec::Timer(t) => assert_eq!(t.wait(), Duration::ZERO),
            other => panic!("unexpected spec: {other:?}"),
        }
    }

    #[test]
    fn test_unknown_kind_is_preserved() {
        let block: Block = serde_json::from_value(json!({
            "type": "webhook",
            "config": {"target": "x"}
        }))
        .unwrap();

        assert_eq!(block.kind(), "webhook");
        assert!(matches!(block.spec, BlockSpec::Unknown { .. }));

        let back = serde_json::to_value(&block).unwrap();
        assert_eq!(back["type"], "webhook");
        assert_eq!(back["config"]["target"], "x");
    }

    #[test]
    fn test_wrong_field_type_is_invalid() {
        let block: Block = serde_json::from_value(json!({
            "type": "command",
            "config": {"command": 42}
        }))
        .unwrap();

        match block.spec {
            BlockSpec::Invalid { kind, reason, .. } => {
                assert_eq!(kind, "command");
                assert!(!reason.is_empty());
            }
            other => panic!("unexpected spec: {other:?}"),
        }
    }

    #[test]
    fn test_http_method_case_insensitive() {
        let config: ApiConfig =
            serde_json::from_value(json!({"url": "http://x", "method": "post"})).unwrap();
        assert_eq!(config.method, HttpMethod::Post);

        let config: ApiConfig = serde_json::from_value(json!({"url": "http://x"})).unwrap();
        assert_eq!(config.method, HttpMethod::Get);
        assert_eq!(config.auth_header(), "Authorization");
    }

    #[test]
    fn test_ssh_default_port() {
        let config: SshConfig = serde_json::from_value(json!({"host": "db1"})).unwrap();
        assert_eq!(config.port, 22);
    }

    #[test]
    fn test_blank_credential_id_is_none() {
        let config: SshConfig =
            serde_json::from_value(json!({"host": "db1", "credential_id": ""})).unwrap();
        assert!(config.credential_id.is_none());

        let config: ApiConfig =
            serde_json::from_value(json!({"url": "http://x", "credential_id": null})).unwrap();
        assert!(config.credential_id.is_none());
    }

    #[test]
    fn test_condition_defaults_and_lenient_codes() {
        let config: ConditionConfig = serde_json::from_value(json!({
            "check_command": "true",
            "expected_exit_code": "3"
        }))
        .unwrap();
        assert_eq!(
            config.predicate,
            Predicate::CommandExitCode {
                check_command: Some("true".to_string()),
                expected_exit_code: 3,
            }
        );
        assert!(config.nested_blocks.is_empty());

        let config: ConditionConfig = serde_json::from_value(json!({
            "condition_type": "api_status_code",
            "check_url": "http://x"
        }))
        .unwrap();
        assert_eq!(
            config.predicate,
            Predicate::ApiStatusCode {
                check_url: Some("http://x".to_string()),
                expected_status_code: 200,
            }
        );
    }

    #[test]
    fn test_condition_with_nested_blocks() {
        let block: Block = serde_json::from_value(json!({
            "type": "condition",
            "config": {
                "condition_type": "file_exists",
                "file_path": "/tmp/flag",
                "nested_blocks": [
                    {"type": "command", "config": {"command": "echo yes"}},
                    {"type": "condition", "config": {
                        "condition_type": "nope",
                        "else_blocks": [{"type": "instruction"}]
                    }}
                ],
                "else_blocks": null
            }
        }))
        .unwrap();

        let BlockSpec::Condition(config) = &block.spec else {
            panic!("expected condition, got {:?}", block.spec);
        };
        assert_eq!(config.nested_blocks.len(), 2);
        assert!(config.else_blocks.is_empty());

        let BlockSpec::Condition(inner) = &config.nested_blocks[1].spec else {
            panic!("expected nested condition");
        };
        assert_eq!(inner.predicate, Predicate::Unknown("nope".to_string()));
        assert_eq!(inner.else_blocks[0].kind(), "instruction");
    }

    #[test]
    fn test_round_trip_keeps_identity() {
        let block = Block::command("echo hi").with_name("greet").with_order(5);
        let value = serde_json::to_value(&block).unwrap();
        assert_eq!(value["type"], "command");
        assert_eq!(value["config"]["command"], "echo hi");

        let back: Block = serde_json::from_value(value).unwrap();
        assert_eq!(back, block);
    }

    #[test]
    fn test_timer_duration_handling() {
        let timer = TimerConfig { duration: 5.0 };
        assert_eq!(timer.wait(), Duration::from_secs(5));
        assert_eq!(timer.display_duration(), "5");

        let timer = TimerConfig { duration: -3.0 };
        assert_eq!(timer.wait(), Duration::ZERO);

        let timer = TimerConfig { duration: f64::NAN };
        assert_eq!(timer.wait(), Duration::ZERO);

        let timer = TimerConfig { duration: 1e20 };
        assert_eq!(timer.wait(), Duration::MAX);
        assert_eq!(timer.display_duration(), "100000000000000000000");

        let timer: TimerConfig = serde_json::from_value(json!({"duration": "1.5"})).unwrap();
        assert_eq!(timer.wait(), Duration::from_millis(1500));
        assert_eq!(timer.display_duration(), "1.5");
    }

    #[test]
    fn test_out_of_range_timer_is_invalid() {
        let block: Block = serde_json::from_value(json!({
            "type": "timer",
            "config": {"duration": 1e20}
        }))
        .unwrap();

        match block.spec {
            BlockSpec::Invalid { kind, reason, .. } => {
                assert_eq!(kind, "timer");
                assert!(reason.contains("out of range"));
            }
            other => panic!("unexpected spec: {other:?}"),
        }
    }
}
