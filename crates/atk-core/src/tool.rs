// ATK Core - Tool abstraction
//
// A tool is one agent-invokable operation: a stable name, a JSON parameter
// schema, and an async `execute`. Adapters expose each of their operations
// as a tool; the agent runtime only ever sees this surface.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::envelope::{Envelope, Outcome};
use crate::error::{AtkError, AtkResult};

/// Kind of collaborator a tool delegates to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolType {
    /// Wraps a remote HTTP API
    Http,
    /// Executes a local process
    Process,
    /// Operates on the local filesystem
    Filesystem,
    /// User-defined
    Custom,
}

/// How an operation reports failure to its caller.
///
/// Fixed per operation when it is declared; callers branch on the
/// result's `success` flag (structured) or on the presence of `error`
/// with no data (message).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureContract {
    /// A bare human-readable string prefixed with the failing action
    Message,
    /// `{success: false, <default fields>, error}`
    Structured,
}

impl std::fmt::Display for FailureContract {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureContract::Message => write!(f, "message"),
            FailureContract::Structured => write!(f, "structured"),
        }
    }
}

/// Tool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolConfig {
    /// Stable operation name (e.g. `ansible_playbook_run`)
    pub name: String,

    /// Description shown to the model
    pub description: String,

    /// JSON schema for the parameters
    pub parameters: serde_json::Value,

    #[serde(default = "default_tool_type")]
    pub tool_type: ToolType,

    #[serde(default = "default_failure_contract")]
    pub failure_contract: FailureContract,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub extra: HashMap<String, serde_json::Value>,
}

fn default_tool_type() -> ToolType {
    ToolType::Custom
}

fn default_failure_contract() -> FailureContract {
    FailureContract::Message
}

fn default_timeout() -> u64 {
    crate::DEFAULT_TOOL_TIMEOUT_SECS
}

/// Tool definition as advertised to the agent runtime
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
    pub failure_contract: FailureContract,
}

impl From<&ToolConfig> for ToolDefinition {
    fn from(config: &ToolConfig) -> Self {
        Self {
            name: config.name.clone(),
            description: config.description.clone(),
            parameters: config.parameters.clone(),
            failure_contract: config.failure_contract,
        }
    }
}

/// Arguments of a single tool invocation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolInput {
    pub arguments: serde_json::Value,
}

impl ToolInput {
    pub fn new(arguments: serde_json::Value) -> Self {
        Self { arguments }
    }

    /// Read a single argument, failing if it is absent or ill-typed
    pub fn get_arg<T: DeserializeOwned>(&self, name: &str) -> AtkResult<T> {
        let value = self
            .arguments
            .get(name)
            .ok_or_else(|| AtkError::invalid_argument(format!("missing argument '{}'", name)))?;

        serde_json::from_value(value.clone()).map_err(|e| {
            AtkError::invalid_argument(format!("argument '{}' has wrong type: {}", name, e))
        })
    }

    /// Parse all arguments into a typed parameter struct
    pub fn parse<T: DeserializeOwned>(&self) -> AtkResult<T> {
        let arguments = if self.arguments.is_null() {
            serde_json::json!({})
        } else {
            self.arguments.clone()
        };

        serde_json::from_value(arguments)
            .map_err(|e| AtkError::invalid_argument(e.to_string()))
    }
}

/// Result of a tool execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub success: bool,

    #[serde(default)]
    pub data: serde_json::Value,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default)]
    pub execution_time_ms: u64,
}

impl ToolResult {
    pub fn success(data: serde_json::Value) -> Self {
        Self {
            success: true,
            data,
            error: None,
            execution_time_ms: 0,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: serde_json::Value::Null,
            error: Some(message.into()),
            execution_time_ms: 0,
        }
    }

    /// Render a message-contract outcome
    pub fn from_outcome<T: Serialize>(outcome: Outcome<T>) -> Self {
        match outcome {
            Ok(value) => match serde_json::to_value(value) {
                Ok(data) => Self::success(data),
                Err(e) => Self::error(format!("Failed to serialize result: {}", e)),
            },
            Err(message) => Self::error(message),
        }
    }

    /// Render a structured-contract envelope; the full envelope is the data
    pub fn from_envelope<T: Serialize>(envelope: Envelope<T>) -> Self {
        let success = envelope.success;
        let error = (!success).then(|| envelope.error.clone());

        match serde_json::to_value(&envelope) {
            Ok(data) => Self {
                success,
                data,
                error,
                execution_time_ms: 0,
            },
            Err(e) => Self::error(format!("Failed to serialize result: {}", e)),
        }
    }

    pub fn with_execution_time(mut self, elapsed_ms: u64) -> Self {
        self.execution_time_ms = elapsed_ms;
        self
    }
}

/// A single agent-invokable operation
#[async_trait]
pub trait Tool: Send + Sync {
    /// Run the operation. `Err` is reserved for invocation misuse
    /// (missing arguments); operation failures come back as a failed `ToolResult`.
    async fn execute(&self, input: ToolInput) -> AtkResult<ToolResult>;

    fn config(&self) -> &ToolConfig;

    fn definition(&self) -> ToolDefinition {
        ToolDefinition::from(self.config())
    }
}

/// Executes tools by name
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    async fn execute_tool(&self, name: &str, input: ToolInput) -> AtkResult<ToolResult>;

    fn list_tools(&self) -> Vec<ToolDefinition>;

    fn get_tool(&self, name: &str) -> Option<Arc<dyn Tool>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Deserialize)]
    struct SearchArgs {
        index: String,
        #[serde(default = "default_size")]
        size: i64,
        #[serde(default)]
        query: Option<String>,
    }

    fn default_size() -> i64 {
        10
    }

    #[test]
    fn test_get_arg() {
        let input = ToolInput::new(json!({"index": "logs", "size": 5}));
        let index: String = input.get_arg("index").unwrap();
        let size: i64 = input.get_arg("size").unwrap();
        assert_eq!(index, "logs");
        assert_eq!(size, 5);

        assert!(input.get_arg::<String>("missing").is_err());
        assert!(input.get_arg::<String>("size").is_err());
    }

    #[test]
    fn test_parse_applies_defaults() {
        let input = ToolInput::new(json!({"index": "logs"}));
        let args: SearchArgs = input.parse().unwrap();
        assert_eq!(args.index, "logs");
        assert_eq!(args.size, 10);
        assert!(args.query.is_none());
    }

    #[test]
    fn test_parse_missing_required() {
        let input = ToolInput::new(serde_json::Value::Null);
        let err = input.parse::<SearchArgs>().unwrap_err();
        assert!(matches!(err, AtkError::InvalidArgument(_)));
    }

    #[test]
    fn test_from_outcome() {
        let ok = ToolResult::from_outcome::<serde_json::Value>(Ok(json!({"took": 3})));
        assert!(ok.success);
        assert_eq!(ok.data["took"], 3);
        assert!(ok.error.is_none());

        let err = ToolResult::from_outcome::<serde_json::Value>(Err(
            "Error searching Elasticsearch: boom".to_string(),
        ));
        assert!(!err.success);
        assert!(err.data.is_null());
        assert_eq!(err.error.as_deref(), Some("Error searching Elasticsearch: boom"));
    }

    #[test]
    fn test_from_envelope() {
        #[derive(Debug, Default, Serialize)]
        struct Run {
            output: String,
        }

        let failed = ToolResult::from_envelope(Envelope::<Run>::failed("exit 2"));
        assert!(!failed.success);
        assert_eq!(failed.data["success"], false);
        assert_eq!(failed.data["output"], "");
        assert_eq!(failed.data["error"], "exit 2");
        assert_eq!(failed.error.as_deref(), Some("exit 2"));

        let ok = ToolResult::from_envelope(Envelope::ok(Run {
            output: "done".into(),
        }));
        assert!(ok.success);
        assert!(ok.error.is_none());
        assert_eq!(ok.data["output"], "done");
        assert_eq!(ok.data["error"], "");
    }

    #[test]
    fn test_definition_from_config() {
        let config = ToolConfig {
            name: "elasticsearch_search".into(),
            description: "Search".into(),
            parameters: json!({"type": "object"}),
            tool_type: ToolType::Http,
            failure_contract: FailureContract::Message,
            timeout_secs: 30,
            extra: HashMap::new(),
        };
        let def = ToolDefinition::from(&config);
        assert_eq!(def.name, "elasticsearch_search");
        assert_eq!(def.failure_contract, FailureContract::Message);
    }
}
