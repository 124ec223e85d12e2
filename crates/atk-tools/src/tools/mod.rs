//! Tool implementations
//!
//! Each adapter lives in its own module and can be enabled/disabled via feature flags.
//!
//! ## HTTP adapters
//! - `elasticsearch` - Search and document operations
//! - `kubernetes` - Pods, deployments and namespaces via the API server
//! - `gitlab` - Projects, issues, merge requests and pipelines
//! - `twilio` - SMS, voice calls and verification
//! - `slack` - Messages, channels and reactions
//! - `woocommerce` - Products and orders
//! - `elevenlabs` - Text-to-speech
//! - `multion` - Browser automation agent
//!
//! ## Local adapters
//! - `ansible` - Playbooks and ad-hoc commands via the Ansible CLI
//! - `docker` - Containers and images via the Engine API socket
//! - `file` - File management under an optional base directory

#[cfg(feature = "search")]
pub mod elasticsearch;

#[cfg(feature = "kubernetes")]
pub mod kubernetes;

#[cfg(feature = "git")]
pub mod gitlab;

#[cfg(feature = "messaging")]
pub mod twilio;

#[cfg(feature = "messaging")]
pub mod slack;

#[cfg(feature = "commerce")]
pub mod woocommerce;

#[cfg(feature = "automation")]
pub mod ansible;

#[cfg(feature = "docker")]
pub mod docker;

#[cfg(feature = "file")]
pub mod file;

#[cfg(feature = "speech")]
pub mod elevenlabs;

#[cfg(feature = "browser")]
pub mod multion;

/// Common utilities for tool implementations
pub mod common {
    use atk_core::{FailureContract, HttpRequest, HttpResponse, HttpTransport, ToolConfig, ToolType};
    use serde::de::DeserializeOwned;
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;
    use std::collections::HashMap;

    /// Signature of the per-API upstream error detector
    pub type UpstreamError = fn(&Value) -> Option<String>;

    /// Create a standard JSON schema for a tool with required and optional parameters
    pub fn create_schema(properties: Value, required: Vec<&str>) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": properties,
            "required": required
        })
    }

    /// Create a tool config
    pub fn tool_config(
        name: &str,
        description: &str,
        parameters: Value,
        tool_type: ToolType,
        failure_contract: FailureContract,
    ) -> ToolConfig {
        tool_config_with_timeout(
            name,
            description,
            parameters,
            tool_type,
            failure_contract,
            atk_core::DEFAULT_TOOL_TIMEOUT_SECS,
        )
    }

    /// Create a tool config with custom timeout
    pub fn tool_config_with_timeout(
        name: &str,
        description: &str,
        parameters: Value,
        tool_type: ToolType,
        failure_contract: FailureContract,
        timeout_secs: u64,
    ) -> ToolConfig {
        ToolConfig {
            name: name.to_string(),
            description: description.to_string(),
            parameters,
            tool_type,
            failure_contract,
            timeout_secs,
            extra: HashMap::new(),
        }
    }

    /// `max(low, min(value, high))`
    pub fn clamp<T: PartialOrd>(value: T, low: T, high: T) -> T {
        let capped = if value > high { high } else { value };
        if capped < low {
            low
        } else {
            capped
        }
    }

    /// Boolean-like string flags are true only when exactly `"true"`
    pub fn flag(value: &str) -> bool {
        value == "true"
    }

    /// Join a base URL and a path with exactly one slash
    pub fn join_url(base: &str, path: &str) -> String {
        format!(
            "{}/{}",
            base.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Percent-encode one caller-supplied URL path segment.
    ///
    /// Sub-delimiters such as `*` and `,` stay literal so index patterns and
    /// multi-target expressions keep working; `/`, `?`, `#` and `%` are encoded.
    pub fn path_segment(value: &str) -> String {
        let mut encoded = String::with_capacity(value.len());
        for c in value.chars() {
            if c.is_ascii_alphanumeric() || "-._~!$&'()*+,;=:@".contains(c) {
                encoded.push(c);
            } else {
                let mut buf = [0u8; 4];
                encoded.push_str(&urlencoding::encode(c.encode_utf8(&mut buf)));
            }
        }
        encoded
    }

    /// Message-contract failure text: `Error <action>: <reason>`
    pub fn failure(action: &str, reason: &str) -> String {
        let reason = reason.trim();
        let reason = if reason.is_empty() { "Unknown error" } else { reason };
        format!("Error {}: {}", action, reason)
    }

    /// Best human-readable rendering of an upstream error value
    pub fn describe(value: &Value) -> Option<String> {
        match value {
            Value::Null => None,
            Value::String(s) if s.is_empty() => None,
            Value::String(s) => Some(s.clone()),
            Value::Object(map) => ["message", "reason", "detail", "error"]
                .iter()
                .find_map(|key| map.get(*key).and_then(describe))
                .or_else(|| Some(value.to_string())),
            other => Some(other.to_string()),
        }
    }

    /// Decode a JSON body, surfacing upstream-reported failures.
    ///
    /// The upstream marker wins over the status code: some APIs report errors
    /// with a 200, others return useful bodies alongside 4xx.
    pub fn read_json(response: &HttpResponse, upstream_error: UpstreamError) -> Result<Value, String> {
        let body = match response.to_json() {
            Ok(body) => body,
            Err(e) if response.is_success() => return Err(e.to_string()),
            Err(_) => Value::Null,
        };

        if let Some(message) = upstream_error(&body) {
            return Err(message);
        }

        if !response.is_success() {
            return Err(status_reason(response));
        }

        Ok(body)
    }

    /// Perform a request and decode its JSON body
    pub async fn fetch_json(
        transport: &dyn HttpTransport,
        request: HttpRequest,
        upstream_error: UpstreamError,
    ) -> Result<Value, String> {
        let response = transport
            .request(request)
            .await
            .map_err(|e| e.to_string())?;
        read_json(&response, upstream_error)
    }

    /// `HTTP <status>` with a short excerpt of the body when there is one
    pub fn status_reason(response: &HttpResponse) -> String {
        let content = response.content();
        let excerpt: String = content.trim().chars().take(200).collect();
        if excerpt.is_empty() {
            format!("HTTP {}", response.status_code())
        } else {
            format!("HTTP {}: {}", response.status_code(), excerpt)
        }
    }

    /// Deserialize a wire payload into an output type, defaulting every missing field
    pub fn decode<T: DeserializeOwned + Default>(value: Value) -> Result<T, String> {
        if value.is_null() {
            return Ok(T::default());
        }
        serde_json::from_value(value).map_err(|e| format!("unexpected response shape: {}", e))
    }

    /// Treat an explicit `null` like a missing field
    pub fn null_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: Deserialize<'de> + Default,
    {
        Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
    }

    /// Accept a number, a numeric string, or null
    pub fn lenient_u64<'de, D>(deserializer: D) -> Result<u64, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Value::deserialize(deserializer)? {
            Value::Number(n) => n.as_u64().unwrap_or_default(),
            Value::String(s) => s.trim().parse().unwrap_or_default(),
            _ => 0,
        })
    }

    /// Accept a string, a number, or null as a string
    pub fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Value::deserialize(deserializer)? {
            Value::String(s) => s,
            Value::Null => String::new(),
            other => other.to_string(),
        })
    }

}
