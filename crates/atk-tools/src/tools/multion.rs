//! MultiOn Tools
//!
//! Drive MultiOn's browser agent: natural-language browsing, structured data
//! retrieval and session management.
//!
//! ## Available Tools
//!
//! - `multion_browse` - Run a browsing command
//! - `multion_retrieve` - Extract fields from a page
//! - `multion_create_session` - Open a browser session
//! - `multion_close_session` - Close a browser session
//! - `multion_batch_browse` - Run commands in order in one session
//!
//! Every operation returns a structured result (`success`, fields, `error`).

use atk_core::{
    AtkResult, Envelope, FailureContract, HttpMethod, HttpRequest, HttpTransport, Outcome,
    ToolConfig, ToolInput, ToolResult, ToolType,
};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

use super::common::{
    clamp, create_schema, decode, describe, failure, fetch_json, flag, join_url, null_default,
    path_segment, tool_config,
};
use crate::adapter::{unknown_operation, Adapter};
use crate::registry::ToolCategory;

pub const DEFAULT_MULTION_API: &str = "https://api.multion.ai/v1";

const NO_COMMAND: &str = "Error: No command provided";
const NO_COMMANDS: &str = "Error: No commands provided";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultiOnConfig {
    pub api_key: String,

    #[serde(default = "default_base_url")]
    pub base_url: String,
}

fn default_base_url() -> String {
    DEFAULT_MULTION_API.to_string()
}

impl MultiOnConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: default_base_url(),
        }
    }
}

pub struct MultiOn {
    config: MultiOnConfig,
    transport: Arc<dyn HttpTransport>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BrowseParams {
    pub cmd: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default = "default_max_steps")]
    pub max_steps: i64,
    #[serde(default = "default_false")]
    pub include_screenshot: String,
}

fn default_max_steps() -> i64 {
    20
}

fn default_false() -> String {
    "false".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetrieveParams {
    pub cmd: String,
    pub url: String,
    #[serde(default)]
    pub fields: Vec<String>,
    #[serde(default = "default_max_items")]
    pub max_items: i64,
}

fn default_max_items() -> i64 {
    10
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateSessionParams {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CloseSessionParams {
    pub session_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BatchBrowseParams {
    pub commands: Vec<String>,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowseResult {
    #[serde(deserialize_with = "null_default")]
    pub message: String,
    #[serde(deserialize_with = "null_default")]
    pub status: String,
    #[serde(deserialize_with = "null_default")]
    pub url: String,
    #[serde(deserialize_with = "null_default")]
    pub session_id: String,
    #[serde(deserialize_with = "null_default")]
    pub screenshot: String,
}

impl Default for BrowseResult {
    fn default() -> Self {
        Self {
            message: String::new(),
            status: "unknown".to_string(),
            url: String::new(),
            session_id: String::new(),
            screenshot: String::new(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RetrieveResponse {
    #[serde(deserialize_with = "null_default")]
    data: Vec<Value>,
    #[serde(deserialize_with = "null_default")]
    session_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RetrieveResult {
    pub url: String,
    pub data: Vec<Value>,
    pub count: usize,
    pub session_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Session {
    #[serde(deserialize_with = "null_default")]
    pub session_id: String,
    #[serde(deserialize_with = "null_default")]
    pub url: String,
    #[serde(deserialize_with = "null_default")]
    pub status: String,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            session_id: String::new(),
            url: String::new(),
            status: "unknown".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ClosedSession {
    pub session_id: String,
    pub closed: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchBrowse {
    /// Completed steps, in order; on failure the steps before it
    pub steps: Vec<BrowseResult>,
    pub count: usize,
    pub session_id: String,
}

fn upstream_error(body: &Value) -> Option<String> {
    body.get("error").and_then(describe)
}

impl MultiOn {
    pub fn new(config: MultiOnConfig, transport: Arc<dyn HttpTransport>) -> Self {
        Self { config, transport }
    }

    fn request(&self, method: HttpMethod, path: &str) -> HttpRequest {
        HttpRequest::new(method, join_url(&self.config.base_url, path))
            .header("X_MULTION_API_KEY", &self.config.api_key)
    }

    async fn call<T: DeserializeOwned + Default>(
        &self,
        action: &str,
        request: HttpRequest,
    ) -> Outcome<T> {
        let body = fetch_json(self.transport.as_ref(), request, upstream_error)
            .await
            .map_err(|e| failure(action, &e))?;
        decode(body).map_err(|e| failure(action, &e))
    }

    pub async fn browse(&self, params: BrowseParams) -> Envelope<BrowseResult> {
        if params.cmd.trim().is_empty() {
            return Envelope::failed(NO_COMMAND);
        }

        let mut body = json!({
            "cmd": params.cmd,
            "max_steps": clamp(params.max_steps, 1, 100),
            "include_screenshot": flag(&params.include_screenshot)
        });
        if let Some(url) = params.url.filter(|u| !u.is_empty()) {
            body["url"] = json!(url);
        }
        if let Some(session_id) = params.session_id.filter(|s| !s.is_empty()) {
            body["session_id"] = json!(session_id);
        }

        debug!(cmd = %params.cmd, "Browsing");

        let request = self.request(HttpMethod::Post, "web/browse").json(body);
        self.call::<BrowseResult>("browsing", request).await.into()
    }

    pub async fn retrieve(&self, params: RetrieveParams) -> Envelope<RetrieveResult> {
        if params.cmd.trim().is_empty() {
            return Envelope::failed(NO_COMMAND);
        }

        let mut body = json!({
            "cmd": params.cmd,
            "url": params.url,
            "maxItems": clamp(params.max_items, 1, 100)
        });
        if !params.fields.is_empty() {
            body["fields"] = json!(params.fields);
        }

        debug!(url = %params.url, fields = params.fields.len(), "Retrieving page data");

        let request = self.request(HttpMethod::Post, "web/retrieve").json(body);
        self.call::<RetrieveResponse>("retrieving data", request)
            .await
            .map(|response| RetrieveResult {
                url: params.url,
                count: response.data.len(),
                data: response.data,
                session_id: response.session_id,
            })
            .into()
    }

    pub async fn create_session(&self, params: CreateSessionParams) -> Envelope<Session> {
        let request = self
            .request(HttpMethod::Post, "session")
            .json(json!({ "url": params.url }));

        self.call::<Session>("creating session", request)
            .await
            .map(|mut session| {
                if session.url.is_empty() {
                    session.url = params.url;
                }
                session
            })
            .into()
    }

    pub async fn close_session(&self, params: CloseSessionParams) -> Envelope<ClosedSession> {
        let request = self.request(
            HttpMethod::Delete,
            &format!("session/{}", path_segment(&params.session_id)),
        );

        self.call::<Value>("closing session", request)
            .await
            .map(|_| ClosedSession {
                session_id: params.session_id,
                closed: true,
            })
            .into()
    }

    /// Commands run in order in one session; the first failure stops the batch
    /// and the result keeps the steps completed before it
    pub async fn batch_browse(&self, params: BatchBrowseParams) -> Envelope<BatchBrowse> {
        if params.commands.is_empty() {
            return Envelope::failed(NO_COMMANDS);
        }

        let mut batch = BatchBrowse::default();
        let mut url = params.url;

        for (index, cmd) in params.commands.into_iter().enumerate() {
            let step = BrowseParams {
                cmd,
                url: url.take(),
                session_id: Some(batch.session_id.clone()),
                max_steps: default_max_steps(),
                include_screenshot: default_false(),
            };

            let result = self.browse(step).await;
            if !result.success {
                let error = format!("{} (step {} of batch)", result.error, index + 1);
                return Envelope::failed_with(batch, error);
            }

            if !result.data.session_id.is_empty() {
                batch.session_id = result.data.session_id.clone();
            }
            batch.steps.push(result.data);
            batch.count = batch.steps.len();
        }

        Envelope::ok(batch)
    }
}

fn browser_tool(name: &str, description: &str, parameters: Value) -> ToolConfig {
    tool_config(
        name,
        description,
        parameters,
        ToolType::Http,
        FailureContract::Structured,
    )
}

#[async_trait]
impl Adapter for MultiOn {
    fn category(&self) -> ToolCategory {
        ToolCategory::Browser
    }

    fn operations(&self) -> Vec<ToolConfig> {
        vec![
            browser_tool(
                "multion_browse",
                "Run a natural-language browsing command (e.g., 'find the cheapest flight to Lisbon').",
                create_schema(
                    json!({
                        "cmd": { "type": "string", "description": "What the agent should do" },
                        "url": { "type": "string", "description": "Starting URL" },
                        "session_id": { "type": "string", "description": "Continue an existing session" },
                        "max_steps": {
                            "type": "integer",
                            "description": "Maximum browser actions (1-100)",
                            "default": 20,
                            "minimum": 1,
                            "maximum": 100
                        },
                        "include_screenshot": {
                            "type": "string",
                            "description": "Return a screenshot of the final page ('true'/'false')",
                            "enum": ["true", "false"],
                            "default": "false"
                        }
                    }),
                    vec!["cmd"],
                ),
            ),
            browser_tool(
                "multion_retrieve",
                "Extract structured data from a web page.",
                create_schema(
                    json!({
                        "cmd": { "type": "string", "description": "What to extract" },
                        "url": { "type": "string", "description": "Page URL" },
                        "fields": {
                            "type": "array",
                            "items": { "type": "string" },
                            "description": "Field names for each extracted item"
                        },
                        "max_items": {
                            "type": "integer",
                            "description": "Maximum items (1-100)",
                            "default": 10,
                            "minimum": 1,
                            "maximum": 100
                        }
                    }),
                    vec!["cmd", "url"],
                ),
            ),
            browser_tool(
                "multion_create_session",
                "Open a browser session at a URL.",
                create_schema(
                    json!({ "url": { "type": "string", "description": "Starting URL" } }),
                    vec!["url"],
                ),
            ),
            browser_tool(
                "multion_close_session",
                "Close a browser session.",
                create_schema(
                    json!({ "session_id": { "type": "string", "description": "Session ID" } }),
                    vec!["session_id"],
                ),
            ),
            browser_tool(
                "multion_batch_browse",
                "Run several browsing commands in order within one session.",
                create_schema(
                    json!({
                        "commands": {
                            "type": "array",
                            "items": { "type": "string" },
                            "description": "Commands, in order"
                        },
                        "url": { "type": "string", "description": "Starting URL for the first command" }
                    }),
                    vec!["commands"],
                ),
            ),
        ]
    }

    async fn dispatch(&self, operation: &str, input: ToolInput) -> AtkResult<ToolResult> {
        Ok(match operation {
            "multion_browse" => ToolResult::from_envelope(self.browse(input.parse()?).await),
            "multion_retrieve" => ToolResult::from_envelope(self.retrieve(input.parse()?).await),
            "multion_create_session" => {
                ToolResult::from_envelope(self.create_session(input.parse()?).await)
            }
            "multion_close_session" => {
                ToolResult::from_envelope(self.close_session(input.parse()?).await)
            }
            "multion_batch_browse" => {
                ToolResult::from_envelope(self.batch_browse(input.parse()?).await)
            }
            other => return Err(unknown_operation(other)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockTransport;

    fn adapter(mock: &Arc<MockTransport>) -> MultiOn {
        MultiOn::new(MultiOnConfig::new("mo-key"), mock.clone())
    }

    fn browse(cmd: &str) -> BrowseParams {
        serde_json::from_value(json!({ "cmd": cmd })).unwrap()
    }

    #[tokio::test]
    async fn test_browse_request() {
        let mock = MockTransport::new();
        mock.push_json(
            200,
            json!({"message": "Found 3 results", "status": "DONE", "url": "https://example.com/s", "session_id": "s-1"}),
        );

        let mut params = browse("search for rust books");
        params.url = Some("https://example.com".into());
        params.max_steps = 500;
        let envelope = adapter(&mock).browse(params).await;

        let request = mock.last_request();
        assert_eq!(request.url, "https://api.multion.ai/v1/web/browse");
        assert_eq!(request.header_value("X_MULTION_API_KEY"), Some("mo-key"));
        let body = request.json_body().unwrap();
        assert_eq!(body["max_steps"], 100);
        assert_eq!(body["include_screenshot"], false);
        assert_eq!(body["url"], "https://example.com");
        assert!(body.get("session_id").is_none());

        assert!(envelope.success);
        assert_eq!(envelope.data.status, "DONE");
        assert_eq!(envelope.data.session_id, "s-1");
    }

    #[tokio::test]
    async fn test_browse_upstream_error() {
        let mock = MockTransport::new();
        mock.push_json(200, json!({"error": "Invalid API key"}));

        let envelope = adapter(&mock).browse(browse("go")).await;
        let value = serde_json::to_value(&envelope).unwrap();
        assert_eq!(value["success"], false);
        assert_eq!(value["status"], "unknown");
        assert_eq!(value["message"], "");
        assert_eq!(value["error"], "Error browsing: Invalid API key");
    }

    #[tokio::test]
    async fn test_browse_requires_command() {
        let mock = MockTransport::new();
        let envelope = adapter(&mock).browse(browse("")).await;
        assert_eq!(envelope.error, NO_COMMAND);
        assert_eq!(mock.request_count(), 0);
    }

    #[tokio::test]
    async fn test_retrieve() {
        let mock = MockTransport::new();
        mock.push_json(
            200,
            json!({"data": [{"title": "A", "price": "$1"}, {"title": "B", "price": "$2"}]}),
        );

        let envelope = adapter(&mock)
            .retrieve(RetrieveParams {
                cmd: "list products".into(),
                url: "https://shop.example.com".into(),
                fields: vec!["title".into(), "price".into()],
                max_items: 0,
            })
            .await;

        let body = mock.last_request().json_body().cloned().unwrap();
        assert_eq!(body["maxItems"], 1);
        assert_eq!(body["fields"], json!(["title", "price"]));
        assert_eq!(envelope.data.count, 2);
        assert_eq!(envelope.data.url, "https://shop.example.com");
    }

    #[tokio::test]
    async fn test_sessions() {
        let mock = MockTransport::new();
        mock.push_json(200, json!({"session_id": "s-9", "status": "CONTINUE"}))
            .push_json(200, json!({"status": "closed"}));
        let multion = adapter(&mock);

        let session = multion
            .create_session(CreateSessionParams {
                url: "https://example.com".into(),
            })
            .await;
        assert_eq!(session.data.session_id, "s-9");
        assert_eq!(session.data.url, "https://example.com");

        let closed = multion
            .close_session(CloseSessionParams {
                session_id: "s-9".into(),
            })
            .await;
        let request = mock.last_request();
        assert_eq!(request.method, HttpMethod::Delete);
        assert!(request.url.ends_with("/session/s-9"));
        assert!(closed.data.closed);
    }

    #[tokio::test]
    async fn test_batch_carries_session_forward() {
        let mock = MockTransport::new();
        mock.push_json(200, json!({"message": "opened", "status": "CONTINUE", "session_id": "s-1"}))
            .push_json(200, json!({"message": "clicked", "status": "DONE", "session_id": "s-1"}));

        let envelope = adapter(&mock)
            .batch_browse(BatchBrowseParams {
                commands: vec!["open the site".into(), "click login".into()],
                url: Some("https://example.com".into()),
            })
            .await;

        let requests = mock.requests();
        let first = requests[0].json_body().unwrap();
        let second = requests[1].json_body().unwrap();
        assert_eq!(first["url"], "https://example.com");
        assert!(first.get("session_id").is_none());
        assert!(second.get("url").is_none());
        assert_eq!(second["session_id"], "s-1");

        assert!(envelope.success);
        assert_eq!(envelope.data.count, 2);
        assert_eq!(envelope.data.session_id, "s-1");
    }

    #[tokio::test]
    async fn test_batch_failure_keeps_completed_steps() {
        let mock = MockTransport::new();
        mock.push_json(200, json!({"message": "opened", "session_id": "s-2"}))
            .push_json(500, json!({"error": "browser crashed"}));

        let envelope = adapter(&mock)
            .batch_browse(BatchBrowseParams {
                commands: vec!["a".into(), "b".into(), "c".into()],
                url: None,
            })
            .await;

        assert_eq!(mock.request_count(), 2);
        assert!(!envelope.success);
        assert_eq!(envelope.data.count, 1);
        assert_eq!(envelope.data.steps[0].message, "opened");
        assert_eq!(
            envelope.error,
            "Error browsing: browser crashed (step 2 of batch)"
        );
    }

    #[tokio::test]
    async fn test_batch_requires_commands() {
        let mock = MockTransport::new();
        let envelope = adapter(&mock)
            .batch_browse(BatchBrowseParams {
                commands: vec![],
                url: None,
            })
            .await;
        assert_eq!(envelope.error, NO_COMMANDS);
        assert_eq!(envelope.data, BatchBrowse::default());
    }
}
