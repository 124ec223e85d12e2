//! Slack Tools
//!
//! Post messages and read channels through the Slack Web API.
//!
//! ## Available Tools
//!
//! - `slack_post_message` - Post a message (optionally in a thread)
//! - `slack_list_channels` - List conversations visible to the bot
//! - `slack_channel_history` - Recent messages of a channel
//! - `slack_add_reaction` - React to a message with an emoji
//!
//! The Web API answers most failures with HTTP 200 and `{"ok": false, "error": "<code>"}`.

use atk_core::{
    AtkResult, FailureContract, HttpMethod, HttpRequest, HttpTransport, Outcome, ToolConfig,
    ToolInput, ToolResult, ToolType,
};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

use super::common::{
    clamp, create_schema, decode, describe, failure, fetch_json, flag, join_url, null_default,
    tool_config,
};
use crate::adapter::{unknown_operation, Adapter};
use crate::registry::ToolCategory;

pub const DEFAULT_SLACK_API: &str = "https://slack.com/api";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlackConfig {
    /// Bot token (`xoxb-...`)
    pub bot_token: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_channel: Option<String>,

    #[serde(default = "default_base_url")]
    pub base_url: String,
}

fn default_base_url() -> String {
    DEFAULT_SLACK_API.to_string()
}

impl SlackConfig {
    pub fn new(bot_token: impl Into<String>) -> Self {
        Self {
            bot_token: bot_token.into(),
            default_channel: None,
            base_url: default_base_url(),
        }
    }
}

pub struct Slack {
    config: SlackConfig,
    transport: Arc<dyn HttpTransport>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PostMessageParams {
    pub text: String,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub thread_ts: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListChannelsParams {
    #[serde(default = "default_channel_limit")]
    pub limit: i64,
    #[serde(default = "default_true")]
    pub exclude_archived: String,
    #[serde(default)]
    pub cursor: Option<String>,
}

fn default_channel_limit() -> i64 {
    100
}

fn default_true() -> String {
    "true".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChannelHistoryParams {
    pub channel: String,
    #[serde(default = "default_history_limit")]
    pub limit: i64,
}

fn default_history_limit() -> i64 {
    20
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddReactionParams {
    pub channel: String,
    pub timestamp: String,
    /// Emoji name with or without surrounding colons
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PostedMessage {
    pub channel: String,
    pub ts: String,
    pub text: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PostMessageResponse {
    #[serde(deserialize_with = "null_default")]
    channel: String,
    #[serde(deserialize_with = "null_default")]
    ts: String,
    #[serde(deserialize_with = "null_default")]
    message: SlackMessage,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TextValue {
    #[serde(deserialize_with = "null_default")]
    value: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireChannel {
    #[serde(deserialize_with = "null_default")]
    id: String,
    #[serde(deserialize_with = "null_default")]
    name: String,
    is_private: bool,
    is_archived: bool,
    is_member: bool,
    num_members: u64,
    #[serde(deserialize_with = "null_default")]
    topic: TextValue,
    #[serde(deserialize_with = "null_default")]
    purpose: TextValue,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Channel {
    pub id: String,
    pub name: String,
    pub is_private: bool,
    pub is_archived: bool,
    pub is_member: bool,
    pub num_members: u64,
    pub topic: String,
    pub purpose: String,
}

impl From<WireChannel> for Channel {
    fn from(channel: WireChannel) -> Self {
        Self {
            id: channel.id,
            name: channel.name,
            is_private: channel.is_private,
            is_archived: channel.is_archived,
            is_member: channel.is_member,
            num_members: channel.num_members,
            topic: channel.topic.value,
            purpose: channel.purpose.value,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ResponseMetadata {
    #[serde(deserialize_with = "null_default")]
    next_cursor: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ChannelsResponse {
    channels: Vec<WireChannel>,
    #[serde(deserialize_with = "null_default")]
    response_metadata: ResponseMetadata,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChannelList {
    pub channels: Vec<Channel>,
    pub count: usize,
    /// Empty when there are no more pages
    pub next_cursor: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlackMessage {
    #[serde(deserialize_with = "null_default")]
    pub ts: String,
    #[serde(deserialize_with = "null_default")]
    pub user: String,
    #[serde(deserialize_with = "null_default")]
    pub text: String,
    #[serde(deserialize_with = "null_default")]
    pub thread_ts: String,
    pub reply_count: u64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct HistoryResponse {
    messages: Vec<SlackMessage>,
    has_more: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChannelHistory {
    pub channel: String,
    pub messages: Vec<SlackMessage>,
    pub count: usize,
    pub has_more: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Reaction {
    pub channel: String,
    pub timestamp: String,
    pub name: String,
}

/// `ok: false` marks a failure; `error` holds the Slack error code
fn upstream_error(body: &Value) -> Option<String> {
    if body.get("ok").and_then(Value::as_bool) != Some(false) {
        return None;
    }
    Some(
        body.get("error")
            .and_then(describe)
            .unwrap_or_else(|| "Unknown error".to_string()),
    )
}

impl Slack {
    pub fn new(config: SlackConfig, transport: Arc<dyn HttpTransport>) -> Self {
        Self { config, transport }
    }

    fn request(&self, method: HttpMethod, api_method: &str) -> HttpRequest {
        HttpRequest::new(method, join_url(&self.config.base_url, api_method))
            .bearer_auth(&self.config.bot_token)
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

    pub async fn post_message(&self, params: PostMessageParams) -> Outcome<PostedMessage> {
        let channel = params
            .channel
            .filter(|c| !c.is_empty())
            .or_else(|| self.config.default_channel.clone().filter(|c| !c.is_empty()))
            .ok_or_else(|| "Error: No channel provided".to_string())?;

        let mut body = json!({ "channel": channel, "text": params.text });
        if let Some(thread_ts) = params.thread_ts.filter(|t| !t.is_empty()) {
            body["thread_ts"] = json!(thread_ts);
        }

        debug!(channel = %channel, "Posting Slack message");

        let request = self
            .request(HttpMethod::Post, "chat.postMessage")
            .json(body);
        let response: PostMessageResponse = self.call("posting message", request).await?;

        Ok(PostedMessage {
            channel: if response.channel.is_empty() {
                channel
            } else {
                response.channel
            },
            ts: response.ts,
            text: response.message.text,
        })
    }

    pub async fn list_channels(&self, params: ListChannelsParams) -> Outcome<ChannelList> {
        let limit = clamp(params.limit, 1, 1000);
        let exclude_archived = flag(&params.exclude_archived);

        let request = self
            .request(HttpMethod::Get, "conversations.list")
            .query("limit", limit)
            .query("exclude_archived", exclude_archived)
            .query_opt("cursor", params.cursor.filter(|c| !c.is_empty()));

        let response: ChannelsResponse = self.call("listing channels", request).await?;
        let channels: Vec<Channel> = response.channels.into_iter().map(Channel::from).collect();

        Ok(ChannelList {
            count: channels.len(),
            channels,
            next_cursor: response.response_metadata.next_cursor,
        })
    }

    pub async fn channel_history(&self, params: ChannelHistoryParams) -> Outcome<ChannelHistory> {
        let limit = clamp(params.limit, 1, 200);

        debug!(channel = %params.channel, limit = limit, "Reading Slack channel history");

        let request = self
            .request(HttpMethod::Get, "conversations.history")
            .query("channel", &params.channel)
            .query("limit", limit);

        let response: HistoryResponse = self.call("reading channel history", request).await?;
        Ok(ChannelHistory {
            channel: params.channel,
            count: response.messages.len(),
            messages: response.messages,
            has_more: response.has_more,
        })
    }

    pub async fn add_reaction(&self, params: AddReactionParams) -> Outcome<Reaction> {
        let name = params.name.trim_matches(':').to_string();

        let request = self.request(HttpMethod::Post, "reactions.add").json(json!({
            "channel": params.channel,
            "timestamp": params.timestamp,
            "name": name,
        }));

        let _: Value = self.call("adding reaction", request).await?;
        Ok(Reaction {
            channel: params.channel,
            timestamp: params.timestamp,
            name,
        })
    }
}

fn http_tool(name: &str, description: &str, parameters: Value) -> ToolConfig {
    tool_config(
        name,
        description,
        parameters,
        ToolType::Http,
        FailureContract::Message,
    )
}

#[async_trait]
impl Adapter for Slack {
    fn category(&self) -> ToolCategory {
        ToolCategory::Messaging
    }

    fn operations(&self) -> Vec<ToolConfig> {
        vec![
            http_tool(
                "slack_post_message",
                "Post a message to a Slack channel, optionally as a thread reply.",
                create_schema(
                    json!({
                        "text": { "type": "string", "description": "Message text (mrkdwn)" },
                        "channel": {
                            "type": "string",
                            "description": "Channel ID or name (defaults to the configured channel)"
                        },
                        "thread_ts": {
                            "type": "string",
                            "description": "Timestamp of the parent message to reply in its thread"
                        }
                    }),
                    vec!["text"],
                ),
            ),
            http_tool(
                "slack_list_channels",
                "List Slack channels visible to the bot.",
                create_schema(
                    json!({
                        "limit": {
                            "type": "integer",
                            "description": "Maximum channels to return (1-1000)",
                            "default": 100,
                            "minimum": 1,
                            "maximum": 1000
                        },
                        "exclude_archived": {
                            "type": "string",
                            "description": "Skip archived channels ('true'/'false')",
                            "enum": ["true", "false"],
                            "default": "true"
                        },
                        "cursor": {
                            "type": "string",
                            "description": "Pagination cursor from a previous call"
                        }
                    }),
                    vec![],
                ),
            ),
            http_tool(
                "slack_channel_history",
                "Get recent messages of a channel, newest first.",
                create_schema(
                    json!({
                        "channel": { "type": "string", "description": "Channel ID" },
                        "limit": {
                            "type": "integer",
                            "description": "Maximum messages to return (1-200)",
                            "default": 20,
                            "minimum": 1,
                            "maximum": 200
                        }
                    }),
                    vec!["channel"],
                ),
            ),
            http_tool(
                "slack_add_reaction",
                "Add an emoji reaction to a message.",
                create_schema(
                    json!({
                        "channel": { "type": "string", "description": "Channel ID" },
                        "timestamp": { "type": "string", "description": "Message timestamp (ts)" },
                        "name": { "type": "string", "description": "Emoji name (e.g., 'white_check_mark')" }
                    }),
                    vec!["channel", "timestamp", "name"],
                ),
            ),
        ]
    }

    async fn dispatch(&self, operation: &str, input: ToolInput) -> AtkResult<ToolResult> {
        Ok(match operation {
            "slack_post_message" => ToolResult::from_outcome(self.post_message(input.parse()?).await),
            "slack_list_channels" => {
                ToolResult::from_outcome(self.list_channels(input.parse()?).await)
            }
            "slack_channel_history" => {
                ToolResult::from_outcome(self.channel_history(input.parse()?).await)
            }
            "slack_add_reaction" => ToolResult::from_outcome(self.add_reaction(input.parse()?).await),
            other => return Err(unknown_operation(other)),
        })
    }
}
