//! Twilio Tools
//!
//! SMS, voice calls and phone verification through the Twilio REST API.
//!
//! ## Available Tools
//!
//! - `twilio_send_sms` - Send an SMS
//! - `twilio_make_call` - Place an outbound call driven by TwiML or a TwiML URL
//! - `twilio_send_verification` - Start a Verify check (SMS, call, email)
//! - `twilio_check_verification` - Check a verification code
//! - `twilio_list_messages` - List recent messages
//!
//! ## Authentication
//!
//! HTTP basic auth with the account SID and auth token. Request bodies are
//! form encoded.

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
    clamp, create_schema, decode, describe, failure, fetch_json, join_url, lenient_string,
    null_default, tool_config,
};
use crate::adapter::{unknown_operation, Adapter};
use crate::registry::ToolCategory;

pub const DEFAULT_API_BASE: &str = "https://api.twilio.com/2010-04-01";
pub const DEFAULT_VERIFY_BASE: &str = "https://verify.twilio.com/v2";

const NO_SENDER: &str = "Error: No sender phone number provided";
const NO_VERIFY_SERVICE: &str = "Error: No verification service configured";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TwilioConfig {
    pub account_sid: String,
    pub auth_token: String,

    /// Sender used when an operation does not pass `from`
    #[serde(default)]
    pub from_number: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verify_service_sid: Option<String>,

    #[serde(default = "default_api_base")]
    pub api_base: String,

    #[serde(default = "default_verify_base")]
    pub verify_base: String,
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

fn default_verify_base() -> String {
    DEFAULT_VERIFY_BASE.to_string()
}

impl TwilioConfig {
    pub fn new(account_sid: impl Into<String>, auth_token: impl Into<String>) -> Self {
        Self {
            account_sid: account_sid.into(),
            auth_token: auth_token.into(),
            from_number: String::new(),
            verify_service_sid: None,
            api_base: default_api_base(),
            verify_base: default_verify_base(),
        }
    }
}

pub struct Twilio {
    config: TwilioConfig,
    transport: Arc<dyn HttpTransport>,
}

// ============================================================================
// Parameters
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct SendSmsParams {
    pub to: String,
    pub body: String,
    #[serde(default)]
    pub from: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MakeCallParams {
    pub to: String,
    /// Inline TwiML, e.g. `<Response><Say>Hello</Say></Response>`
    #[serde(default)]
    pub twiml: Option<String>,
    /// URL returning TwiML
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub from: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SendVerificationParams {
    pub to: String,
    #[serde(default = "default_channel")]
    pub channel: String,
}

fn default_channel() -> String {
    "sms".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckVerificationParams {
    pub to: String,
    pub code: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListMessagesParams {
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    20
}

// ============================================================================
// Results
// ============================================================================

fn unknown() -> String {
    "unknown".to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Message {
    #[serde(deserialize_with = "null_default")]
    pub sid: String,
    #[serde(default = "unknown")]
    pub status: String,
    #[serde(deserialize_with = "null_default")]
    pub to: String,
    #[serde(deserialize_with = "null_default")]
    pub from: String,
    #[serde(deserialize_with = "null_default")]
    pub body: String,
    #[serde(deserialize_with = "null_default")]
    pub direction: String,
    #[serde(deserialize_with = "lenient_string")]
    pub num_segments: String,
    #[serde(deserialize_with = "lenient_string")]
    pub price: String,
    #[serde(deserialize_with = "null_default")]
    pub error_message: String,
    #[serde(deserialize_with = "null_default")]
    pub date_created: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MessageList {
    pub messages: Vec<Message>,
    pub count: usize,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct MessagePage {
    #[serde(deserialize_with = "null_default")]
    messages: Vec<Message>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Call {
    #[serde(deserialize_with = "null_default")]
    pub sid: String,
    #[serde(default = "unknown")]
    pub status: String,
    #[serde(deserialize_with = "null_default")]
    pub to: String,
    #[serde(deserialize_with = "null_default")]
    pub from: String,
    #[serde(deserialize_with = "null_default")]
    pub direction: String,
    #[serde(deserialize_with = "null_default")]
    pub date_created: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Verification {
    #[serde(deserialize_with = "null_default")]
    pub sid: String,
    #[serde(deserialize_with = "null_default")]
    pub to: String,
    #[serde(deserialize_with = "null_default")]
    pub channel: String,
    /// `pending`, `approved`, `canceled`
    #[serde(default = "unknown")]
    pub status: String,
    #[serde(deserialize_with = "null_default")]
    pub valid: bool,
}

/// Twilio errors carry a numeric `code` next to `message`
fn upstream_error(body: &Value) -> Option<String> {
    let code = match body.get("code")? {
        Value::Null => return None,
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    let message = body
        .get("message")
        .and_then(describe)
        .unwrap_or_else(|| "Unknown error".to_string());
    Some(format!("{} (code {})", message, code))
}

fn form(fields: &[(&str, &str)]) -> Vec<(String, String)> {
    fields
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

impl Twilio {
    pub fn new(config: TwilioConfig, transport: Arc<dyn HttpTransport>) -> Self {
        Self { config, transport }
    }

    fn request(&self, method: HttpMethod, url: String) -> HttpRequest {
        HttpRequest::new(method, url).basic_auth(
            self.config.account_sid.clone(),
            Some(self.config.auth_token.clone()),
        )
    }

    fn account_url(&self, resource: &str) -> String {
        join_url(
            &self.config.api_base,
            &format!("Accounts/{}/{}", self.config.account_sid, resource),
        )
    }

    fn sender(&self, from: Option<String>) -> Option<String> {
        from.filter(|f| !f.is_empty()).or_else(|| {
            Some(self.config.from_number.clone()).filter(|f| !f.is_empty())
        })
    }

    fn verify_service(&self) -> Option<&str> {
        self.config
            .verify_service_sid
            .as_deref()
            .filter(|sid| !sid.is_empty())
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

    pub async fn send_sms(&self, params: SendSmsParams) -> Outcome<Message> {
        let from = self.sender(params.from).ok_or_else(|| NO_SENDER.to_string())?;

        debug!(to = %params.to, from = %from, "Sending SMS");

        let request = self
            .request(HttpMethod::Post, self.account_url("Messages.json"))
            .form(form(&[
                ("To", params.to.as_str()),
                ("From", from.as_str()),
                ("Body", params.body.as_str()),
            ]));

        self.call("sending SMS", request).await
    }

    pub async fn make_call(&self, params: MakeCallParams) -> Outcome<Call> {
        let from = self.sender(params.from).ok_or_else(|| NO_SENDER.to_string())?;

        let instructions = match (
            params.twiml.filter(|t| !t.is_empty()),
            params.url.filter(|u| !u.is_empty()),
        ) {
            (Some(twiml), None) => ("Twiml", twiml),
            (None, Some(url)) => ("Url", url),
            _ => return Err("Error: Provide exactly one of twiml or url".to_string()),
        };

        debug!(to = %params.to, from = %from, "Placing call");

        let request = self
            .request(HttpMethod::Post, self.account_url("Calls.json"))
            .form(form(&[
                ("To", params.to.as_str()),
                ("From", from.as_str()),
                (instructions.0, instructions.1.as_str()),
            ]));

        self.call("making call", request).await
    }

    pub async fn send_verification(&self, params: SendVerificationParams) -> Outcome<Verification> {
        let service = self
            .verify_service()
            .ok_or_else(|| NO_VERIFY_SERVICE.to_string())?;

        debug!(to = %params.to, channel = %params.channel, "Starting verification");

        let url = join_url(
            &self.config.verify_base,
            &format!("Services/{}/Verifications", service),
        );
        let request = self
            .request(HttpMethod::Post, url)
            .form(form(&[
                ("To", params.to.as_str()),
                ("Channel", params.channel.as_str()),
            ]));

        self.call("sending verification", request).await
    }

    pub async fn check_verification(
        &self,
        params: CheckVerificationParams,
    ) -> Outcome<Verification> {
        let service = self
            .verify_service()
            .ok_or_else(|| NO_VERIFY_SERVICE.to_string())?;

        let url = join_url(
            &self.config.verify_base,
            &format!("Services/{}/VerificationCheck", service),
        );
        let request = self
            .request(HttpMethod::Post, url)
            .form(form(&[
                ("To", params.to.as_str()),
                ("Code", params.code.as_str()),
            ]));

        self.call("checking verification", request).await
    }

    pub async fn list_messages(&self, params: ListMessagesParams) -> Outcome<MessageList> {
        let page_size = clamp(params.limit, 1, 1000);

        let request = self
            .request(HttpMethod::Get, self.account_url("Messages.json"))
            .query("PageSize", page_size)
            .query_opt("To", params.to.filter(|t| !t.is_empty()))
            .query_opt("From", params.from.filter(|f| !f.is_empty()));

        let page: MessagePage = self.call("listing messages", request).await?;
        Ok(MessageList {
            count: page.messages.len(),
            messages: page.messages,
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
impl Adapter for Twilio {
    fn category(&self) -> ToolCategory {
        ToolCategory::Messaging
    }

    fn operations(&self) -> Vec<ToolConfig> {
        let phone = |what: &str| {
            json!({
                "type": "string",
                "description": format!("{} phone number in E.164 format (e.g., +14155550100)", what)
            })
        };

        vec![
            http_tool(
                "twilio_send_sms",
                "Send an SMS message.",
                create_schema(
                    json!({
                        "to": phone("Recipient"),
                        "body": { "type": "string", "description": "Message text" },
                        "from": phone("Sender (defaults to the configured number)")
                    }),
                    vec!["to", "body"],
                ),
            ),
            http_tool(
                "twilio_make_call",
                "Place an outbound voice call. Provide either inline TwiML or a URL serving TwiML.",
                create_schema(
                    json!({
                        "to": phone("Recipient"),
                        "twiml": { "type": "string", "description": "Inline TwiML instructions" },
                        "url": { "type": "string", "description": "URL returning TwiML instructions" },
                        "from": phone("Caller (defaults to the configured number)")
                    }),
                    vec!["to"],
                ),
            ),
            http_tool(
                "twilio_send_verification",
                "Send a verification code with Twilio Verify.",
                create_schema(
                    json!({
                        "to": { "type": "string", "description": "Phone number or email address" },
                        "channel": {
                            "type": "string",
                            "description": "Delivery channel",
                            "enum": ["sms", "call", "email", "whatsapp"],
                            "default": "sms"
                        }
                    }),
                    vec!["to"],
                ),
            ),
            http_tool(
                "twilio_check_verification",
                "Check a verification code. Status 'approved' means the code was correct.",
                create_schema(
                    json!({
                        "to": { "type": "string", "description": "Phone number or email address" },
                        "code": { "type": "string", "description": "Code entered by the user" }
                    }),
                    vec!["to", "code"],
                ),
            ),
            http_tool(
                "twilio_list_messages",
                "List recent messages, optionally filtered by recipient or sender.",
                create_schema(
                    json!({
                        "to": phone("Recipient"),
                        "from": phone("Sender"),
                        "limit": {
                            "type": "integer",
                            "description": "Maximum messages to return (1-1000)",
                            "default": 20,
                            "minimum": 1,
                            "maximum": 1000
                        }
                    }),
                    vec![],
                ),
            ),
        ]
    }

    async fn dispatch(&self, operation: &str, input: ToolInput) -> AtkResult<ToolResult> {
        Ok(match operation {
            "twilio_send_sms" => ToolResult::from_outcome(self.send_sms(input.parse()?).await),
            "twilio_make_call" => ToolResult::from_outcome(self.make_call(input.parse()?).await),
            "twilio_send_verification" => {
                ToolResult::from_outcome(self.send_verification(input.parse()?).await)
            }
            "twilio_check_verification" => {
                ToolResult::from_outcome(self.check_verification(input.parse()?).await)
            }
            "twilio_list_messages" => {
                ToolResult::from_outcome(self.list_messages(input.parse()?).await)
            }
            other => return Err(unknown_operation(other)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockTransport;

    fn config() -> TwilioConfig {
        let mut config = TwilioConfig::new("AC123", "secret");
        config.from_number = "+15550001111".into();
        config
    }

    fn sms(to: &str, body: &str, from: Option<&str>) -> SendSmsParams {
        SendSmsParams {
            to: to.into(),
            body: body.into(),
            from: from.map(String::from),
        }
    }

    #[tokio::test]
    async fn test_send_sms_without_sender_skips_transport() {
        let mock = MockTransport::new();
        let twilio = Twilio::new(TwilioConfig::new("AC123", "secret"), mock.clone());

        let err = twilio
            .send_sms(sms("+15552223333", "hi", None))
            .await
            .unwrap_err();
        assert_eq!(err, "Error: No sender phone number provided");
        assert_eq!(mock.request_count(), 0);

        let err = twilio
            .send_sms(sms("+15552223333", "hi", Some("")))
            .await
            .unwrap_err();
        assert_eq!(err, "Error: No sender phone number provided");
        assert_eq!(mock.request_count(), 0);
    }

    #[tokio::test]
    async fn test_send_sms_form_and_auth() {
        let mock = MockTransport::new();
        mock.push_json(
            201,
            json!({
                "sid": "SM1", "status": "queued", "to": "+15552223333",
                "from": "+15550001111", "body": "hi", "num_segments": "1", "price": null
            }),
        );

        let message = Twilio::new(config(), mock.clone())
            .send_sms(sms("+15552223333", "hi", None))
            .await
            .unwrap();

        let request = mock.last_request();
        assert_eq!(
            request.url,
            "https://api.twilio.com/2010-04-01/Accounts/AC123/Messages.json"
        );
        assert_eq!(request.form_value("From"), Some("+15550001111"));
        assert_eq!(request.form_value("To"), Some("+15552223333"));
        assert_eq!(request.form_value("Body"), Some("hi"));
        let auth = request.basic_auth.unwrap();
        assert_eq!(auth.username, "AC123");
        assert_eq!(auth.password.as_deref(), Some("secret"));

        assert_eq!(message.sid, "SM1");
        assert_eq!(message.num_segments, "1");
        assert_eq!(message.price, "");
    }

    #[tokio::test]
    async fn test_send_sms_explicit_sender_wins() {
        let mock = MockTransport::new();
        mock.push_json(201, json!({"sid": "SM2"}));

        let message = Twilio::new(config(), mock.clone())
            .send_sms(sms("+15552223333", "hi", Some("+15559990000")))
            .await
            .unwrap();
        assert_eq!(mock.last_request().form_value("From"), Some("+15559990000"));
        assert_eq!(message.status, "unknown");
    }

    #[tokio::test]
    async fn test_upstream_error_code() {
        let mock = MockTransport::new();
        mock.push_json(
            400,
            json!({"code": 21211, "message": "The 'To' number is not valid.", "status": 400}),
        );

        let err = Twilio::new(config(), mock.clone())
            .send_sms(sms("bogus", "hi", None))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            "Error sending SMS: The 'To' number is not valid. (code 21211)"
        );
    }

    #[tokio::test]
    async fn test_make_call_requires_one_instruction_source() {
        let mock = MockTransport::new();
        let twilio = Twilio::new(config(), mock.clone());

        let neither = MakeCallParams {
            to: "+15552223333".into(),
            twiml: None,
            url: None,
            from: None,
        };
        assert!(twilio.make_call(neither).await.unwrap_err().starts_with("Error: "));

        let both = MakeCallParams {
            to: "+15552223333".into(),
            twiml: Some("<Response/>".into()),
            url: Some("https://example.com/twiml".into()),
            from: None,
        };
        assert!(twilio.make_call(both).await.is_err());
        assert_eq!(mock.request_count(), 0);
    }

    #[tokio::test]
    async fn test_make_call_with_twiml() {
        let mock = MockTransport::new();
        mock.push_json(201, json!({"sid": "CA1", "status": "queued", "direction": "outbound-api"}));

        let call = Twilio::new(config(), mock.clone())
            .make_call(MakeCallParams {
                to: "+15552223333".into(),
                twiml: Some("<Response><Say>Hi</Say></Response>".into()),
                url: None,
                from: None,
            })
            .await
            .unwrap();

        let request = mock.last_request();
        assert!(request.url.ends_with("/Accounts/AC123/Calls.json"));
        assert_eq!(
            request.form_value("Twiml"),
            Some("<Response><Say>Hi</Say></Response>")
        );
        assert!(request.form_value("Url").is_none());
        assert_eq!(call.direction, "outbound-api");
    }

    #[tokio::test]
    async fn test_verification_requires_service() {
        let mock = MockTransport::new();
        let err = Twilio::new(config(), mock.clone())
            .send_verification(SendVerificationParams {
                to: "+15552223333".into(),
                channel: "sms".into(),
            })
            .await
            .unwrap_err();
        assert_eq!(err, "Error: No verification service configured");
        assert_eq!(mock.request_count(), 0);
    }

    #[tokio::test]
    async fn test_check_verification() {
        let mock = MockTransport::new();
        mock.push_json(200, json!({"sid": "VE1", "status": "approved", "valid": true}));

        let mut config = config();
        config.verify_service_sid = Some("VA9".into());
        let verification = Twilio::new(config, mock.clone())
            .check_verification(CheckVerificationParams {
                to: "+15552223333".into(),
                code: "123456".into(),
            })
            .await
            .unwrap();

        let request = mock.last_request();
        assert_eq!(
            request.url,
            "https://verify.twilio.com/v2/Services/VA9/VerificationCheck"
        );
        assert_eq!(request.form_value("Code"), Some("123456"));
        assert!(verification.valid);
        assert_eq!(verification.status, "approved");
    }

    #[tokio::test]
    async fn test_list_messages_page_size() {
        let mock = MockTransport::new();
        mock.push_json(200, json!({"messages": [{"sid": "SM1"}, {"sid": "SM2"}]}));

        let list = Twilio::new(config(), mock.clone())
            .list_messages(ListMessagesParams {
                to: None,
                from: None,
                limit: 5000,
            })
            .await
            .unwrap();

        let request = mock.last_request();
        assert_eq!(request.method, HttpMethod::Get);
        assert_eq!(request.query_value("PageSize"), Some("1000"));
        assert!(request.query_value("To").is_none());
        assert_eq!(list.count, 2);
    }
}
