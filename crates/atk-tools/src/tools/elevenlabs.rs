//! ElevenLabs Tools
//!
//! Text-to-speech synthesis and account lookups via the ElevenLabs API.
//!
//! ## Available Tools
//!
//! - `elevenlabs_text_to_speech` - Synthesize one text
//! - `elevenlabs_batch_text_to_speech` - Synthesize several texts in order
//! - `elevenlabs_list_voices` - Voices available to the account
//! - `elevenlabs_subscription` - Plan and character usage
//!
//! Audio is written to `outputDir` when configured (the file path is
//! returned), otherwise it is returned inline as base64.

use atk_core::{
    AtkResult, FailureContract, HttpMethod, HttpRequest, HttpTransport, Outcome, ToolConfig,
    ToolInput, ToolResult, ToolType,
};
use async_trait::async_trait;
use base64::Engine;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::io::ErrorKind;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use super::common::{
    clamp, create_schema, decode, describe, failure, fetch_json, join_url, null_default,
    status_reason, tool_config,
};
use crate::adapter::{unknown_operation, Adapter};
use crate::registry::ToolCategory;

pub const DEFAULT_ELEVENLABS_API: &str = "https://api.elevenlabs.io/v1";
pub const DEFAULT_VOICE_ID: &str = "21m00Tcm4TlvDq8ikWAM";
pub const DEFAULT_MODEL_ID: &str = "eleven_multilingual_v2";

const NO_TEXT: &str = "Error: No text provided";
const NO_TEXTS: &str = "Error: No texts provided";

/// Numbered suffixes tried when a timestamped file name is taken
const MAX_NAME_ATTEMPTS: usize = 1000;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElevenLabsConfig {
    pub api_key: String,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_voice_id")]
    pub default_voice_id: String,

    #[serde(default = "default_model_id")]
    pub model_id: String,

    /// Directory audio files are written to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,
}

fn default_base_url() -> String {
    DEFAULT_ELEVENLABS_API.to_string()
}

fn default_voice_id() -> String {
    DEFAULT_VOICE_ID.to_string()
}

fn default_model_id() -> String {
    DEFAULT_MODEL_ID.to_string()
}

impl ElevenLabsConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: default_base_url(),
            default_voice_id: default_voice_id(),
            model_id: default_model_id(),
            output_dir: None,
        }
    }
}

pub struct ElevenLabs {
    config: ElevenLabsConfig,
    transport: Arc<dyn HttpTransport>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TextToSpeechParams {
    pub text: String,
    #[serde(default)]
    pub voice_id: Option<String>,
    #[serde(default = "default_stability")]
    pub stability: f64,
    #[serde(default = "default_similarity_boost")]
    pub similarity_boost: f64,
    #[serde(default = "default_output_format")]
    pub output_format: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BatchTextToSpeechParams {
    pub texts: Vec<String>,
    #[serde(default)]
    pub voice_id: Option<String>,
    #[serde(default = "default_stability")]
    pub stability: f64,
    #[serde(default = "default_similarity_boost")]
    pub similarity_boost: f64,
    #[serde(default = "default_output_format")]
    pub output_format: String,
}

fn default_stability() -> f64 {
    0.5
}

fn default_similarity_boost() -> f64 {
    0.75
}

fn default_output_format() -> String {
    "mp3_44100_128".to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Speech {
    pub voice_id: String,
    pub output_format: String,
    pub characters: usize,
    pub size_bytes: usize,
    /// Set when the audio was written to disk
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    /// Set when no output directory is configured
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_base64: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchSpeech {
    pub results: Vec<Speech>,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Voice {
    pub voice_id: String,
    pub name: String,
    #[serde(deserialize_with = "null_default")]
    pub category: String,
    #[serde(deserialize_with = "null_default")]
    pub labels: BTreeMap<String, String>,
    #[serde(deserialize_with = "null_default")]
    pub preview_url: String,
}

impl Default for Voice {
    fn default() -> Self {
        Self {
            voice_id: String::new(),
            name: String::new(),
            category: "unknown".to_string(),
            labels: BTreeMap::new(),
            preview_url: String::new(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct VoicesResponse {
    #[serde(deserialize_with = "null_default")]
    voices: Vec<Voice>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct VoiceList {
    pub voices: Vec<Voice>,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Subscription {
    pub tier: String,
    pub status: String,
    pub character_count: u64,
    pub character_limit: u64,
    pub next_character_count_reset_unix: i64,
}

impl Default for Subscription {
    fn default() -> Self {
        Self {
            tier: "unknown".to_string(),
            status: "unknown".to_string(),
            character_count: 0,
            character_limit: 0,
            next_character_count_reset_unix: 0,
        }
    }
}

impl Subscription {
    pub fn characters_remaining(&self) -> u64 {
        self.character_limit.saturating_sub(self.character_count)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SubscriptionSummary {
    #[serde(flatten)]
    pub subscription: Subscription,
    pub characters_remaining: u64,
}

/// `{"detail": "..."}` or `{"detail": {"status": "...", "message": "..."}}`
fn upstream_error(body: &Value) -> Option<String> {
    body.get("detail").and_then(describe)
}

/// File extension for an output format such as `mp3_44100_128` or `pcm_16000`
fn extension(output_format: &str) -> &str {
    match output_format.split('_').next() {
        Some(codec) if !codec.is_empty() => codec,
        _ => "mp3",
    }
}

impl ElevenLabs {
    pub fn new(config: ElevenLabsConfig, transport: Arc<dyn HttpTransport>) -> Self {
        Self { config, transport }
    }

    fn request(&self, method: HttpMethod, path: &str) -> HttpRequest {
        HttpRequest::new(method, join_url(&self.config.base_url, path))
            .header("xi-api-key", &self.config.api_key)
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

    async fn store(&self, audio: &[u8], output_format: &str) -> Result<String, String> {
        let Some(dir) = &self.config.output_dir else {
            return Err("no output directory configured".to_string());
        };

        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| format!("Failed to create output dir: {}", e))?;

        let stem = format!("speech_{}", chrono::Utc::now().format("%Y%m%d_%H%M%S_%3f"));
        let ext = extension(output_format);

        // create_new fails when the name is already taken
        for attempt in 0..MAX_NAME_ATTEMPTS {
            let name = if attempt == 0 {
                format!("{}.{}", stem, ext)
            } else {
                format!("{}_{}.{}", stem, attempt, ext)
            };
            let path = dir.join(name);

            let mut file = match tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(file) => file,
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(format!("Failed to write audio file: {}", e)),
            };

            file.write_all(audio)
                .await
                .map_err(|e| format!("Failed to write audio file: {}", e))?;
            file.flush()
                .await
                .map_err(|e| format!("Failed to write audio file: {}", e))?;

            return Ok(path.display().to_string());
        }

        Err(format!(
            "Failed to write audio file: no free name for {} in {}",
            stem,
            dir.display()
        ))
    }

    pub async fn text_to_speech(&self, params: TextToSpeechParams) -> Outcome<Speech> {
        const ACTION: &str = "generating speech";

        if params.text.trim().is_empty() {
            return Err(NO_TEXT.to_string());
        }

        let voice_id = params
            .voice_id
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| self.config.default_voice_id.clone());

        let body = json!({
            "text": params.text,
            "model_id": self.config.model_id,
            "voice_settings": {
                "stability": clamp(params.stability, 0.0, 1.0),
                "similarity_boost": clamp(params.similarity_boost, 0.0, 1.0)
            }
        });

        debug!(voice_id = %voice_id, characters = params.text.len(), "Generating speech");

        let request = self
            .request(HttpMethod::Post, &format!("text-to-speech/{}", voice_id))
            .query("output_format", &params.output_format)
            .header("Accept", "audio/mpeg")
            .json(body);

        let response = self
            .transport
            .request(request)
            .await
            .map_err(|e| failure(ACTION, &e.to_string()))?;

        let is_json = response
            .header("content-type")
            .map(|ct| ct.starts_with("application/json"))
            .unwrap_or(false);

        if !response.is_success() || is_json {
            let body = response.to_json().unwrap_or(Value::Null);
            let reason = upstream_error(&body).unwrap_or_else(|| status_reason(&response));
            return Err(failure(ACTION, &reason));
        }

        let audio = response.bytes();
        let mut speech = Speech {
            voice_id,
            output_format: params.output_format.clone(),
            characters: params.text.chars().count(),
            size_bytes: audio.len(),
            file_path: None,
            audio_base64: None,
        };

        if self.config.output_dir.is_some() {
            let path = self
                .store(audio, &params.output_format)
                .await
                .map_err(|e| failure(ACTION, &e))?;
            speech.file_path = Some(path);
        } else {
            speech.audio_base64 = Some(base64::engine::general_purpose::STANDARD.encode(audio));
        }

        Ok(speech)
    }

    /// Items are synthesized one at a time; the first failure ends the batch
    pub async fn batch_text_to_speech(&self, params: BatchTextToSpeechParams) -> Outcome<BatchSpeech> {
        if params.texts.is_empty() {
            return Err(NO_TEXTS.to_string());
        }

        let mut results = Vec::with_capacity(params.texts.len());
        for (index, text) in params.texts.into_iter().enumerate() {
            let item = TextToSpeechParams {
                text,
                voice_id: params.voice_id.clone(),
                stability: params.stability,
                similarity_boost: params.similarity_boost,
                output_format: params.output_format.clone(),
            };
            let speech = self
                .text_to_speech(item)
                .await
                .map_err(|e| format!("{} (item {} of batch)", e, index + 1))?;
            results.push(speech);
        }

        Ok(BatchSpeech {
            count: results.len(),
            results,
        })
    }

    pub async fn list_voices(&self) -> Outcome<VoiceList> {
        let mut response: VoicesResponse = self
            .call("listing voices", self.request(HttpMethod::Get, "voices"))
            .await?;

        for voice in response.voices.iter_mut().filter(|v| v.category.is_empty()) {
            voice.category = "unknown".to_string();
        }

        Ok(VoiceList {
            count: response.voices.len(),
            voices: response.voices,
        })
    }

    pub async fn subscription(&self) -> Outcome<SubscriptionSummary> {
        let subscription: Subscription = self
            .call(
                "getting subscription",
                self.request(HttpMethod::Get, "user/subscription"),
            )
            .await?;

        Ok(SubscriptionSummary {
            characters_remaining: subscription.characters_remaining(),
            subscription,
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
impl Adapter for ElevenLabs {
    fn category(&self) -> ToolCategory {
        ToolCategory::Speech
    }

    fn operations(&self) -> Vec<ToolConfig> {
        let voice_settings = json!({
            "voice_id": { "type": "string", "description": "Voice ID (defaults to the configured voice)" },
            "stability": {
                "type": "number",
                "description": "Voice stability (0-1)",
                "default": 0.5,
                "minimum": 0,
                "maximum": 1
            },
            "similarity_boost": {
                "type": "number",
                "description": "Similarity boost (0-1)",
                "default": 0.75,
                "minimum": 0,
                "maximum": 1
            },
            "output_format": {
                "type": "string",
                "description": "Codec, sample rate and bitrate (e.g., 'mp3_44100_128', 'pcm_16000')",
                "default": "mp3_44100_128"
            }
        });

        let mut single = voice_settings.clone();
        single["text"] = json!({ "type": "string", "description": "Text to synthesize" });

        let mut batch = voice_settings;
        batch["texts"] = json!({
            "type": "array",
            "items": { "type": "string" },
            "description": "Texts to synthesize, in order"
        });

        vec![
            http_tool(
                "elevenlabs_text_to_speech",
                "Convert text to speech audio.",
                create_schema(single, vec!["text"]),
            ),
            http_tool(
                "elevenlabs_batch_text_to_speech",
                "Convert several texts to speech, one audio clip each.",
                create_schema(batch, vec!["texts"]),
            ),
            http_tool(
                "elevenlabs_list_voices",
                "List the voices available to the account.",
                create_schema(json!({}), vec![]),
            ),
            http_tool(
                "elevenlabs_subscription",
                "Get the subscription tier and character usage.",
                create_schema(json!({}), vec![]),
            ),
        ]
    }

    async fn dispatch(&self, operation: &str, input: ToolInput) -> AtkResult<ToolResult> {
        Ok(match operation {
            "elevenlabs_text_to_speech" => {
                ToolResult::from_outcome(self.text_to_speech(input.parse()?).await)
            }
            "elevenlabs_batch_text_to_speech" => {
                ToolResult::from_outcome(self.batch_text_to_speech(input.parse()?).await)
            }
            "elevenlabs_list_voices" => ToolResult::from_outcome(self.list_voices().await),
            "elevenlabs_subscription" => ToolResult::from_outcome(self.subscription().await),
            other => return Err(unknown_operation(other)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockTransport;
    use atk_core::HttpResponse;
    use tempfile::TempDir;

    fn adapter(mock: &Arc<MockTransport>, output_dir: Option<PathBuf>) -> ElevenLabs {
        let mut config = ElevenLabsConfig::new("xi-test");
        config.output_dir = output_dir;
        ElevenLabs::new(config, mock.clone())
    }

    fn tts(text: &str) -> TextToSpeechParams {
        serde_json::from_value(json!({ "text": text })).unwrap()
    }

    #[tokio::test]
    async fn test_text_to_speech_request() {
        let mock = MockTransport::new();
        mock.push_raw(200, vec![0xff, 0xfb, 0x90, 0x00]);

        let mut params = tts("Hello there");
        params.stability = 1.7;
        let speech = adapter(&mock, None).text_to_speech(params).await.unwrap();

        let request = mock.last_request();
        assert_eq!(request.method, HttpMethod::Post);
        assert_eq!(
            request.url,
            format!("{}/text-to-speech/{}", DEFAULT_ELEVENLABS_API, DEFAULT_VOICE_ID)
        );
        assert_eq!(request.header_value("xi-api-key"), Some("xi-test"));
        assert_eq!(request.query_value("output_format"), Some("mp3_44100_128"));

        let body = request.json_body().unwrap();
        assert_eq!(body["model_id"], DEFAULT_MODEL_ID);
        assert_eq!(body["voice_settings"]["stability"], 1.0);
        assert_eq!(body["voice_settings"]["similarity_boost"], 0.75);

        assert_eq!(speech.size_bytes, 4);
        assert_eq!(speech.audio_base64.as_deref(), Some("//uQAA=="));
        assert!(speech.file_path.is_none());
    }

    #[tokio::test]
    async fn test_text_to_speech_saves_file() {
        let dir = TempDir::new().unwrap();
        let mock = MockTransport::new();
        mock.push_raw(200, "ID3audio");

        let mut params = tts("Saved");
        params.output_format = "pcm_16000".into();
        let speech = adapter(&mock, Some(dir.path().to_path_buf()))
            .text_to_speech(params)
            .await
            .unwrap();

        let path = speech.file_path.unwrap();
        assert!(path.ends_with(".pcm"));
        assert_eq!(std::fs::read(&path).unwrap(), b"ID3audio");
        assert!(speech.audio_base64.is_none());
    }

    #[tokio::test]
    async fn test_empty_text_skips_transport() {
        let mock = MockTransport::new();
        let result = adapter(&mock, None).text_to_speech(tts("  ")).await;
        assert_eq!(result, Err(NO_TEXT.to_string()));
        assert_eq!(mock.request_count(), 0);
    }

    #[tokio::test]
    async fn test_detail_object_error() {
        let mock = MockTransport::new();
        mock.push_json(
            401,
            json!({"detail": {"status": "invalid_api_key", "message": "Invalid API key"}}),
        );

        let result = adapter(&mock, None).text_to_speech(tts("hi")).await;
        assert_eq!(result, Err("Error generating speech: Invalid API key".to_string()));
    }

    #[tokio::test]
    async fn test_json_body_with_200_is_failure() {
        let mock = MockTransport::new();
        mock.push(Ok(HttpResponse::new(
            200,
            r#"{"detail": "quota exceeded"}"#,
        )
        .with_header("content-type", "application/json")));

        let result = adapter(&mock, None).text_to_speech(tts("hi")).await;
        assert_eq!(result, Err("Error generating speech: quota exceeded".to_string()));
    }

    #[tokio::test]
    async fn test_batch_stops_at_first_failure() {
        let mock = MockTransport::new();
        mock.push_raw(200, "a")
            .push_json(422, json!({"detail": "text too long"}));

        let result = adapter(&mock, None)
            .batch_text_to_speech(BatchTextToSpeechParams {
                texts: vec!["one".into(), "two".into(), "three".into()],
                voice_id: Some("voice-x".into()),
                stability: 0.5,
                similarity_boost: 0.75,
                output_format: default_output_format(),
            })
            .await;

        assert_eq!(mock.request_count(), 2);
        assert!(mock.requests()[1].url.ends_with("/text-to-speech/voice-x"));
        assert_eq!(
            result,
            Err("Error generating speech: text too long (item 2 of batch)".to_string())
        );
    }

    #[tokio::test]
    async fn test_batch_saves_each_item_to_its_own_file() {
        let dir = TempDir::new().unwrap();
        let mock = MockTransport::new();
        mock.push_raw(200, "first")
            .push_raw(200, "second")
            .push_raw(200, "third");

        let batch = adapter(&mock, Some(dir.path().to_path_buf()))
            .batch_text_to_speech(
                serde_json::from_value(json!({"texts": ["one", "two", "three"]})).unwrap(),
            )
            .await
            .unwrap();

        let paths: Vec<String> = batch
            .results
            .iter()
            .map(|speech| speech.file_path.clone().unwrap())
            .collect();
        let unique: std::collections::HashSet<&String> = paths.iter().collect();
        assert_eq!(unique.len(), 3);

        for (path, expected) in paths.iter().zip(["first", "second", "third"]) {
            assert_eq!(std::fs::read_to_string(path).unwrap(), expected);
        }
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 3);
    }

    #[tokio::test]
    async fn test_batch_requires_texts() {
        let mock = MockTransport::new();
        let result = adapter(&mock, None)
            .batch_text_to_speech(serde_json::from_value(json!({"texts": []})).unwrap())
            .await;
        assert_eq!(result, Err(NO_TEXTS.to_string()));
    }

    #[tokio::test]
    async fn test_list_voices_defaults() {
        let mock = MockTransport::new();
        mock.push_json(
            200,
            json!({"voices": [
                {"voice_id": "v1", "name": "Rachel", "category": "premade", "labels": {"accent": "american"}},
                {"voice_id": "v2", "name": "Custom", "category": null, "labels": null}
            ]}),
        );

        let list = adapter(&mock, None).list_voices().await.unwrap();
        assert_eq!(list.count, 2);
        assert_eq!(list.voices[0].labels["accent"], "american");
        assert_eq!(list.voices[1].category, "unknown");
    }

    #[tokio::test]
    async fn test_subscription() {
        let mock = MockTransport::new();
        mock.push_json(
            200,
            json!({"tier": "creator", "status": "active", "character_count": 1200, "character_limit": 100000}),
        );

        let summary = adapter(&mock, None).subscription().await.unwrap();
        assert_eq!(mock.last_request().url, format!("{}/user/subscription", DEFAULT_ELEVENLABS_API));
        assert_eq!(summary.subscription.tier, "creator");
        assert_eq!(summary.characters_remaining, 98_800);

        let value = serde_json::to_value(&summary).unwrap();
        assert_eq!(value["character_limit"], 100000);
    }
}
