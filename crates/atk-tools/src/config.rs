//! Toolbox configuration
//!
//! A toolbox is a YAML resource naming which adapters to build and how to
//! reach their backends:
//!
//! ```yaml
//! apiVersion: atk.dev/v1
//! kind: Toolbox
//! metadata:
//!   name: ops
//! spec:
//!   http:
//!     timeoutSecs: 30
//!   elasticsearch:
//!     baseUrl: http://elasticsearch:9200
//!     apiKey: ${ES_API_KEY}
//!   slack:
//!     botToken: ${SLACK_BOT_TOKEN}
//!     defaultChannel: "#ops"
//! ```
//!
//! `${VAR}` references in string values are expanded from the environment
//! before the document is deserialized. Sections that are absent produce no
//! tools.

use atk_core::env::expand_env_vars;
use atk_core::{AtkError, AtkResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

use crate::transport::DEFAULT_USER_AGENT;

#[cfg(feature = "automation")]
use crate::tools::ansible::AnsibleConfig;
#[cfg(feature = "docker")]
use crate::tools::docker::DockerConfig;
#[cfg(feature = "search")]
use crate::tools::elasticsearch::ElasticsearchConfig;
#[cfg(feature = "speech")]
use crate::tools::elevenlabs::ElevenLabsConfig;
#[cfg(feature = "file")]
use crate::tools::file::FileManagerConfig;
#[cfg(feature = "git")]
use crate::tools::gitlab::GitLabConfig;
#[cfg(feature = "kubernetes")]
use crate::tools::kubernetes::KubernetesConfig;
#[cfg(feature = "browser")]
use crate::tools::multion::MultiOnConfig;
#[cfg(feature = "messaging")]
use crate::tools::slack::SlackConfig;
#[cfg(feature = "messaging")]
use crate::tools::twilio::TwilioConfig;
#[cfg(feature = "commerce")]
use crate::tools::woocommerce::WooCommerceConfig;

pub const API_VERSION: &str = "atk.dev/v1";
pub const KIND: &str = "Toolbox";

/// Toolbox resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Toolbox {
    /// API version (e.g., "atk.dev/v1")
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Resource kind (always "Toolbox")
    pub kind: String,

    pub metadata: ToolboxMetadata,

    #[serde(default)]
    pub spec: ToolboxSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolboxMetadata {
    pub name: String,

    #[serde(default)]
    pub labels: HashMap<String, String>,
}

/// Shared settings for HTTP-backed adapters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpSettings {
    #[serde(default = "default_http_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_http_timeout() -> u64 {
    atk_core::DEFAULT_TOOL_TIMEOUT_SECS
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_secs: default_http_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

/// Per-adapter sections; each one that is present enables that adapter
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolboxSpec {
    pub http: HttpSettings,

    #[cfg(feature = "search")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elasticsearch: Option<ElasticsearchConfig>,

    #[cfg(feature = "kubernetes")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kubernetes: Option<KubernetesConfig>,

    #[cfg(feature = "git")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gitlab: Option<GitLabConfig>,

    #[cfg(feature = "messaging")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub twilio: Option<TwilioConfig>,

    #[cfg(feature = "messaging")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slack: Option<SlackConfig>,

    #[cfg(feature = "commerce")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub woocommerce: Option<WooCommerceConfig>,

    #[cfg(feature = "automation")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ansible: Option<AnsibleConfig>,

    #[cfg(feature = "docker")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub docker: Option<DockerConfig>,

    #[cfg(feature = "file")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub files: Option<FileManagerConfig>,

    #[cfg(feature = "speech")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elevenlabs: Option<ElevenLabsConfig>,

    #[cfg(feature = "browser")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub multion: Option<MultiOnConfig>,
}

/// Recursively expand `${VAR}` in every string of a YAML document
fn expand_value(value: &mut serde_yaml::Value) {
    match value {
        serde_yaml::Value::String(s) => {
            if s.contains("${") {
                *s = expand_env_vars(s);
            }
        }
        serde_yaml::Value::Sequence(items) => items.iter_mut().for_each(expand_value),
        serde_yaml::Value::Mapping(map) => {
            for (_, v) in map.iter_mut() {
                expand_value(v);
            }
        }
        serde_yaml::Value::Tagged(tagged) => expand_value(&mut tagged.value),
        _ => {}
    }
}

fn require(section: &str, field: &str, value: &str) -> AtkResult<()> {
    if value.trim().is_empty() {
        return Err(AtkError::config(format!(
            "spec.{}.{} is required",
            section, field
        )));
    }
    if value.contains("${") {
        return Err(AtkError::config(format!(
            "spec.{}.{} references an unset environment variable: {}",
            section, field, value
        )));
    }
    Ok(())
}

impl Toolbox {
    /// Parse a toolbox from YAML, expanding environment references first
    pub fn from_yaml(yaml: &str) -> AtkResult<Self> {
        let mut document: serde_yaml::Value = serde_yaml::from_str(yaml)
            .map_err(|e| AtkError::config(format!("Failed to parse toolbox YAML: {}", e)))?;
        expand_value(&mut document);

        serde_path_to_error::deserialize(document).map_err(|e| {
            AtkError::config(format!("Invalid toolbox at '{}': {}", e.path(), e.inner()))
        })
    }

    /// Load and validate a toolbox file
    pub fn from_file(path: impl AsRef<Path>) -> AtkResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            AtkError::config(format!("Failed to read toolbox file {}: {}", path.display(), e))
        })?;

        let toolbox = Self::from_yaml(&content)?;
        toolbox.validate()?;

        debug!(
            path = %path.display(),
            name = %toolbox.metadata.name,
            sections = ?toolbox.configured_sections(),
            "Loaded toolbox"
        );
        Ok(toolbox)
    }

    /// Check the resource header and the fields each configured adapter needs
    pub fn validate(&self) -> AtkResult<()> {
        if self.kind != KIND {
            return Err(AtkError::config(format!(
                "Expected kind '{}', found '{}'",
                KIND, self.kind
            )));
        }
        if !self.api_version.starts_with("atk.dev/") {
            return Err(AtkError::config(format!(
                "Unsupported apiVersion '{}' (expected {})",
                self.api_version, API_VERSION
            )));
        }
        if self.metadata.name.trim().is_empty() {
            return Err(AtkError::config("metadata.name is required"));
        }
        if self.spec.http.timeout_secs == 0 {
            return Err(AtkError::config("spec.http.timeoutSecs must be greater than 0"));
        }

        let spec = &self.spec;

        #[cfg(feature = "search")]
        if let Some(c) = &spec.elasticsearch {
            require("elasticsearch", "baseUrl", &c.base_url)?;
        }

        #[cfg(feature = "kubernetes")]
        if let Some(c) = &spec.kubernetes {
            require("kubernetes", "apiServer", &c.api_server)?;
        }

        #[cfg(feature = "git")]
        if let Some(c) = &spec.gitlab {
            require("gitlab", "baseUrl", &c.base_url)?;
        }

        #[cfg(feature = "messaging")]
        if let Some(c) = &spec.twilio {
            require("twilio", "accountSid", &c.account_sid)?;
            require("twilio", "authToken", &c.auth_token)?;
        }

        #[cfg(feature = "messaging")]
        if let Some(c) = &spec.slack {
            require("slack", "botToken", &c.bot_token)?;
        }

        #[cfg(feature = "commerce")]
        if let Some(c) = &spec.woocommerce {
            require("woocommerce", "storeUrl", &c.store_url)?;
            require("woocommerce", "consumerKey", &c.consumer_key)?;
            require("woocommerce", "consumerSecret", &c.consumer_secret)?;
        }

        #[cfg(feature = "automation")]
        if let Some(c) = &spec.ansible {
            if c.timeout_secs == 0 {
                return Err(AtkError::config(
                    "spec.ansible.timeoutSecs must be greater than 0",
                ));
            }
        }

        #[cfg(feature = "docker")]
        if let Some(c) = &spec.docker {
            require("docker", "socketPath", &c.socket_path)?;
        }

        #[cfg(feature = "file")]
        if let Some(c) = &spec.files {
            if let Some(dir) = &c.base_dir {
                if !dir.is_dir() {
                    return Err(AtkError::config(format!(
                        "spec.files.baseDir {} is not a directory",
                        dir.display()
                    )));
                }
            }
        }

        #[cfg(feature = "speech")]
        if let Some(c) = &spec.elevenlabs {
            require("elevenlabs", "apiKey", &c.api_key)?;
        }

        #[cfg(feature = "browser")]
        if let Some(c) = &spec.multion {
            require("multion", "apiKey", &c.api_key)?;
        }

        let _ = spec;
        Ok(())
    }

    /// Names of the adapter sections present in `spec`
    pub fn configured_sections(&self) -> Vec<&'static str> {
        let mut sections = Vec::new();
        let spec = &self.spec;

        #[cfg(feature = "search")]
        if spec.elasticsearch.is_some() {
            sections.push("elasticsearch");
        }
        #[cfg(feature = "kubernetes")]
        if spec.kubernetes.is_some() {
            sections.push("kubernetes");
        }
        #[cfg(feature = "git")]
        if spec.gitlab.is_some() {
            sections.push("gitlab");
        }
        #[cfg(feature = "messaging")]
        if spec.twilio.is_some() {
            sections.push("twilio");
        }
        #[cfg(feature = "messaging")]
        if spec.slack.is_some() {
            sections.push("slack");
        }
        #[cfg(feature = "commerce")]
        if spec.woocommerce.is_some() {
            sections.push("woocommerce");
        }
        #[cfg(feature = "automation")]
        if spec.ansible.is_some() {
            sections.push("ansible");
        }
        #[cfg(feature = "docker")]
        if spec.docker.is_some() {
            sections.push("docker");
        }
        #[cfg(feature = "file")]
        if spec.files.is_some() {
            sections.push("files");
        }
        #[cfg(feature = "speech")]
        if spec.elevenlabs.is_some() {
            sections.push("elevenlabs");
        }
        #[cfg(feature = "browser")]
        if spec.multion.is_some() {
            sections.push("multion");
        }

        let _ = spec;
        sections
    }
}

#[cfg(all(test, feature = "all"))]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const TOOLBOX: &str = r##"
apiVersion: atk.dev/v1
kind: Toolbox
metadata:
  name: ops
  labels:
    team: platform
spec:
  http:
    timeoutSecs: 10
  elasticsearch:
    baseUrl: http://elasticsearch:9200
    apiKey: ${ATK_CONFIG_TEST_ES_KEY}
  slack:
    botToken: xoxb-123
    defaultChannel: "#ops"
  ansible:
    defaultInventory: inventory/prod
  files: {}
"##;

    #[test]
    fn test_parse_and_expand() {
        std::env::set_var("ATK_CONFIG_TEST_ES_KEY", "es-secret");
        let toolbox = Toolbox::from_yaml(TOOLBOX).unwrap();
        std::env::remove_var("ATK_CONFIG_TEST_ES_KEY");

        assert_eq!(toolbox.metadata.name, "ops");
        assert_eq!(toolbox.metadata.labels["team"], "platform");
        assert_eq!(toolbox.spec.http.timeout_secs, 10);
        assert_eq!(toolbox.spec.http.user_agent, DEFAULT_USER_AGENT);

        let es = toolbox.spec.elasticsearch.as_ref().unwrap();
        assert_eq!(es.api_key.as_deref(), Some("es-secret"));

        let slack = toolbox.spec.slack.as_ref().unwrap();
        assert_eq!(slack.default_channel.as_deref(), Some("#ops"));

        let ansible = toolbox.spec.ansible.as_ref().unwrap();
        assert_eq!(ansible.timeout_secs, 600);

        let files = toolbox.spec.files.as_ref().unwrap();
        assert_eq!(files.max_read_bytes, 1024 * 1024);

        assert_eq!(
            toolbox.configured_sections(),
            vec!["elasticsearch", "slack", "ansible", "files"]
        );
        assert!(toolbox.validate().is_ok());
    }

    #[test]
    fn test_error_reports_path() {
        let yaml = r#"
apiVersion: atk.dev/v1
kind: Toolbox
metadata:
  name: ops
spec:
  kubernetes:
    apiServer: https://k8s:6443
    namespace: [not, a, string]
"#;
        let err = Toolbox::from_yaml(yaml).unwrap_err().to_string();
        assert!(err.contains("spec.kubernetes.namespace"), "{}", err);
    }

    #[test]
    fn test_validate_rejects_unset_variable() {
        let yaml = r#"
apiVersion: atk.dev/v1
kind: Toolbox
metadata:
  name: ops
spec:
  slack:
    botToken: ${ATK_CONFIG_TEST_DEFINITELY_UNSET}
"#;
        let toolbox = Toolbox::from_yaml(yaml).unwrap();
        let err = toolbox.validate().unwrap_err().to_string();
        assert!(err.contains("spec.slack.botToken"));
        assert!(err.contains("unset environment variable"));
    }

    #[test]
    fn test_validate_header() {
        let mut toolbox = Toolbox::from_yaml(TOOLBOX).unwrap();
        toolbox.spec.elasticsearch = None;

        toolbox.kind = "Agent".into();
        assert!(toolbox.validate().unwrap_err().to_string().contains("Expected kind"));

        toolbox.kind = KIND.into();
        toolbox.metadata.name = " ".into();
        assert!(toolbox.validate().is_err());
    }

    #[test]
    fn test_validate_required_fields() {
        let yaml = r#"
apiVersion: atk.dev/v1
kind: Toolbox
metadata:
  name: shop
spec:
  woocommerce:
    storeUrl: https://shop.example.com
    consumerKey: ck_1
    consumerSecret: ""
"#;
        let err = Toolbox::from_yaml(yaml).unwrap().validate().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Configuration error: spec.woocommerce.consumerSecret is required"
        );
    }

    #[test]
    fn test_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            "apiVersion: atk.dev/v1\nkind: Toolbox\nmetadata:\n  name: local\nspec:\n  docker: {{}}\n"
        )
        .unwrap();

        let toolbox = Toolbox::from_file(file.path()).unwrap();
        assert_eq!(toolbox.configured_sections(), vec!["docker"]);
        assert_eq!(
            toolbox.spec.docker.unwrap().socket_path,
            "/var/run/docker.sock"
        );

        assert!(Toolbox::from_file("/nonexistent/toolbox.yaml").is_err());
    }
}
