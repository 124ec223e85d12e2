//! ATK Tools - Tool adapters over third-party APIs and CLIs
//!
//! Each adapter wraps one external system and exposes its operations as
//! agent tools. Every operation has one of two failure contracts, fixed when
//! it is declared:
//!
//! - **message**: the tool result carries the success value, or an error
//!   string of the form `Error <action>: <reason>`
//! - **structured**: the tool result data is `{success, ...fields, error}`;
//!   on failure every field is present at its default
//!
//! Operation failures (transport errors, upstream API errors, unmet
//! preconditions) are never returned as `Err`. `Err` means the tool itself
//! was misused: unknown tool, missing or ill-typed required argument.
//!
//! # Feature Flags
//!
//! - `search` - Elasticsearch
//! - `kubernetes` - Kubernetes API server
//! - `git` - GitLab
//! - `messaging` - Twilio and Slack
//! - `commerce` - WooCommerce
//! - `automation` - Ansible CLI
//! - `docker` - Docker Engine API over its unix socket
//! - `file` - Local file management
//! - `speech` - ElevenLabs
//! - `browser` - MultiOn
//! - `all` - Enable all adapters (default)
//!
//! # Example
//!
//! ```rust,ignore
//! use atk_tools::{Toolbox, ToolRegistry};
//!
//! let toolbox = Toolbox::from_file("toolbox.yaml")?;
//! let executor = ToolRegistry::from_toolbox(&toolbox)?.into_executor();
//!
//! let result = executor
//!     .execute_tool("slack_post_message", ToolInput::new(json!({"text": "deployed"})))
//!     .await?;
//! ```

pub mod adapter;
pub mod config;
pub mod registry;
pub mod tools;
pub mod transport;

#[cfg(test)]
mod testing;

pub use adapter::{Adapter, AdapterTool};
pub use config::{HttpSettings, Toolbox, ToolboxMetadata, ToolboxSpec};
pub use registry::{BuiltinToolExecutor, CompositeToolExecutor, ToolCategory, ToolRegistry};
pub use transport::{ReqwestTransport, ShellCommandRunner};

#[cfg(all(feature = "docker", unix))]
pub use transport::UnixSocketTransport;

#[cfg(feature = "search")]
pub use tools::elasticsearch::{Elasticsearch, ElasticsearchConfig};

#[cfg(feature = "kubernetes")]
pub use tools::kubernetes::{Kubernetes, KubernetesConfig};

#[cfg(feature = "git")]
pub use tools::gitlab::{GitLab, GitLabConfig};

#[cfg(feature = "messaging")]
pub use tools::slack::{Slack, SlackConfig};

#[cfg(feature = "messaging")]
pub use tools::twilio::{Twilio, TwilioConfig};

#[cfg(feature = "commerce")]
pub use tools::woocommerce::{WooCommerce, WooCommerceConfig};

#[cfg(feature = "automation")]
pub use tools::ansible::{Ansible, AnsibleConfig};

#[cfg(feature = "docker")]
pub use tools::docker::{Docker, DockerConfig};

#[cfg(feature = "file")]
pub use tools::file::{FileManager, FileManagerConfig};

#[cfg(feature = "speech")]
pub use tools::elevenlabs::{ElevenLabs, ElevenLabsConfig};

#[cfg(feature = "browser")]
pub use tools::multion::{MultiOn, MultiOnConfig};

/// Prelude module for convenient imports
pub mod prelude {
    pub use super::adapter::Adapter;
    pub use super::config::Toolbox;
    pub use super::registry::{BuiltinToolExecutor, ToolCategory, ToolRegistry};
    pub use atk_core::{
        Envelope, FailureContract, Outcome, Tool, ToolConfig, ToolDefinition, ToolExecutor,
        ToolInput, ToolResult,
    };
}
