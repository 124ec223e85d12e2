//! Tool Registry - Central registration and discovery for tools
//!
//! Adapters register all of their operations at once under a category;
//! single tools can be registered directly. A registry built from a
//! [`Toolbox`] contains exactly the adapters the toolbox configures.

use atk_core::{AtkError, AtkResult, Tool, ToolDefinition, ToolExecutor, ToolInput, ToolResult};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::adapter::Adapter;
use crate::config::Toolbox;

/// Tool category for organization
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ToolCategory {
    /// Search engines (Elasticsearch)
    Search,
    /// Kubernetes API server
    Kubernetes,
    /// Git hosting (GitLab)
    Git,
    /// SMS, voice and chat (Twilio, Slack)
    Messaging,
    /// Online stores (WooCommerce)
    Commerce,
    /// Configuration management (Ansible)
    Automation,
    /// Container engines (Docker)
    Containers,
    /// Local filesystem
    Files,
    /// Text-to-speech (ElevenLabs)
    Speech,
    /// Browser agents (MultiOn)
    Browser,
    /// Custom user-defined tools
    Custom(String),
}

impl std::fmt::Display for ToolCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ToolCategory::Search => write!(f, "search"),
            ToolCategory::Kubernetes => write!(f, "kubernetes"),
            ToolCategory::Git => write!(f, "git"),
            ToolCategory::Messaging => write!(f, "messaging"),
            ToolCategory::Commerce => write!(f, "commerce"),
            ToolCategory::Automation => write!(f, "automation"),
            ToolCategory::Containers => write!(f, "containers"),
            ToolCategory::Files => write!(f, "files"),
            ToolCategory::Speech => write!(f, "speech"),
            ToolCategory::Browser => write!(f, "browser"),
            ToolCategory::Custom(name) => write!(f, "custom:{}", name),
        }
    }
}

/// Tool registry for managing available tools
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    categories: HashMap<ToolCategory, Vec<String>>,
}

impl ToolRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Build every adapter the toolbox configures
    pub fn from_toolbox(toolbox: &Toolbox) -> AtkResult<Self> {
        let mut registry = Self::new();
        let spec = &toolbox.spec;

        let http: Arc<dyn atk_core::HttpTransport> = Arc::new(
            crate::transport::ReqwestTransport::new(
                spec.http.timeout_secs,
                &spec.http.user_agent,
            )?,
        );

        #[cfg(feature = "search")]
        if let Some(config) = &spec.elasticsearch {
            registry.register_adapter(crate::tools::elasticsearch::Elasticsearch::new(
                config.clone(),
                http.clone(),
            ));
        }

        #[cfg(feature = "kubernetes")]
        if let Some(config) = &spec.kubernetes {
            registry.register_adapter(crate::tools::kubernetes::Kubernetes::new(
                config.clone(),
                http.clone(),
            ));
        }

        #[cfg(feature = "git")]
        if let Some(config) = &spec.gitlab {
            registry.register_adapter(crate::tools::gitlab::GitLab::new(
                config.clone(),
                http.clone(),
            ));
        }

        #[cfg(feature = "messaging")]
        if let Some(config) = &spec.twilio {
            registry.register_adapter(crate::tools::twilio::Twilio::new(
                config.clone(),
                http.clone(),
            ));
        }

        #[cfg(feature = "messaging")]
        if let Some(config) = &spec.slack {
            registry.register_adapter(crate::tools::slack::Slack::new(
                config.clone(),
                http.clone(),
            ));
        }

        #[cfg(feature = "commerce")]
        if let Some(config) = &spec.woocommerce {
            registry.register_adapter(crate::tools::woocommerce::WooCommerce::new(
                config.clone(),
                http.clone(),
            ));
        }

        #[cfg(feature = "automation")]
        if let Some(config) = &spec.ansible {
            if !crate::tools::ansible::Ansible::is_available() {
                warn!("ansible-playbook not found in PATH; ansible tools will fail until it is installed");
            }
            let mut runner = crate::transport::ShellCommandRunner::new(config.timeout_secs);
            if let Some(dir) = &config.working_dir {
                runner = runner.with_working_dir(dir);
            }
            registry.register_adapter(crate::tools::ansible::Ansible::new(
                config.clone(),
                Arc::new(runner),
            ));
        }

        #[cfg(all(feature = "docker", unix))]
        if let Some(config) = &spec.docker {
            let socket = crate::transport::UnixSocketTransport::new(
                &config.socket_path,
                spec.http.timeout_secs,
            );
            registry.register_adapter(crate::tools::docker::Docker::new(
                config.clone(),
                Arc::new(socket),
            ));
        }

        #[cfg(all(feature = "docker", not(unix)))]
        if spec.docker.is_some() {
            warn!("Docker tools need a unix socket and are not available on this platform");
        }

        #[cfg(feature = "file")]
        if let Some(config) = &spec.files {
            registry.register_adapter(crate::tools::file::FileManager::new(config.clone()));
        }

        #[cfg(feature = "speech")]
        if let Some(config) = &spec.elevenlabs {
            registry.register_adapter(crate::tools::elevenlabs::ElevenLabs::new(
                config.clone(),
                http.clone(),
            ));
        }

        #[cfg(feature = "browser")]
        if let Some(config) = &spec.multion {
            registry.register_adapter(crate::tools::multion::MultiOn::new(
                config.clone(),
                http.clone(),
            ));
        }

        info!(
            toolbox = %toolbox.metadata.name,
            tools = registry.len(),
            "Built tool registry"
        );
        Ok(registry)
    }

    /// Register a single tool
    pub fn register<T: Tool + 'static>(&mut self, tool: T) -> &mut Self {
        let name = tool.config().name.clone();
        info!(tool = %name, "Registering tool");
        self.tools.insert(name, Arc::new(tool));
        self
    }

    /// Register a tool with a specific category
    pub fn register_with_category<T: Tool + 'static>(
        &mut self,
        tool: T,
        category: ToolCategory,
    ) -> &mut Self {
        let name = tool.config().name.clone();
        self.tools.insert(name.clone(), Arc::new(tool));
        self.categories.entry(category).or_default().push(name);
        self
    }

    /// Register every operation of an adapter under its category
    pub fn register_adapter<A: Adapter>(&mut self, adapter: A) -> &mut Self {
        let category = adapter.category();
        info!(category = %category, operations = adapter.operations().len(), "Registering adapter");
        self.register_category_with_name(category, adapter.into_tools())
    }

    /// Register tools with category tracking
    pub fn register_category_with_name(
        &mut self,
        category: ToolCategory,
        tools: Vec<Box<dyn Tool>>,
    ) -> &mut Self {
        for tool in tools {
            let name = tool.config().name.clone();
            debug!(tool = %name, category = %category, "Registering tool");
            let names = self.categories.entry(category.clone()).or_default();
            if !names.contains(&name) {
                names.push(name.clone());
            }
            self.tools.insert(name, Arc::from(tool));
        }
        self
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// List all tool names, sorted
    pub fn list_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    /// List tool definitions, sorted by name
    pub fn list_definitions(&self) -> Vec<ToolDefinition> {
        let mut definitions: Vec<ToolDefinition> =
            self.tools.values().map(|t| t.definition()).collect();
        definitions.sort_by(|a, b| a.name.cmp(&b.name));
        definitions
    }

    /// List tools by category
    pub fn list_by_category(&self, category: &ToolCategory) -> Vec<Arc<dyn Tool>> {
        self.categories
            .get(category)
            .map(|names| {
                names
                    .iter()
                    .filter_map(|n| self.tools.get(n).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Category a tool was registered under
    pub fn category_of(&self, name: &str) -> Option<&ToolCategory> {
        self.categories
            .iter()
            .find(|(_, names)| names.iter().any(|n| n == name))
            .map(|(category, _)| category)
    }

    /// Get tool count
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if registry is empty
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Convert registry into a tool executor
    pub fn into_executor(self) -> BuiltinToolExecutor {
        BuiltinToolExecutor::new(self)
    }

    /// Create executor reference without consuming registry
    pub fn as_executor(&self) -> BuiltinToolExecutor {
        BuiltinToolExecutor {
            tools: self.tools.clone(),
        }
    }
}

/// Built-in tool executor that wraps the registry
pub struct BuiltinToolExecutor {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl BuiltinToolExecutor {
    /// Create from registry
    pub fn new(registry: ToolRegistry) -> Self {
        Self {
            tools: registry.tools,
        }
    }

    /// Create from a list of tools
    pub fn from_tools(tools: Vec<Box<dyn Tool>>) -> Self {
        let mut map = HashMap::new();
        for tool in tools {
            let name = tool.config().name.clone();
            map.insert(name, Arc::from(tool));
        }
        Self { tools: map }
    }
}

#[async_trait]
impl ToolExecutor for BuiltinToolExecutor {
    async fn execute_tool(&self, name: &str, input: ToolInput) -> AtkResult<ToolResult> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| AtkError::tool(format!("Tool not found: {}", name)))?;

        debug!(tool = %name, "Executing tool");
        let start = std::time::Instant::now();

        match tool.execute(input).await {
            Ok(result) => {
                let elapsed = start.elapsed().as_millis() as u64;
                debug!(tool = %name, elapsed_ms = %elapsed, success = %result.success, "Tool execution complete");
                Ok(result.with_execution_time(elapsed))
            }
            Err(e) => {
                warn!(tool = %name, error = %e, "Tool execution failed");
                Err(e)
            }
        }
    }

    fn list_tools(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.definition()).collect()
    }

    fn get_tool(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }
}

/// Composite executor that combines multiple executors
pub struct CompositeToolExecutor {
    executors: Vec<Box<dyn ToolExecutor>>,
}

impl CompositeToolExecutor {
    /// Create new composite executor
    pub fn new() -> Self {
        Self { executors: vec![] }
    }

    /// Add an executor
    pub fn add_executor<E: ToolExecutor + 'static>(mut self, executor: E) -> Self {
        self.executors.push(Box::new(executor));
        self
    }

    /// Add a boxed executor
    pub fn add_boxed(mut self, executor: Box<dyn ToolExecutor>) -> Self {
        self.executors.push(executor);
        self
    }
}

impl Default for CompositeToolExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ToolExecutor for CompositeToolExecutor {
    async fn execute_tool(&self, name: &str, input: ToolInput) -> AtkResult<ToolResult> {
        // First executor that knows the tool wins
        for executor in &self.executors {
            if executor.get_tool(name).is_some() {
                return executor.execute_tool(name, input).await;
            }
        }
        Err(AtkError::tool(format!(
            "Tool not found in any executor: {}",
            name
        )))
    }

    fn list_tools(&self) -> Vec<ToolDefinition> {
        let mut tools = Vec::new();
        let mut seen = std::collections::HashSet::new();

        for executor in &self.executors {
            for tool in executor.list_tools() {
                if seen.insert(tool.name.clone()) {
                    tools.push(tool);
                }
            }
        }
        tools
    }

    fn get_tool(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.executors
            .iter()
            .find_map(|executor| executor.get_tool(name))
    }
}
