//! Adapter abstraction
//!
//! An adapter wraps one external API or CLI and exposes several operations.
//! It owns its configuration and transport for its whole lifetime and is
//! shared between the tools that expose its operations.
//!
//! ```rust,ignore
//! let adapter = Elasticsearch::new(config, transport);
//! let tools = adapter.into_tools(); // one Tool per operation
//! ```

use atk_core::{AtkError, AtkResult, Tool, ToolConfig, ToolInput, ToolResult};
use async_trait::async_trait;
use std::sync::Arc;

use crate::registry::ToolCategory;

/// A family of operations over one external system
#[async_trait]
pub trait Adapter: Send + Sync + 'static {
    fn category(&self) -> ToolCategory;

    /// Declared operations, one `ToolConfig` each
    fn operations(&self) -> Vec<ToolConfig>;

    /// Run the named operation
    async fn dispatch(&self, operation: &str, input: ToolInput) -> AtkResult<ToolResult>;

    /// Expose every operation as a standalone tool
    fn into_tools(self) -> Vec<Box<dyn Tool>>
    where
        Self: Sized,
    {
        let adapter = Arc::new(self);
        adapter
            .operations()
            .into_iter()
            .map(|config| {
                Box::new(AdapterTool {
                    adapter: adapter.clone(),
                    config,
                }) as Box<dyn Tool>
            })
            .collect()
    }
}

/// A single adapter operation presented as a `Tool`
pub struct AdapterTool<A: Adapter> {
    adapter: Arc<A>,
    config: ToolConfig,
}

impl<A: Adapter> AdapterTool<A> {
    pub fn category(&self) -> ToolCategory {
        self.adapter.category()
    }
}

#[async_trait]
impl<A: Adapter> Tool for AdapterTool<A> {
    async fn execute(&self, input: ToolInput) -> AtkResult<ToolResult> {
        self.adapter.dispatch(&self.config.name, input).await
    }

    fn config(&self) -> &ToolConfig {
        &self.config
    }
}

/// Error for a dispatch on an operation the adapter does not declare
pub fn unknown_operation(operation: &str) -> AtkError {
    AtkError::tool(format!("Unknown operation: {}", operation))
}
