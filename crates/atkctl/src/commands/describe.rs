//! Describe a single tool

use anyhow::{anyhow, Result};
use atk_core::FailureContract;
use serde::Serialize;
use std::path::Path;

use super::load_registry;
use crate::output::{self, Format};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ToolDescription {
    name: String,
    category: String,
    failure_contract: FailureContract,
    timeout_secs: u64,
    description: String,
    parameters: serde_json::Value,
}

pub fn execute(config: &Path, tool_name: &str, output: &str) -> Result<()> {
    let format = Format::parse(output)?;
    let (toolbox, registry) = load_registry(config)?;

    let tool = registry.get(tool_name).ok_or_else(|| {
        anyhow!(
            "Tool '{}' not found in toolbox '{}'. Use 'atkctl list' to see available tools.",
            tool_name,
            toolbox.metadata.name
        )
    })?;

    let config = tool.config();
    let description = ToolDescription {
        name: config.name.clone(),
        category: registry
            .category_of(tool_name)
            .map(|c| c.to_string())
            .unwrap_or_default(),
        failure_contract: config.failure_contract,
        timeout_secs: config.timeout_secs,
        description: config.description.clone(),
        parameters: config.parameters.clone(),
    };

    output::print(&description, format)
}
