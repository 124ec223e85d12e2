//! Validate a toolbox file

use anyhow::Result;
use std::path::Path;

use super::load_registry;

pub fn execute(config: &Path) -> Result<()> {
    let (toolbox, registry) = load_registry(config)?;

    println!(
        "Toolbox '{}' is valid: {} tools ({})",
        toolbox.metadata.name,
        registry.len(),
        toolbox.configured_sections().join(", ")
    );
    Ok(())
}
