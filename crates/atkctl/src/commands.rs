//! Subcommand implementations

pub mod describe;
pub mod invoke;
pub mod list;
pub mod validate;

use anyhow::{Context, Result};
use atk_tools::{Toolbox, ToolRegistry};
use std::path::Path;

/// Load the toolbox at `path` and build its tools
pub(crate) fn load_registry(path: &Path) -> Result<(Toolbox, ToolRegistry)> {
    let toolbox = Toolbox::from_file(path)
        .with_context(|| format!("Failed to load toolbox {}", path.display()))?;
    let registry = ToolRegistry::from_toolbox(&toolbox)
        .with_context(|| format!("Failed to build tools for toolbox '{}'", toolbox.metadata.name))?;
    Ok((toolbox, registry))
}
