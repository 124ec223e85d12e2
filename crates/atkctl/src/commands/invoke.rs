//! Invoke a tool with JSON arguments

use anyhow::{bail, Context, Result};
use atk_core::{ToolExecutor, ToolInput};
use serde_json::Value;
use std::path::Path;
use tracing::debug;

use super::load_registry;
use crate::output::{self, Format};

/// Returns whether the tool reported success
pub async fn execute(
    config: &Path,
    tool_name: &str,
    args: Option<&str>,
    args_file: Option<&Path>,
    output: &str,
) -> Result<bool> {
    let format = Format::parse(output)?;
    let arguments = read_arguments(args, args_file)?;
    let (_, registry) = load_registry(config)?;
    let executor = registry.into_executor();

    debug!(tool = %tool_name, "Invoking tool");
    let result = executor
        .execute_tool(tool_name, ToolInput::new(arguments))
        .await
        .with_context(|| format!("Failed to invoke '{}'", tool_name))?;

    output::print(&result, format)?;
    Ok(result.success)
}

fn read_arguments(args: Option<&str>, args_file: Option<&Path>) -> Result<Value> {
    let arguments: Value = match (args, args_file) {
        (Some(json), _) => serde_json::from_str(json).context("--args is not valid JSON")?,
        (None, Some(path)) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            // YAML is a superset of JSON
            serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse arguments in {}", path.display()))?
        }
        (None, None) => Value::Object(Default::default()),
    };

    if !arguments.is_object() {
        bail!("Tool arguments must be an object, got: {}", arguments);
    }
    Ok(arguments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    #[test]
    fn test_read_arguments_inline() {
        let args = read_arguments(Some(r#"{"text": "hi"}"#), None).unwrap();
        assert_eq!(args, json!({ "text": "hi" }));
    }

    #[test]
    fn test_read_arguments_defaults_to_empty_object() {
        assert_eq!(read_arguments(None, None).unwrap(), json!({}));
    }

    #[test]
    fn test_read_arguments_from_yaml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "index: logs\nsize: 5").unwrap();

        let args = read_arguments(None, Some(file.path())).unwrap();
        assert_eq!(args, json!({ "index": "logs", "size": 5 }));
    }

    #[test]
    fn test_read_arguments_rejects_non_objects() {
        assert!(read_arguments(Some("[1, 2]"), None).is_err());
        assert!(read_arguments(Some("{not json"), None).is_err());
    }
}
