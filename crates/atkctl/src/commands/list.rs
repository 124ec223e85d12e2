//! List configured tools (kubectl get style)

use anyhow::{bail, Result};
use comfy_table::presets::NOTHING;
use comfy_table::{ContentArrangement, Table};
use std::path::Path;

use super::load_registry;

pub fn execute(config: &Path, output: &str) -> Result<()> {
    let (_, registry) = load_registry(config)?;
    let definitions = registry.list_definitions();

    match output {
        "json" => println!("{}", serde_json::to_string_pretty(&definitions)?),
        "name" => {
            for definition in &definitions {
                println!("{}", definition.name);
            }
        }
        "wide" => {
            if definitions.is_empty() {
                eprintln!("No tools configured.");
                return Ok(());
            }

            let mut table = Table::new();
            table
                .load_preset(NOTHING)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["NAME", "CATEGORY", "CONTRACT", "DESCRIPTION"]);

            for definition in &definitions {
                let category = registry
                    .category_of(&definition.name)
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "-".to_string());
                table.add_row(vec![
                    definition.name.clone(),
                    category,
                    definition.failure_contract.to_string(),
                    definition.description.clone(),
                ]);
            }

            println!("{table}");
        }
        other => bail!("Unsupported output format '{}' (expected wide, json or name)", other),
    }

    Ok(())
}
