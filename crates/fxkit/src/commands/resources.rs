//! Resources command implementation
//!
//! Read-only, so it never takes the project lock.

use super::CommandContext;
use crate::cli::OutputFormat;
use anyhow::Result;
use serde::Serialize;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ResourceEntry {
    id: String,
    resource_type: String,
    active: bool,
    capabilities: Vec<&'static str>,
}

/// List the registered resource plugins
pub fn execute_resources(context: &CommandContext, output_format: OutputFormat) -> Result<()> {
    let solution = context.solution();
    let settings = solution.store().load()?;
    let active = settings.active_plugins();

    let entries: Vec<ResourceEntry> = solution
        .registry()
        .iter()
        .map(|plugin| ResourceEntry {
            id: plugin.name().to_string(),
            resource_type: plugin.resource_type().to_string(),
            active: active.contains(plugin.name()),
            capabilities: plugin
                .capabilities()
                .iter()
                .map(|capability| capability.task_name())
                .collect(),
        })
        .collect();

    match output_format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&entries)?),
        OutputFormat::Text => {
            for entry in &entries {
                let marker = if entry.active { "*" } else { " " };
                println!("{} {} ({})", marker, entry.id, entry.resource_type);
            }
        }
    }
    Ok(())
}
