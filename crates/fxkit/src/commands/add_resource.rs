//! Add-resource command implementation

use super::CommandContext;
use anyhow::Result;
use tracing::instrument;

/// Activate `resource` (and its dependencies), printing the new active set
#[instrument(skip(context))]
pub async fn execute_add_resource(
    context: &CommandContext,
    resource: String,
    module: Option<String>,
) -> Result<()> {
    let mut inputs = context.inputs().with_resource(resource);
    if let Some(module) = module {
        inputs = inputs.with_module(module);
    }

    let solution = context.solution();
    let active = context
        .lock()
        .run(&inputs, || solution.add_resource(inputs.clone()))
        .await?;

    for plugin in &active {
        println!("{}", plugin);
    }
    Ok(())
}
