//! Lifecycle commands: scaffold, provision, deploy and publish

use super::{CommandContext, PartialSuccess};
use anyhow::Result;
use fxkit_core::errors::FxError;
use fxkit_core::lifecycle::{LifecyclePhase, PhaseOutcome};
use serde::Serialize;
use tracing::{info, instrument};

/// Execute the scaffold command
#[instrument(skip(context))]
pub async fn execute_scaffold(context: &CommandContext) -> Result<()> {
    let inputs = context.inputs();
    let solution = context.solution();
    context
        .lock()
        .run(&inputs, || solution.scaffold(inputs.clone(), Vec::new()))
        .await?;
    info!("Scaffold finished");
    Ok(())
}

/// Execute the provision command, printing the resource records as JSON
#[instrument(skip(context))]
pub async fn execute_provision(context: &CommandContext) -> Result<()> {
    let inputs = context.inputs();
    let solution = context.solution();
    let outcome = context
        .lock()
        .run(&inputs, || async {
            Ok::<_, FxError>(solution.provision(inputs.clone(), Vec::new()).await)
        })
        .await?;
    report(LifecyclePhase::Provision, outcome)
}

/// Execute the deploy command, printing the deployed plugin ids
#[instrument(skip(context))]
pub async fn execute_deploy(context: &CommandContext) -> Result<()> {
    let inputs = context.inputs();
    let solution = context.solution();
    let outcome = context
        .lock()
        .run(&inputs, || async {
            Ok::<_, FxError>(solution.deploy(inputs.clone()).await)
        })
        .await?;
    report(LifecyclePhase::Deploy, outcome)
}

/// Execute the publish command
#[instrument(skip(context))]
pub async fn execute_publish(context: &CommandContext) -> Result<()> {
    let inputs = context.inputs();
    let solution = context.solution();
    context
        .lock()
        .run(&inputs, || solution.publish(inputs.clone()))
        .await?;
    info!("Publish finished");
    Ok(())
}

/// Print whatever the phase produced, then map its status to an error
fn report<T: Serialize>(phase: LifecyclePhase, outcome: PhaseOutcome<T>) -> Result<()> {
    if let Some(output) = outcome.output() {
        println!("{}", serde_json::to_string_pretty(output)?);
    }
    match outcome {
        PhaseOutcome::Success(_) => Ok(()),
        PhaseOutcome::PartialSuccess { error, .. } => Err(PartialSuccess { phase, error }.into()),
        PhaseOutcome::Failure(error) => Err(error.into()),
    }
}
