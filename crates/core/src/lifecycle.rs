//! Lifecycle phases and their outcomes
//!
//! A phase turns the active plugin set into one task per plugin that provides the
//! phase's hook, runs them, and reports a [`PhaseOutcome`]. Plugins without the hook
//! are skipped, not failed.

use crate::context::LifecycleContext;
use crate::errors::{FxError, FxResult};
use crate::executor::{AggregateOutcome, NamedTask, OutcomeStatus};
use crate::plugins::{Capability, Hook, PluginDescriptor};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Lifecycle phases in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LifecyclePhase {
    /// Generate project code
    Scaffold,
    /// Create cloud resources
    Provision,
    /// Wire created resources together
    Configure,
    /// Push code to the resources
    Deploy,
    /// Publish the app
    Publish,
}

impl LifecyclePhase {
    /// Get the phase name as string
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecyclePhase::Scaffold => "scaffold",
            LifecyclePhase::Provision => "provision",
            LifecyclePhase::Configure => "configure",
            LifecyclePhase::Deploy => "deploy",
            LifecyclePhase::Publish => "publish",
        }
    }

    /// Plugin capability that implements the phase
    pub fn capability(&self) -> Capability {
        match self {
            LifecyclePhase::Scaffold => Capability::Scaffold,
            LifecyclePhase::Provision => Capability::ProvisionResource,
            LifecyclePhase::Configure => Capability::ConfigureResource,
            LifecyclePhase::Deploy => Capability::Deploy,
            LifecyclePhase::Publish => Capability::Publish,
        }
    }

    /// Whether the phase requires a completed provision
    pub fn requires_provision(&self) -> bool {
        matches!(self, LifecyclePhase::Deploy | LifecyclePhase::Publish)
    }
}

impl fmt::Display for LifecyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a lifecycle phase
///
/// Partial success is a first-class outcome: resources that were created stay
/// created and are reported alongside the error.
#[derive(Debug, Clone, PartialEq)]
pub enum PhaseOutcome<T> {
    /// Every plugin succeeded
    Success(T),
    /// Some plugins succeeded; `output` holds what was produced
    PartialSuccess { output: T, error: FxError },
    /// Nothing usable was produced
    Failure(FxError),
}

impl<T> PhaseOutcome<T> {
    /// Classify a concurrent stage, mapping the successful outputs with `f`
    pub fn from_aggregate<R, F>(outcome: AggregateOutcome<R>, f: F) -> Self
    where
        F: FnOnce(Vec<(String, R)>) -> T,
    {
        let status = outcome.status;
        let error = outcome.first_error().cloned();
        let records = outcome.into_records();
        match (status, error) {
            (OutcomeStatus::Success, _) | (_, None) => PhaseOutcome::Success(f(records)),
            (OutcomeStatus::PartialSuccess, Some(error)) => PhaseOutcome::PartialSuccess {
                output: f(records),
                error,
            },
            (OutcomeStatus::Failure, Some(error)) => PhaseOutcome::Failure(error),
        }
    }

    /// Overall status
    pub fn status(&self) -> OutcomeStatus {
        match self {
            PhaseOutcome::Success(_) => OutcomeStatus::Success,
            PhaseOutcome::PartialSuccess { .. } => OutcomeStatus::PartialSuccess,
            PhaseOutcome::Failure(_) => OutcomeStatus::Failure,
        }
    }

    /// Whether the phase fully succeeded
    pub fn is_success(&self) -> bool {
        matches!(self, PhaseOutcome::Success(_))
    }

    /// Produced output, if any
    pub fn output(&self) -> Option<&T> {
        match self {
            PhaseOutcome::Success(output) | PhaseOutcome::PartialSuccess { output, .. } => {
                Some(output)
            }
            PhaseOutcome::Failure(_) => None,
        }
    }

    /// The error, unless the phase fully succeeded
    pub fn error(&self) -> Option<&FxError> {
        match self {
            PhaseOutcome::Success(_) => None,
            PhaseOutcome::PartialSuccess { error, .. } | PhaseOutcome::Failure(error) => Some(error),
        }
    }

    /// Strict view: anything short of full success is an error
    pub fn into_result(self) -> FxResult<T> {
        match self {
            PhaseOutcome::Success(output) => Ok(output),
            PhaseOutcome::PartialSuccess { error, .. } | PhaseOutcome::Failure(error) => Err(error),
        }
    }
}

impl<T> From<FxError> for PhaseOutcome<T> {
    fn from(error: FxError) -> Self {
        PhaseOutcome::Failure(error)
    }
}

/// Build one task per plugin that provides the hook picked by `select`
///
/// Tasks are named after the phase's capability. Plugins without the hook are
/// skipped. Every task gets its own copy of `ctx`.
pub fn phase_tasks<T, S>(
    plugins: &[Arc<PluginDescriptor>],
    ctx: &LifecycleContext,
    phase: LifecyclePhase,
    select: S,
) -> Vec<NamedTask<'static, T>>
where
    T: Send + 'static,
    S: Fn(&PluginDescriptor) -> Option<&Hook<T>>,
{
    let capability = phase.capability();
    let tasks: Vec<_> = plugins
        .iter()
        .filter_map(|plugin| {
            let hook = Arc::clone(select(plugin.as_ref())?);
            let ctx = ctx.clone();
            Some(NamedTask::new(
                plugin.name(),
                capability.task_name(),
                move || hook(ctx),
            ))
        })
        .collect();

    debug!(
        "{} of {} plugin(s) provide {}",
        tasks.len(),
        plugins.len(),
        capability
    );
    tasks
}
