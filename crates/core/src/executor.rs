//! Sequential and concurrent execution of plugin lifecycle tasks
//!
//! A [`NamedTask`] pairs a plugin identifier and a task name with a one-shot async
//! operation. Two executors run batches of them:
//!
//! - [`execute_sequentially`] awaits tasks one at a time and stops at the first error.
//!   Used for stages where later tasks depend on earlier ones (question asking).
//! - [`execute_concurrently`] starts every task, joins them all and classifies the
//!   batch as success, partial success or failure. Plugins are developed
//!   independently, so one plugin's fault must never abort its siblings.
//!
//! Both executors catch panics raised while creating or polling a task's future and
//! report them as an `UnknownError` tagged with the owning plugin and task name, the
//! same shape as an explicit `Err` returned by the task.

use crate::errors::{FxError, FxResult};
use crate::logging::{summary_header, summary_result, task_line};
use futures::future::{join_all, BoxFuture};
use futures::FutureExt;
use serde::Serialize;
use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use tracing::{debug, info, instrument, warn};

/// Boxed future produced by a task operation
pub type TaskFuture<'a, T> = BoxFuture<'a, FxResult<T>>;

type Operation<'a, T> = Box<dyn FnOnce() -> TaskFuture<'a, T> + Send + 'a>;

/// One lifecycle phase of one plugin, ready to run
pub struct NamedTask<'a, T> {
    owner_id: String,
    task_name: String,
    operation: Operation<'a, T>,
}

impl<'a, T: Send + 'a> NamedTask<'a, T> {
    /// Create a task from a zero-argument async operation
    ///
    /// The operation is invoked at most once.
    pub fn new<F, Fut>(owner_id: impl Into<String>, task_name: impl Into<String>, operation: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'a,
        Fut: Future<Output = FxResult<T>> + Send + 'a,
    {
        Self {
            owner_id: owner_id.into(),
            task_name: task_name.into(),
            operation: Box::new(move || operation().boxed()),
        }
    }

    /// Identifier of the plugin that contributed the task
    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    /// Lifecycle task name
    pub fn task_name(&self) -> &str {
        &self.task_name
    }

    /// Invoke the operation, normalizing panics and tagging errors
    pub async fn run(self) -> TaskResult<T> {
        let NamedTask {
            owner_id,
            task_name,
            operation,
        } = self;

        debug!("Starting task {}.{}", owner_id, task_name);

        let result = match std::panic::catch_unwind(AssertUnwindSafe(operation)) {
            Ok(future) => match AssertUnwindSafe(future).catch_unwind().await {
                Ok(result) => result.map_err(|e| e.with_task(&owner_id, &task_name)),
                Err(payload) => Err(FxError::unknown(
                    &owner_id,
                    &task_name,
                    &panic_message(payload.as_ref()),
                )),
            },
            Err(payload) => Err(FxError::unknown(
                &owner_id,
                &task_name,
                &panic_message(payload.as_ref()),
            )),
        };

        TaskResult {
            owner_id,
            task_name,
            result,
        }
    }
}

impl<T> fmt::Debug for NamedTask<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NamedTask")
            .field("owner_id", &self.owner_id)
            .field("task_name", &self.task_name)
            .finish_non_exhaustive()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}

/// Outcome of one task
#[derive(Debug, Clone, PartialEq)]
pub struct TaskResult<T> {
    /// Identifier of the plugin that contributed the task
    pub owner_id: String,
    /// Lifecycle task name
    pub task_name: String,
    /// Task result
    pub result: FxResult<T>,
}

impl<T> TaskResult<T> {
    /// Whether the task succeeded
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Three-way classification of a concurrently executed batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum OutcomeStatus {
    /// Every task succeeded
    Success,
    /// At least one task succeeded and at least one failed
    PartialSuccess,
    /// Every task failed
    Failure,
}

impl OutcomeStatus {
    /// Get the status as string
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeStatus::Success => "success",
            OutcomeStatus::PartialSuccess => "partialSuccess",
            OutcomeStatus::Failure => "failure",
        }
    }
}

/// Aggregated results of a concurrent stage, in original task order
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateOutcome<T> {
    /// Overall classification
    pub status: OutcomeStatus,
    /// Per-task results in the order the tasks were submitted
    pub results: Vec<TaskResult<T>>,
}

impl<T> AggregateOutcome<T> {
    /// Classify a list of task results
    ///
    /// An empty list is a success: no task failed.
    pub fn from_results(results: Vec<TaskResult<T>>) -> Self {
        let succeeded = results.iter().filter(|r| r.is_ok()).count();
        let status = if succeeded == results.len() {
            OutcomeStatus::Success
        } else if succeeded == 0 {
            OutcomeStatus::Failure
        } else {
            OutcomeStatus::PartialSuccess
        };
        Self { status, results }
    }

    /// Whether every task succeeded
    pub fn is_success(&self) -> bool {
        self.status == OutcomeStatus::Success
    }

    /// First error in task order
    pub fn first_error(&self) -> Option<&FxError> {
        self.results.iter().find_map(|r| r.result.as_ref().err())
    }

    /// All errors in task order
    pub fn errors(&self) -> impl Iterator<Item = &FxError> {
        self.results.iter().filter_map(|r| r.result.as_ref().err())
    }

    /// Successful outputs keyed by owner, in task order
    pub fn successes(&self) -> impl Iterator<Item = (&str, &T)> {
        self.results
            .iter()
            .filter_map(|r| r.result.as_ref().ok().map(|v| (r.owner_id.as_str(), v)))
    }

    /// Consume the outcome, returning successful outputs keyed by owner
    pub fn into_records(self) -> Vec<(String, T)> {
        self.results
            .into_iter()
            .filter_map(|r| r.result.ok().map(|v| (r.owner_id, v)))
            .collect()
    }

    /// Collapse to a plain result: all outputs, or the first error
    pub fn into_result(self) -> FxResult<Vec<(String, T)>> {
        let mut outputs = Vec::with_capacity(self.results.len());
        for r in self.results {
            outputs.push((r.owner_id, r.result?));
        }
        Ok(outputs)
    }
}

/// Run tasks one by one in list order
///
/// Stops at the first error and returns it unchanged (apart from the task tag);
/// tasks after the failing one are never started.
#[instrument(level = "debug", skip(tasks), fields(task_count = tasks.len()))]
pub async fn execute_sequentially<'a, T: Send + 'a>(
    step: &str,
    tasks: Vec<NamedTask<'a, T>>,
) -> FxResult<()> {
    let mut executed = Vec::with_capacity(tasks.len());
    let mut failure = None;

    for task in tasks {
        let TaskResult {
            owner_id,
            task_name,
            result,
        } = task.run().await;
        let ok = result.is_ok();
        executed.push((owner_id, task_name, ok));
        if let Err(e) = result {
            failure = Some(e);
            break;
        }
    }

    info!("{}", summary_header(step));
    for (owner_id, task_name, ok) in &executed {
        info!("{}", task_line(owner_id, task_name, *ok));
    }

    match failure {
        Some(e) => {
            warn!("{}", summary_result(step, false));
            warn!(error = %e, "Sequential {} stage stopped", step);
            Err(e)
        }
        None => {
            info!("{}", summary_result(step, true));
            Ok(())
        }
    }
}

/// Start every task, join them all and aggregate the results
///
/// Individual task failures are data in the returned outcome, never control flow.
#[instrument(level = "debug", skip(tasks), fields(task_count = tasks.len()))]
pub async fn execute_concurrently<'a, T: Send + 'a>(
    step: &str,
    tasks: Vec<NamedTask<'a, T>>,
) -> AggregateOutcome<T> {
    let results = join_all(tasks.into_iter().map(NamedTask::run)).await;
    let outcome = AggregateOutcome::from_results(results);

    info!("{}", summary_header(step));
    for r in &outcome.results {
        info!("{}", task_line(&r.owner_id, &r.task_name, r.is_ok()));
        if let Err(e) = &r.result {
            debug!(error = %e, "{}.{} failed", r.owner_id, r.task_name);
        }
    }
    let ok = outcome.is_success();
    if ok {
        info!("{}", summary_result(step, true));
    } else {
        warn!("{}", summary_result(step, false));
    }
    debug!("Concurrent {} stage finished: {}", step, outcome.status.as_str());

    outcome
}
