//! Three-stage lifecycle pipeline
//!
//! A pipeline runs `pre` tasks one by one (questions are asked in order), then the
//! `main` tasks concurrently, then the `post` tasks concurrently. Optional hooks after
//! each stage perform side effects that need the stage outcome, e.g. deploying the
//! templates generated by the main stage before resources are configured.
//!
//! Any error short-circuits the remaining stages. Errors leave the pipeline tagged
//! with the stage they came from unless an inner layer already tagged them.

use crate::errors::{FxError, FxResult};
use crate::executor::{
    execute_concurrently, execute_sequentially, AggregateOutcome, NamedTask, OutcomeStatus,
};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::fmt;
use std::future::Future;
use tracing::{debug, instrument};

/// Hook run after a stage with no outcome to inspect
pub type StageHook<'a> = Box<dyn FnOnce() -> BoxFuture<'a, FxResult<()>> + Send + 'a>;

/// Hook run after a concurrent stage
///
/// The hook reads what it needs from the outcome synchronously and returns the future
/// performing the side effect.
pub type OutcomeHook<'a, T> =
    Box<dyn FnOnce(&AggregateOutcome<T>) -> BoxFuture<'a, FxResult<()>> + Send + 'a>;

/// Stage of a pipeline, used to tag errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineStage {
    Pre,
    OnPreFinished,
    Main,
    OnMainFinished,
    Post,
    OnPostFinished,
}

impl PipelineStage {
    /// Get the stage name as string
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::Pre => "pre",
            PipelineStage::OnPreFinished => "onPreFinished",
            PipelineStage::Main => "main",
            PipelineStage::OnMainFinished => "onMainFinished",
            PipelineStage::Post => "post",
            PipelineStage::OnPostFinished => "onPostFinished",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcomes of the concurrent stages of a completed pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOutput<T, U> {
    pub main: AggregateOutcome<T>,
    pub post: AggregateOutcome<U>,
}

/// Builder and runner for a `pre -> main -> post` lifecycle
pub struct LifecyclePipeline<'a, T, U = ()> {
    pre: Vec<NamedTask<'a, ()>>,
    main: Vec<NamedTask<'a, T>>,
    post: Vec<NamedTask<'a, U>>,
    on_pre_finished: Option<StageHook<'a>>,
    on_main_finished: Option<OutcomeHook<'a, T>>,
    on_post_finished: Option<OutcomeHook<'a, U>>,
}

impl<'a, T: Send + 'a, U: Send + 'a> Default for LifecyclePipeline<'a, T, U> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, T: Send + 'a, U: Send + 'a> LifecyclePipeline<'a, T, U> {
    /// Create an empty pipeline
    pub fn new() -> Self {
        Self {
            pre: Vec::new(),
            main: Vec::new(),
            post: Vec::new(),
            on_pre_finished: None,
            on_main_finished: None,
            on_post_finished: None,
        }
    }

    /// Set the sequential pre-stage tasks
    pub fn with_pre(mut self, tasks: Vec<NamedTask<'a, ()>>) -> Self {
        self.pre = tasks;
        self
    }

    /// Set the concurrent main-stage tasks
    pub fn with_main(mut self, tasks: Vec<NamedTask<'a, T>>) -> Self {
        self.main = tasks;
        self
    }

    /// Set the concurrent post-stage tasks
    pub fn with_post(mut self, tasks: Vec<NamedTask<'a, U>>) -> Self {
        self.post = tasks;
        self
    }

    /// Run a side effect after the pre stage succeeds
    pub fn on_pre_finished<F, Fut>(mut self, hook: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'a,
        Fut: Future<Output = FxResult<()>> + Send + 'a,
    {
        self.on_pre_finished = Some(Box::new(move || hook().boxed()));
        self
    }

    /// Inspect the main outcome before the post stage
    ///
    /// With this hook installed a partially successful main stage is handed to the
    /// hook, which decides whether the pipeline continues.
    pub fn on_main_finished<F, Fut>(mut self, hook: F) -> Self
    where
        F: FnOnce(&AggregateOutcome<T>) -> Fut + Send + 'a,
        Fut: Future<Output = FxResult<()>> + Send + 'a,
    {
        self.on_main_finished = Some(Box::new(move |outcome: &AggregateOutcome<T>| {
            hook(outcome).boxed()
        }));
        self
    }

    /// Inspect the post outcome after every post task succeeded
    pub fn on_post_finished<F, Fut>(mut self, hook: F) -> Self
    where
        F: FnOnce(&AggregateOutcome<U>) -> Fut + Send + 'a,
        Fut: Future<Output = FxResult<()>> + Send + 'a,
    {
        self.on_post_finished = Some(Box::new(move |outcome: &AggregateOutcome<U>| {
            hook(outcome).boxed()
        }));
        self
    }

    /// Run the pipeline to completion or to the first error
    #[instrument(level = "debug", skip(self), fields(
        pre = self.pre.len(),
        main = self.main.len(),
        post = self.post.len()
    ))]
    pub async fn execute(self) -> FxResult<PipelineOutput<T, U>> {
        let LifecyclePipeline {
            pre,
            main,
            post,
            on_pre_finished,
            on_main_finished,
            on_post_finished,
        } = self;

        execute_sequentially(PipelineStage::Pre.as_str(), pre)
            .await
            .map_err(tag(PipelineStage::Pre))?;

        if let Some(hook) = on_pre_finished {
            hook().await.map_err(tag(PipelineStage::OnPreFinished))?;
        }

        let main = execute_concurrently(PipelineStage::Main.as_str(), main).await;
        if let Some(error) = failed(&main, on_main_finished.is_some()) {
            return Err(error.with_stage(PipelineStage::Main.as_str()));
        }
        if let Some(hook) = on_main_finished {
            hook(&main).await.map_err(tag(PipelineStage::OnMainFinished))?;
        }

        let post = execute_concurrently(PipelineStage::Post.as_str(), post).await;
        if let Some(error) = post.first_error() {
            return Err(error.clone().with_stage(PipelineStage::Post.as_str()));
        }
        if let Some(hook) = on_post_finished {
            hook(&post).await.map_err(tag(PipelineStage::OnPostFinished))?;
        }

        debug!("Pipeline completed");
        Ok(PipelineOutput { main, post })
    }
}

impl<T, U> fmt::Debug for LifecyclePipeline<'_, T, U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecyclePipeline")
            .field("pre", &self.pre)
            .field("main", &self.main)
            .field("post", &self.post)
            .field("on_pre_finished", &self.on_pre_finished.is_some())
            .field("on_main_finished", &self.on_main_finished.is_some())
            .field("on_post_finished", &self.on_post_finished.is_some())
            .finish()
    }
}

fn tag(stage: PipelineStage) -> impl Fn(FxError) -> FxError {
    move |e| e.with_stage(stage.as_str())
}

/// Error that ends the pipeline after the main stage, if any
///
/// Total failure always ends it. Partial success only ends it when no hook is
/// installed to judge the outcome.
fn failed<T>(outcome: &AggregateOutcome<T>, has_hook: bool) -> Option<FxError> {
    match outcome.status {
        OutcomeStatus::Success => None,
        OutcomeStatus::PartialSuccess if has_hook => None,
        OutcomeStatus::PartialSuccess | OutcomeStatus::Failure => outcome.first_error().cloned(),
    }
}
