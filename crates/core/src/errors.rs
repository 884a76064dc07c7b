//! Error types and handling
//!
//! Every lifecycle hook, executor and pipeline stage reports failure through a single
//! [`FxError`] value. Domain-specific enums ([`CoreError`], [`PluginError`]) describe
//! the failures raised by the orchestrator itself and convert into `FxError` with the
//! matching kind and stable code, so callers only ever match on one error channel.

use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Component name used as the `source` of errors raised by the orchestrator core
pub const CORE_SOURCE: &str = "core";

/// Component name used as the `source` of errors raised by the solution layer
pub const SOLUTION_SOURCE: &str = "solution";

/// Stable code given to panics caught at the executor boundary
pub const UNKNOWN_ERROR: &str = "UnknownError";

/// Who is expected to fix the failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Caller-fixable condition (bad input, missing project, busy lock)
    User,
    /// Unexpected failure inside a plugin or the orchestrator
    System,
}

impl ErrorKind {
    /// Get the kind as string
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::User => "user",
            ErrorKind::System => "system",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The plugin task an error was produced by
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskRef {
    /// Identifier of the plugin that owns the task
    pub owner_id: String,
    /// Lifecycle task name (e.g. `provisionResource`)
    pub task_name: String,
}

impl fmt::Display for TaskRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.owner_id, self.task_name)
    }
}

/// Unified error returned by plugin hooks and every orchestration layer
///
/// Origin tags (`task`, `stage`) are only ever filled in when absent, so an error
/// that bubbles through several layers keeps the tag of the place it was raised.
#[derive(Error, Debug, Clone)]
#[error("[{source_name}] {name}: {message}")]
pub struct FxError {
    /// User or system caused
    pub kind: ErrorKind,
    /// Stable machine-readable code
    pub name: String,
    /// Human readable message
    pub message: String,
    /// Component that reported the error (plugin id, `core`, `solution`)
    pub source_name: String,
    /// Task that produced the error, when raised inside an executor
    pub task: Option<TaskRef>,
    /// Pipeline stage that produced the error
    pub stage: Option<String>,
    /// Underlying cause
    #[source]
    pub inner: Option<Arc<dyn std::error::Error + Send + Sync>>,
}

impl FxError {
    fn new(
        kind: ErrorKind,
        source_name: impl Into<String>,
        name: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            name: name.into(),
            message: message.into(),
            source_name: source_name.into(),
            task: None,
            stage: None,
            inner: None,
        }
    }

    /// Create a user error
    pub fn user(
        source_name: impl Into<String>,
        name: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(ErrorKind::User, source_name, name, message)
    }

    /// Create a system error
    pub fn system(
        source_name: impl Into<String>,
        name: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(ErrorKind::System, source_name, name, message)
    }

    /// Build the `UnknownError` used for panics escaping a plugin task
    pub fn unknown(owner_id: &str, task_name: &str, detail: &str) -> Self {
        Self::system(
            owner_id,
            UNKNOWN_ERROR,
            format!(
                "unknown error from plugin: {}, taskName: {}, error: {}",
                owner_id, task_name, detail
            ),
        )
        .with_task(owner_id, task_name)
    }

    /// Attach an underlying cause
    pub fn with_inner<E>(mut self, inner: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.inner = Some(Arc::new(inner));
        self
    }

    /// Tag the error with its owning task unless it already carries one
    pub fn with_task(mut self, owner_id: &str, task_name: &str) -> Self {
        if self.task.is_none() {
            self.task = Some(TaskRef {
                owner_id: owner_id.to_string(),
                task_name: task_name.to_string(),
            });
        }
        self
    }

    /// Tag the error with the pipeline stage unless it already carries one
    pub fn with_stage(mut self, stage: &str) -> Self {
        if self.stage.is_none() {
            self.stage = Some(stage.to_string());
        }
        self
    }

    /// Whether the caller can fix this error
    pub fn is_user_error(&self) -> bool {
        self.kind == ErrorKind::User
    }

    /// Whether this is the lock contention error
    pub fn is_concurrent_operation(&self) -> bool {
        self.name == CoreError::CONCURRENT_OPERATION
    }
}

impl PartialEq for FxError {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
            && self.name == other.name
            && self.message == other.message
            && self.source_name == other.source_name
            && self.task == other.task
            && self.stage == other.stage
    }
}

/// Errors raised by the orchestrator around projects, inputs and locking
#[derive(Error, Debug)]
pub enum CoreError {
    /// No project path was supplied
    #[error("No project opened, you can create a new project or open an existing one.")]
    NoProjectOpened,

    /// Project path does not exist on disk
    #[error("Project path does not exist: {path}")]
    PathNotExist { path: String },

    /// Project directory has no `.fx` marker folder
    #[error("The command only works for a project created by fxkit: {path}")]
    InvalidProject { path: String },

    /// Another invocation holds the project lock
    #[error("Concurrent operation error, please wait until the running task finishes or you can reload the window to cancel it.")]
    ConcurrentOperation,

    /// Lock bookkeeping failed for a reason other than contention
    #[error("Failed to manage project lock at {path}: {message}")]
    LockIo { path: String, message: String },

    /// Caller supplied input is missing or malformed
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    /// The resource is already hosted by the module
    #[error("Resource already added: {resource}")]
    ResourceAlreadyAdded { resource: String },

    /// Deploy or publish attempted before a successful provision
    #[error("The resources of app '{app_name}' have not been provisioned yet, please run provision first.")]
    CannotDeployBeforeProvision { app_name: String },

    /// Project settings could not be read or written
    #[error("Failed to access project settings at {path}: {message}")]
    Settings { path: String, message: String },
}

impl CoreError {
    /// Stable code of [`CoreError::ConcurrentOperation`]
    pub const CONCURRENT_OPERATION: &'static str = "ConcurrentOperation";

    /// Stable error code
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::NoProjectOpened => "NoProjectOpened",
            CoreError::PathNotExist { .. } => "PathNotExist",
            CoreError::InvalidProject { .. } => "InvalidProject",
            CoreError::ConcurrentOperation => Self::CONCURRENT_OPERATION,
            CoreError::LockIo { .. } => "LockIoError",
            CoreError::InvalidInput { .. } => "InvalidInput",
            CoreError::ResourceAlreadyAdded { .. } => "ResourceAlreadyAdded",
            CoreError::CannotDeployBeforeProvision { .. } => "CannotDeployBeforeProvision",
            CoreError::Settings { .. } => "ProjectSettingsError",
        }
    }

    /// User or system caused
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::LockIo { .. } | CoreError::Settings { .. } => ErrorKind::System,
            _ => ErrorKind::User,
        }
    }
}

impl From<CoreError> for FxError {
    fn from(err: CoreError) -> Self {
        FxError::new(err.kind(), CORE_SOURCE, err.code(), err.to_string())
    }
}

/// Errors raised while looking up or registering plugins
#[derive(Error, Debug)]
pub enum PluginError {
    /// No plugin registered under the identifier
    #[error("Plugin not found: {name}")]
    NotFound { name: String },
}

impl From<PluginError> for FxError {
    fn from(err: PluginError) -> Self {
        let code = match &err {
            PluginError::NotFound { .. } => "PluginNotFound",
        };
        FxError::system(SOLUTION_SOURCE, code, err.to_string())
    }
}

/// Convenience type alias for results carrying an [`FxError`]
pub type FxResult<T> = std::result::Result<T, FxError>;
