//! Invocation inputs and the shared read context handed to plugin hooks

use crate::settings::{EnvInfo, ProjectSettings};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Platform the tool is invoked from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Platform {
    /// Interactive command line
    #[default]
    Cli,
    /// Editor extension
    Vscode,
    /// Visual Studio host
    Vs,
    /// Help rendering for the command line
    CliHelp,
}

impl Platform {
    /// Get the platform name as string
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Cli => "cli",
            Platform::Vscode => "vscode",
            Platform::Vs => "vs",
            Platform::CliHelp => "cli-help",
        }
    }

    /// Non-interactive platforms never take the project lock
    pub fn is_static(&self) -> bool {
        matches!(self, Platform::Vs | Platform::CliHelp)
    }
}

/// Per-invocation inputs gathered from the caller (CLI flags, UI answers)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Inputs {
    /// Project root, if a project is open
    pub project_path: Option<PathBuf>,
    /// Calling platform
    #[serde(default)]
    pub platform: Platform,
    /// Skip the project lock for this invocation
    #[serde(default)]
    pub ignore_lock: bool,
    /// Resource requested by add-resource
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
    /// Module requested by add-resource
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,
    /// Free-form question answers
    #[serde(default, flatten)]
    pub answers: Map<String, Value>,
}

impl Inputs {
    /// Inputs for an open project
    pub fn for_project(project_path: impl Into<PathBuf>) -> Self {
        Self {
            project_path: Some(project_path.into()),
            ..Self::default()
        }
    }

    /// Set the calling platform
    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    /// Request lock bypass
    pub fn with_ignore_lock(mut self, ignore_lock: bool) -> Self {
        self.ignore_lock = ignore_lock;
        self
    }

    /// Set the add-resource selection
    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    /// Set the add-resource module
    pub fn with_module(mut self, module: impl Into<String>) -> Self {
        self.module = Some(module.into());
        self
    }

    /// Record a question answer
    pub fn with_answer(mut self, key: impl Into<String>, value: Value) -> Self {
        self.answers.insert(key.into(), value);
        self
    }

    /// Project path, when set
    pub fn project_path(&self) -> Option<&Path> {
        self.project_path.as_deref()
    }
}

/// Read-only context passed to every plugin hook
///
/// Cloning is cheap; hooks receive their own copy so the futures they return can be
/// `'static` and run concurrently with sibling plugins.
#[derive(Debug, Clone)]
pub struct LifecycleContext {
    /// Project settings snapshot taken when the phase started
    pub settings: Arc<ProjectSettings>,
    /// Invocation inputs
    pub inputs: Arc<Inputs>,
    /// Target environment state
    pub env: Arc<EnvInfo>,
}

impl LifecycleContext {
    /// Create a new lifecycle context
    pub fn new(settings: ProjectSettings, inputs: Inputs, env: EnvInfo) -> Self {
        Self {
            settings: Arc::new(settings),
            inputs: Arc::new(inputs),
            env: Arc::new(env),
        }
    }

    /// Replace the environment state, keeping settings and inputs shared
    pub fn with_env(&self, env: EnvInfo) -> Self {
        Self {
            settings: Arc::clone(&self.settings),
            inputs: Arc::clone(&self.inputs),
            env: Arc::new(env),
        }
    }

    /// The environment profile section owned by one plugin
    pub fn plugin_profile(&self, plugin: &str) -> Option<&Value> {
        self.env.profile.get(plugin)
    }

    /// Project root, when set
    pub fn project_path(&self) -> Option<&Path> {
        self.inputs.project_path()
    }
}
