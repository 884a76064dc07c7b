//! Command implementations
//!
//! Every command that changes the project runs inside the project lock.

pub mod add_resource;
pub mod lifecycle;
pub mod new;
pub mod resources;

use fxkit_core::builtin::{local_registry, LocalTemplateDeployer};
use fxkit_core::context::{Inputs, Platform};
use fxkit_core::errors::FxError;
use fxkit_core::lifecycle::LifecyclePhase;
use fxkit_core::lock::ProjectLock;
use fxkit_core::settings::{CoreConfig, ProjectSettingsStore};
use fxkit_core::solution::Solution;
use std::path::PathBuf;
use std::sync::Arc;

/// Global options resolved from the command line
#[derive(Debug, Clone)]
pub struct CommandContext {
    /// Project folder
    pub project_path: PathBuf,
    /// Target environment
    pub env: String,
    /// Skip the project lock
    pub ignore_lock: bool,
    /// Calling platform
    pub platform: Platform,
}

impl CommandContext {
    /// Inputs for the project named on the command line
    pub fn inputs(&self) -> Inputs {
        Inputs::for_project(&self.project_path)
            .with_platform(self.platform)
            .with_ignore_lock(self.ignore_lock)
    }

    pub fn store(&self) -> ProjectSettingsStore {
        ProjectSettingsStore::new(&self.project_path)
    }

    /// Solution over the built-in local plugins
    pub fn solution(&self) -> Solution {
        Solution::new(Arc::new(local_registry()), self.store())
            .with_deployer(Arc::new(LocalTemplateDeployer))
            .with_env(self.env.clone())
    }

    pub fn lock(&self) -> ProjectLock {
        ProjectLock::new(&CoreConfig::from_env())
    }
}

/// A phase finished with some plugins failed
///
/// Mapped to its own exit code by `main`.
#[derive(Debug, thiserror::Error)]
#[error("{phase} partially succeeded: {error}")]
pub struct PartialSuccess {
    pub phase: LifecyclePhase,
    #[source]
    pub error: FxError,
}
