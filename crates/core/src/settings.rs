//! Project settings, environment state and runtime configuration
//!
//! Project settings live inside the project's `.fx` marker folder:
//!
//! - `.fx/configs/projectSettings.json` - app identity and the active resource plugins
//! - `.fx/states/state.<env>.json` - per-environment provision outputs
//!
//! Runtime knobs that are not part of the versioned project tree are read from the
//! environment through [`CoreConfig`].

use crate::errors::{CoreError, FxResult};
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::{debug, instrument};

/// Product name used for temp-directory bookkeeping
pub const PRODUCT_NAME: &str = "fxkit";

/// Marker directory that identifies a project root
pub const CONFIG_FOLDER: &str = ".fx";

/// Default environment name
pub const DEFAULT_ENV: &str = "dev";

/// Environment profile key holding solution-level state
pub const SOLUTION_PROFILE_KEY: &str = "solution";

/// Solution profile flag set after a successful provision
pub const PROVISION_SUCCEEDED: &str = "provisionSucceeded";

/// Environment variable overriding the lock root directory
pub const LOCK_DIR_ENV: &str = "FXKIT_LOCK_DIR";

/// Environment variable forcing lock bypass
pub const IGNORE_LOCK_ENV: &str = "FXKIT_IGNORE_LOCK";

/// A module of the app and the plugin hosting it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleSettings {
    /// Module name (e.g. `tab`, `bot`)
    pub name: String,
    /// Plugin hosting the module, if chosen
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hosting_plugin: Option<String>,
}

/// Solution section of the project settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolutionSettings {
    /// Solution name
    pub name: String,
    /// Active resource plugins in activation order
    #[serde(default)]
    pub active_resource_plugins: IndexSet<String>,
    /// Selected app capabilities
    #[serde(default)]
    pub capabilities: Vec<String>,
    /// Selected cloud resources
    #[serde(default)]
    pub azure_resources: Vec<String>,
    /// App modules
    #[serde(default)]
    pub modules: Vec<ModuleSettings>,
}

impl Default for SolutionSettings {
    fn default() -> Self {
        Self {
            name: "fx-solution-azure".to_string(),
            active_resource_plugins: IndexSet::new(),
            capabilities: Vec::new(),
            azure_resources: Vec::new(),
            modules: Vec::new(),
        }
    }
}

impl SolutionSettings {
    /// Look up a module by name
    pub fn module_mut(&mut self, name: &str) -> Option<&mut ModuleSettings> {
        self.modules.iter_mut().find(|m| m.name == name)
    }
}

/// Contents of `projectSettings.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSettings {
    /// Application name
    pub app_name: String,
    /// Project identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    /// Settings format version
    #[serde(default = "default_version")]
    pub version: String,
    /// Solution section
    #[serde(default)]
    pub solution_settings: SolutionSettings,
}

fn default_version() -> String {
    "2.0.0".to_string()
}

impl ProjectSettings {
    /// Fresh settings for a new app
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
            project_id: None,
            version: default_version(),
            solution_settings: SolutionSettings::default(),
        }
    }

    /// Active resource plugins in activation order
    pub fn active_plugins(&self) -> &IndexSet<String> {
        &self.solution_settings.active_resource_plugins
    }
}

/// Per-environment state: provision outputs keyed by plugin name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvInfo {
    /// Environment name
    pub name: String,
    /// Profile sections keyed by plugin name
    #[serde(default)]
    pub profile: Map<String, Value>,
}

impl EnvInfo {
    /// Empty state for an environment
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            profile: Map::new(),
        }
    }

    /// Whether a previous provision completed
    pub fn is_provisioned(&self) -> bool {
        self.profile
            .get(SOLUTION_PROFILE_KEY)
            .and_then(|s| s.get(PROVISION_SUCCEEDED))
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Record the provision flag in the solution profile section
    pub fn set_provisioned(&mut self, provisioned: bool) {
        let section = self
            .profile
            .entry(SOLUTION_PROFILE_KEY.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !section.is_object() {
            *section = Value::Object(Map::new());
        }
        if let Value::Object(map) = section {
            map.insert(PROVISION_SUCCEEDED.to_string(), Value::Bool(provisioned));
        }
    }

    /// Merge plugin records into the profile, one section per plugin
    pub fn merge_records<I>(&mut self, records: I)
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        for (plugin, value) in records {
            merge_record(&mut self.profile, plugin, value);
        }
    }
}

/// Insert a record, extending an existing object section key by key
///
/// Non-object values replace whatever was there.
pub fn merge_record(sections: &mut Map<String, Value>, key: String, value: Value) {
    match (sections.get_mut(&key), value) {
        (Some(Value::Object(existing)), Value::Object(update)) => existing.extend(update),
        (_, value) => {
            sections.insert(key, value);
        }
    }
}

/// Loads and saves project settings and environment state under `.fx`
#[derive(Debug, Clone)]
pub struct ProjectSettingsStore {
    project_path: PathBuf,
}

impl ProjectSettingsStore {
    /// Store for the project rooted at `project_path`
    pub fn new(project_path: impl Into<PathBuf>) -> Self {
        Self {
            project_path: project_path.into(),
        }
    }

    /// Project root
    pub fn project_path(&self) -> &Path {
        &self.project_path
    }

    /// Marker directory of the project
    pub fn config_dir(&self) -> PathBuf {
        self.project_path.join(CONFIG_FOLDER)
    }

    /// Path of `projectSettings.json`
    pub fn settings_path(&self) -> PathBuf {
        self.config_dir().join("configs").join("projectSettings.json")
    }

    /// Path of the state file for one environment
    pub fn env_state_path(&self, env: &str) -> PathBuf {
        self.config_dir()
            .join("states")
            .join(format!("state.{}.json", env))
    }

    /// Create the marker directory and default settings for a new project
    #[instrument(skip(self))]
    pub fn init_project(&self, app_name: &str) -> FxResult<ProjectSettings> {
        let settings = ProjectSettings::new(app_name);
        self.save(&settings)?;
        debug!("Initialized project at {}", self.project_path.display());
        Ok(settings)
    }

    /// Load project settings
    #[instrument(skip(self))]
    pub fn load(&self) -> FxResult<ProjectSettings> {
        read_json(&self.settings_path())
    }

    /// Save project settings
    #[instrument(skip(self, settings))]
    pub fn save(&self, settings: &ProjectSettings) -> FxResult<()> {
        write_json(&self.settings_path(), settings)
    }

    /// Load environment state, or an empty state when none was saved yet
    pub fn load_env(&self, env: &str) -> FxResult<EnvInfo> {
        let path = self.env_state_path(env);
        if !path.exists() {
            return Ok(EnvInfo::new(env));
        }
        read_json(&path)
    }

    /// Save environment state
    pub fn save_env(&self, env: &EnvInfo) -> FxResult<()> {
        write_json(&self.env_state_path(&env.name), env)
    }
}

fn settings_error(path: &Path, message: impl ToString) -> CoreError {
    CoreError::Settings {
        path: path.display().to_string(),
        message: message.to_string(),
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> FxResult<T> {
    let content = std::fs::read_to_string(path).map_err(|e| settings_error(path, e))?;
    let value = serde_json::from_str(&content).map_err(|e| settings_error(path, e))?;
    Ok(value)
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> FxResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| settings_error(path, e))?;
    }
    let content = serde_json::to_string_pretty(value).map_err(|e| settings_error(path, e))?;

    // Write beside the target and rename so readers never observe a torn file
    let tmp_path = path.with_extension(format!("{}.tmp", std::process::id()));
    let result = std::fs::write(&tmp_path, content).and_then(|_| std::fs::rename(&tmp_path, path));
    if let Err(e) = result {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(settings_error(path, e).into());
    }
    Ok(())
}

/// Runtime configuration read from the process environment
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoreConfig {
    /// Root directory for lock bookkeeping (defaults to the system temp dir)
    pub lock_root: Option<PathBuf>,
    /// Bypass the project lock for every invocation
    pub ignore_lock: bool,
}

impl CoreConfig {
    /// Read configuration from `FXKIT_*` environment variables
    pub fn from_env() -> Self {
        let lock_root = std::env::var_os(LOCK_DIR_ENV)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);
        let ignore_lock = std::env::var(IGNORE_LOCK_ENV)
            .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);
        Self {
            lock_root,
            ignore_lock,
        }
    }

    /// Effective lock root directory
    pub fn lock_root(&self) -> PathBuf {
        self.lock_root.clone().unwrap_or_else(std::env::temp_dir)
    }
}
