//! New command implementation
//!
//! Creates `<project-path>/<name>` with the `.fx` marker folder and default settings.

use super::CommandContext;
use anyhow::{bail, Context, Result};
use fxkit_core::settings::{ModuleSettings, ProjectSettingsStore};
use tracing::{info, instrument};

/// Execute the new command
#[instrument(skip(context))]
pub fn execute_new(context: &CommandContext, name: &str, modules: &[String]) -> Result<()> {
    if name.trim().is_empty() {
        bail!("App name must not be empty");
    }

    let project_path = context.project_path.join(name);
    let store = ProjectSettingsStore::new(&project_path);
    if store.settings_path().exists() {
        bail!("A project already exists at {}", project_path.display());
    }
    std::fs::create_dir_all(&project_path)
        .with_context(|| format!("Failed to create {}", project_path.display()))?;

    let mut settings = store.init_project(name)?;
    if !modules.is_empty() {
        settings.solution_settings.modules = modules
            .iter()
            .map(|module| ModuleSettings {
                name: module.clone(),
                hosting_plugin: None,
            })
            .collect();
        store.save(&settings)?;
    }

    info!("Created project {} at {}", name, project_path.display());
    println!("{}", project_path.display());
    Ok(())
}
