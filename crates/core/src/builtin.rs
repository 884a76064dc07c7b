//! Built-in local resource plugins
//!
//! Template-only stand-ins for the cloud resource plugins. They write an empty
//! `templates/azure/<Module>.bicep` file when their template is generated and report
//! placeholder resource records on provision, which makes every lifecycle command
//! usable without cloud access.

use crate::context::LifecycleContext;
use crate::errors::{CoreError, FxError, FxResult};
use crate::plugins::{PluginDescriptor, PluginRegistry, ResourceTemplate};
use crate::settings::SOLUTION_PROFILE_KEY;
use crate::solution::TemplateDeployer;
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Storage plugin id
pub const STORAGE_PLUGIN: &str = "fx-resource-azure-storage";
/// Bot plugin id
pub const BOT_PLUGIN: &str = "fx-resource-azure-bot";
/// Web app plugin id
pub const WEB_APP_PLUGIN: &str = "fx-resource-azure-web-app";

/// Template kind written by the local plugins
pub const BICEP: &str = "bicep";

/// Project-relative directory holding generated templates
pub fn templates_dir(project_path: &Path) -> PathBuf {
    project_path.join("templates").join("azure")
}

/// The three local plugins: storage, bot and web app
pub fn local_plugins() -> Vec<PluginDescriptor> {
    vec![
        PluginDescriptor::new(STORAGE_PLUGIN)
            .with_resource_type("Azure Storage")
            .with_description("Azure Storage")
            .with_generate_resource_template(|ctx| write_template(ctx, "AzureStorage"))
            .with_provision_resource(|ctx| async move {
                let host = format!("{}.z19.web.core.windows.net", resource_slug(&ctx, "tab"));
                Ok(json!({
                    "domain": host,
                    "endpoint": format!("https://{}", host),
                    "storageResourceId": resource_id(&ctx, "Microsoft.Storage/storageAccounts", "tab"),
                }))
            })
            .with_deploy(|_| async { Ok(()) }),
        PluginDescriptor::new(BOT_PLUGIN)
            .with_resource_type("Azure Bot")
            .with_description("Azure Bot")
            .with_plugin_dependencies(|_| async { Ok(vec![WEB_APP_PLUGIN.to_string()]) })
            .with_generate_resource_template(|ctx| write_template(ctx, "AzureBot"))
            .with_provision_resource(|ctx| async move {
                let site = resource_slug(&ctx, "bot");
                Ok(json!({
                    "skuName": "F1",
                    "siteName": site,
                    "validDomain": format!("{}.azurewebsites.net", site),
                    "appServicePlanName": site,
                    "botWebAppResourceId": resource_id(&ctx, "Microsoft.Web/sites", "bot"),
                    "siteEndpoint": format!("https://{}.azurewebsites.net", site),
                }))
            })
            .with_deploy(|_| async { Ok(()) }),
        PluginDescriptor::new(WEB_APP_PLUGIN)
            .with_resource_type("Azure Web App")
            .with_description("Azure Web App")
            .with_generate_resource_template(|ctx| write_template(ctx, "AzureWebApp"))
            .with_provision_resource(|ctx| async move {
                let site = resource_slug(&ctx, "web");
                Ok(json!({
                    "resourceId": resource_id(&ctx, "Microsoft.Web/sites", "web"),
                    "endpoint": format!("https://{}.azurewebsites.net", site),
                }))
            }),
    ]
}

/// Registry preloaded with [`local_plugins`]
pub fn local_registry() -> PluginRegistry {
    local_plugins()
        .into_iter()
        .fold(PluginRegistry::new(), PluginRegistry::with_plugin)
}

async fn write_template(ctx: LifecycleContext, module: &'static str) -> FxResult<ResourceTemplate> {
    let project_path = ctx.project_path().ok_or(CoreError::NoProjectOpened)?;
    let dir = templates_dir(project_path);
    let file = dir.join(format!("{}.bicep", module));

    tokio::fs::create_dir_all(&dir)
        .await
        .map_err(|e| template_error(&file, e))?;
    tokio::fs::write(&file, "")
        .await
        .map_err(|e| template_error(&file, e))?;
    debug!("Generated template {}", file.display());

    Ok(ResourceTemplate {
        kind: BICEP.to_string(),
        template: json!({ "module": module, "path": format!("templates/azure/{}.bicep", module) }),
    })
}

fn template_error(path: &Path, e: std::io::Error) -> FxError {
    FxError::system(
        crate::errors::SOLUTION_SOURCE,
        "TemplateWriteError",
        format!("Failed to write template {}: {}", path.display(), e),
    )
    .with_inner(e)
}

/// Lowercase alphanumeric resource name derived from the app, environment and suffix
fn resource_slug(ctx: &LifecycleContext, suffix: &str) -> String {
    let app: String = ctx
        .settings
        .app_name
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect();
    format!("{}{}{}", app, ctx.env.name, suffix)
}

fn resource_id(ctx: &LifecycleContext, provider: &str, suffix: &str) -> String {
    format!(
        "/subscriptions/local/resourceGroups/{}-{}-rg/providers/{}/{}",
        ctx.settings.app_name,
        ctx.env.name,
        provider,
        resource_slug(ctx, suffix)
    )
}

/// Template deployer that records the generated templates instead of deploying them
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalTemplateDeployer;

#[async_trait]
impl TemplateDeployer for LocalTemplateDeployer {
    async fn deploy(&self, ctx: &LifecycleContext) -> FxResult<Map<String, Value>> {
        let mut deployed = Vec::new();
        if let Some(project_path) = ctx.project_path() {
            let dir = templates_dir(project_path);
            if let Ok(mut entries) = tokio::fs::read_dir(&dir).await {
                while let Ok(Some(entry)) = entries.next_entry().await {
                    let path = entry.path();
                    if path.extension().is_some_and(|ext| ext == BICEP) {
                        if let Some(name) = path.file_name() {
                            deployed.push(name.to_string_lossy().to_string());
                        }
                    }
                }
            }
        }
        deployed.sort();
        debug!("Recorded {} template(s) as deployed", deployed.len());

        let mut outputs = Map::new();
        outputs.insert(
            SOLUTION_PROFILE_KEY.to_string(),
            json!({ "deployedTemplates": deployed }),
        );
        Ok(outputs)
    }
}
