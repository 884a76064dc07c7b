//! Resource plugin descriptors and the plugin registry
//!
//! A plugin is a named bundle of optional lifecycle hooks. Plugins are developed
//! independently, so every capability is optional: a phase simply skips the plugins
//! that do not provide its hook.
//!
//! ## Plugin Architecture
//!
//! - [`PluginDescriptor`] holds one `Option<Hook>` per capability
//! - [`PluginRegistry`] owns the descriptors, keyed by plugin id, in registration order
//! - Hooks receive a cloned [`LifecycleContext`] and return a `'static` future so the
//!   executors can run sibling plugins concurrently

use crate::context::LifecycleContext;
use crate::errors::{FxResult, PluginError};
use futures::future::BoxFuture;
use futures::FutureExt;
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

/// A lifecycle hook of a plugin
pub type Hook<T> =
    Arc<dyn Fn(LifecycleContext) -> BoxFuture<'static, FxResult<T>> + Send + Sync>;

/// Infrastructure template contributed by a plugin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceTemplate {
    /// Template language (e.g. `bicep`)
    pub kind: String,
    /// Template payload
    pub template: Value,
}

/// Lifecycle capability a plugin may provide
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Capability {
    Scaffold,
    ProvisionResource,
    ConfigureResource,
    Deploy,
    Publish,
    PluginDependencies,
    GenerateResourceTemplate,
    UpdateResourceTemplate,
    AddResource,
}

impl Capability {
    /// Task name used in logs and error tags
    pub fn task_name(&self) -> &'static str {
        match self {
            Capability::Scaffold => "scaffold",
            Capability::ProvisionResource => "provisionResource",
            Capability::ConfigureResource => "configureResource",
            Capability::Deploy => "deploy",
            Capability::Publish => "publish",
            Capability::PluginDependencies => "pluginDependencies",
            Capability::GenerateResourceTemplate => "generateResourceTemplate",
            Capability::UpdateResourceTemplate => "updateResourceTemplate",
            Capability::AddResource => "addResource",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.task_name())
    }
}

fn hook<T, F, Fut>(f: F) -> Hook<T>
where
    F: Fn(LifecycleContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = FxResult<T>> + Send + 'static,
{
    Arc::new(move |ctx| f(ctx).boxed())
}

/// A resource plugin: identity plus optional lifecycle hooks
#[derive(Clone, Default)]
pub struct PluginDescriptor {
    name: String,
    resource_type: String,
    description: String,
    scaffold: Option<Hook<()>>,
    provision_resource: Option<Hook<Value>>,
    configure_resource: Option<Hook<Value>>,
    deploy: Option<Hook<()>>,
    publish: Option<Hook<()>>,
    plugin_dependencies: Option<Hook<Vec<String>>>,
    generate_resource_template: Option<Hook<ResourceTemplate>>,
    update_resource_template: Option<Hook<ResourceTemplate>>,
    add_resource: Option<Hook<()>>,
}

macro_rules! capability {
    ($with:ident, $get:ident, $field:ident, $out:ty) => {
        #[doc = concat!("Provide the `", stringify!($field), "` hook")]
        pub fn $with<F, Fut>(mut self, f: F) -> Self
        where
            F: Fn(LifecycleContext) -> Fut + Send + Sync + 'static,
            Fut: Future<Output = FxResult<$out>> + Send + 'static,
        {
            self.$field = Some(hook(f));
            self
        }

        #[doc = concat!("The `", stringify!($field), "` hook, if provided")]
        pub fn $get(&self) -> Option<&Hook<$out>> {
            self.$field.as_ref()
        }
    };
}

impl PluginDescriptor {
    /// Create a plugin with no capabilities
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Set the display resource type
    pub fn with_resource_type(mut self, resource_type: impl Into<String>) -> Self {
        self.resource_type = resource_type.into();
        self
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Plugin id
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Display resource type
    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    /// Description
    pub fn description(&self) -> &str {
        &self.description
    }

    capability!(with_scaffold, scaffold, scaffold, ());
    capability!(with_provision_resource, provision_resource, provision_resource, Value);
    capability!(with_configure_resource, configure_resource, configure_resource, Value);
    capability!(with_deploy, deploy, deploy, ());
    capability!(with_publish, publish, publish, ());
    capability!(
        with_plugin_dependencies,
        plugin_dependencies,
        plugin_dependencies,
        Vec<String>
    );
    capability!(
        with_generate_resource_template,
        generate_resource_template,
        generate_resource_template,
        ResourceTemplate
    );
    capability!(
        with_update_resource_template,
        update_resource_template,
        update_resource_template,
        ResourceTemplate
    );
    capability!(with_add_resource, add_resource, add_resource, ());

    /// Capabilities this plugin provides
    pub fn capabilities(&self) -> Vec<Capability> {
        let provided = [
            (Capability::Scaffold, self.scaffold.is_some()),
            (Capability::ProvisionResource, self.provision_resource.is_some()),
            (Capability::ConfigureResource, self.configure_resource.is_some()),
            (Capability::Deploy, self.deploy.is_some()),
            (Capability::Publish, self.publish.is_some()),
            (Capability::PluginDependencies, self.plugin_dependencies.is_some()),
            (
                Capability::GenerateResourceTemplate,
                self.generate_resource_template.is_some(),
            ),
            (
                Capability::UpdateResourceTemplate,
                self.update_resource_template.is_some(),
            ),
            (Capability::AddResource, self.add_resource.is_some()),
        ];
        provided
            .into_iter()
            .filter_map(|(capability, present)| present.then_some(capability))
            .collect()
    }
}

impl fmt::Debug for PluginDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginDescriptor")
            .field("name", &self.name)
            .field("resource_type", &self.resource_type)
            .field("capabilities", &self.capabilities())
            .finish()
    }
}

/// Registry of known plugins, in registration order
#[derive(Debug, Clone, Default)]
pub struct PluginRegistry {
    plugins: IndexMap<String, Arc<PluginDescriptor>>,
}

impl PluginRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a plugin, replacing any previous plugin with the same id
    pub fn register(&mut self, plugin: PluginDescriptor) {
        let name = plugin.name().to_string();
        if self.plugins.contains_key(&name) {
            warn!("Plugin '{}' is already registered, replacing it", name);
        } else {
            debug!("Registering plugin: {}", name);
        }
        self.plugins.insert(name, Arc::new(plugin));
    }

    /// Builder form of [`PluginRegistry::register`]
    pub fn with_plugin(mut self, plugin: PluginDescriptor) -> Self {
        self.register(plugin);
        self
    }

    /// Look up a plugin by id
    pub fn get(&self, name: &str) -> FxResult<Arc<PluginDescriptor>> {
        self.plugins.get(name).cloned().ok_or_else(|| {
            PluginError::NotFound {
                name: name.to_string(),
            }
            .into()
        })
    }

    /// Whether a plugin id is registered
    pub fn contains(&self, name: &str) -> bool {
        self.plugins.contains_key(name)
    }

    /// Registered plugin ids in registration order
    pub fn names(&self) -> Vec<&str> {
        self.plugins.keys().map(String::as_str).collect()
    }

    /// Registered plugins in registration order
    pub fn iter(&self) -> impl Iterator<Item = &Arc<PluginDescriptor>> {
        self.plugins.values()
    }

    /// Number of registered plugins
    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    /// Whether no plugin is registered
    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Resolve an active plugin set to descriptors, keeping the set's order
    pub fn select(&self, active: &IndexSet<String>) -> FxResult<Vec<Arc<PluginDescriptor>>> {
        active.iter().map(|name| self.get(name)).collect()
    }
}
