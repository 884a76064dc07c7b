//! Resource dependency resolution
//!
//! Adding a resource may pull in others: a bot needs a web app to host it. The
//! resolver closes a requested plugin set under each plugin's declared dependencies,
//! then [`wiring_tasks`] builds the template work needed to activate the result.

use crate::context::LifecycleContext;
use crate::errors::FxResult;
use crate::executor::NamedTask;
use crate::plugins::{Capability, PluginRegistry};
use futures::FutureExt;
use indexmap::IndexSet;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Computes the dependency closure of plugin sets
#[derive(Debug, Clone, Copy)]
pub struct DependencyResolver<'r> {
    registry: &'r PluginRegistry,
}

impl<'r> DependencyResolver<'r> {
    /// Resolver over the given registry
    pub fn new(registry: &'r PluginRegistry) -> Self {
        Self { registry }
    }

    /// Close `requested` under declared plugin dependencies
    ///
    /// Runs full passes over a snapshot of the working set, adding every dependency not
    /// seen yet, until a pass adds nothing. The set only grows and is bounded by the
    /// registry, so dependency cycles terminate. Insertion order is kept: requested ids
    /// first, then dependencies in discovery order.
    ///
    /// Unknown plugin ids and failing dependency queries abort resolution. The
    /// caller's set is never modified.
    #[instrument(level = "debug", skip(self, ctx))]
    pub async fn resolve(
        &self,
        ctx: &LifecycleContext,
        requested: &IndexSet<String>,
    ) -> FxResult<IndexSet<String>> {
        let mut resolved = requested.clone();
        let mut pass = 0usize;

        loop {
            pass += 1;
            let snapshot: Vec<String> = resolved.iter().cloned().collect();
            let mut grew = false;

            for name in snapshot {
                let plugin = self.registry.get(&name)?;
                let Some(query) = plugin.plugin_dependencies() else {
                    continue;
                };

                let query = Arc::clone(query);
                let ctx = ctx.clone();
                let dependencies = NamedTask::new(
                    name.as_str(),
                    Capability::PluginDependencies.task_name(),
                    move || query(ctx),
                )
                .run()
                .await
                .result?;

                for dependency in dependencies {
                    if resolved.insert(dependency.clone()) {
                        debug!("{} requires {}", name, dependency);
                        grew = true;
                    }
                }
            }

            if !grew {
                break;
            }
        }

        debug!("Resolved {} plugin(s) in {} pass(es)", resolved.len(), pass);
        Ok(resolved)
    }
}

/// Union of newly added and previously active plugins: added ids first
pub fn merge_active(added: &IndexSet<String>, existing: &IndexSet<String>) -> IndexSet<String> {
    added.iter().chain(existing.iter()).cloned().collect()
}

/// Template work that activates `union`
///
/// Plugins in `added` but not in `existing` run `add_resource` then
/// `generate_resource_template`; every plugin in `union` then runs
/// `update_resource_template`. Tasks are ordered per plugin, in union order, and are
/// meant to run sequentially.
pub fn wiring_tasks(
    registry: &PluginRegistry,
    ctx: &LifecycleContext,
    union: &IndexSet<String>,
    added: &IndexSet<String>,
    existing: &IndexSet<String>,
) -> FxResult<Vec<NamedTask<'static, ()>>> {
    let mut tasks = Vec::new();

    for name in union {
        let plugin = registry.get(name)?;
        let is_new = added.contains(name) && !existing.contains(name);

        if is_new {
            if let Some(hook) = plugin.add_resource() {
                let (hook, ctx) = (Arc::clone(hook), ctx.clone());
                tasks.push(NamedTask::new(
                    name.as_str(),
                    Capability::AddResource.task_name(),
                    move || hook(ctx),
                ));
            }
            if let Some(hook) = plugin.generate_resource_template() {
                let (hook, ctx) = (Arc::clone(hook), ctx.clone());
                tasks.push(NamedTask::new(
                    name.as_str(),
                    Capability::GenerateResourceTemplate.task_name(),
                    move || hook(ctx).map(|r| r.map(|_| ())),
                ));
            }
        }

        if let Some(hook) = plugin.update_resource_template() {
            let (hook, ctx) = (Arc::clone(hook), ctx.clone());
            tasks.push(NamedTask::new(
                name.as_str(),
                Capability::UpdateResourceTemplate.task_name(),
                move || hook(ctx).map(|r| r.map(|_| ())),
            ));
        }
    }

    Ok(tasks)
}
