//! Solution-level lifecycle entry points
//!
//! [`Solution`] ties the pieces together for one project: it loads the project
//! settings and environment state, selects the active plugins from the registry, runs
//! the phase through the executors or the pipeline, and persists what changed.
//!
//! Locking is the caller's concern; wrap calls in [`crate::lock::ProjectLock::run`].

use crate::context::{Inputs, LifecycleContext};
use crate::dependencies::{merge_active, wiring_tasks, DependencyResolver};
use crate::errors::{CoreError, FxError, FxResult, SOLUTION_SOURCE};
use crate::executor::{execute_concurrently, execute_sequentially, NamedTask};
use crate::lifecycle::{phase_tasks, LifecyclePhase, PhaseOutcome};
use crate::pipeline::{LifecyclePipeline, PipelineStage};
use crate::plugins::{PluginDescriptor, PluginRegistry};
use crate::settings::{merge_record, EnvInfo, ProjectSettingsStore, DEFAULT_ENV};
use async_trait::async_trait;
use indexmap::IndexSet;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

/// Per-plugin records produced by provision, keyed by plugin id
pub type ResourceRecords = Map<String, Value>;

/// Deploys the infrastructure templates generated for the active plugins
///
/// Runs between provisioning and configuration. The returned map is merged into the
/// environment profile so `configure_resource` hooks can see deployment outputs.
#[async_trait]
pub trait TemplateDeployer: Send + Sync {
    async fn deploy(&self, ctx: &LifecycleContext) -> FxResult<Map<String, Value>>;
}

/// Shared provision state: filled by the main stage, read lazily by the post stage
struct ProvisionState {
    records: ResourceRecords,
    env: EnvInfo,
}

/// Lifecycle entry points for one project
#[derive(Clone)]
pub struct Solution {
    registry: Arc<PluginRegistry>,
    store: ProjectSettingsStore,
    deployer: Option<Arc<dyn TemplateDeployer>>,
    env_name: String,
}

impl fmt::Debug for Solution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Solution")
            .field("plugins", &self.registry.names())
            .field("project", &self.store.project_path())
            .field("deployer", &self.deployer.is_some())
            .field("env_name", &self.env_name)
            .finish()
    }
}

impl Solution {
    /// Solution over `registry` for the project managed by `store`
    pub fn new(registry: Arc<PluginRegistry>, store: ProjectSettingsStore) -> Self {
        Self {
            registry,
            store,
            deployer: None,
            env_name: DEFAULT_ENV.to_string(),
        }
    }

    /// Deploy templates between provisioning and configuration
    pub fn with_deployer(mut self, deployer: Arc<dyn TemplateDeployer>) -> Self {
        self.deployer = Some(deployer);
        self
    }

    /// Target environment
    pub fn with_env(mut self, env_name: impl Into<String>) -> Self {
        self.env_name = env_name.into();
        self
    }

    /// Plugin registry
    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    /// Settings store
    pub fn store(&self) -> &ProjectSettingsStore {
        &self.store
    }

    /// Load settings and environment state into a hook context
    pub fn context(&self, inputs: Inputs) -> FxResult<LifecycleContext> {
        let settings = self.store.load()?;
        let env = self.store.load_env(&self.env_name)?;
        Ok(LifecycleContext::new(settings, inputs, env))
    }

    fn active_plugins(&self, ctx: &LifecycleContext) -> FxResult<Vec<Arc<PluginDescriptor>>> {
        self.registry.select(ctx.settings.active_plugins())
    }

    /// Ask questions in order, then run every `scaffold` hook concurrently
    #[instrument(skip(self, inputs, pre))]
    pub async fn scaffold(&self, inputs: Inputs, pre: Vec<NamedTask<'static, ()>>) -> FxResult<()> {
        let ctx = self.context(inputs)?;
        let plugins = self.active_plugins(&ctx)?;

        execute_sequentially("pre", pre).await?;
        let tasks = phase_tasks(
            &plugins,
            &ctx,
            LifecyclePhase::Scaffold,
            PluginDescriptor::scaffold,
        );
        let outcome = execute_concurrently(LifecyclePhase::Scaffold.as_str(), tasks).await;
        match outcome.first_error() {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    /// Provision the active resources
    ///
    /// Runs `pre` questions, `provision_resource` hooks, template deployment and
    /// `configure_resource` hooks as one pipeline. Anything that fails after at least
    /// one resource was provisioned is a partial success carrying the records gathered
    /// so far. On full success the environment is marked provisioned.
    #[instrument(skip(self, inputs, pre))]
    pub async fn provision(
        &self,
        inputs: Inputs,
        pre: Vec<NamedTask<'static, ()>>,
    ) -> PhaseOutcome<ResourceRecords> {
        let ctx = match self.context(inputs) {
            Ok(ctx) => ctx,
            Err(e) => return PhaseOutcome::Failure(e),
        };
        let plugins = match self.active_plugins(&ctx) {
            Ok(plugins) => plugins,
            Err(e) => return PhaseOutcome::Failure(e),
        };

        info!("[solution] Starting provision of {} resource(s)", plugins.len());

        let state = Arc::new(Mutex::new(ProvisionState {
            records: Map::new(),
            env: (*ctx.env).clone(),
        }));

        let provision = phase_tasks(
            &plugins,
            &ctx,
            LifecyclePhase::Provision,
            PluginDescriptor::provision_resource,
        );
        let configure = self.configure_tasks(&plugins, &ctx, &state);

        let hook_state = Arc::clone(&state);
        let deployer = self.deployer.clone();
        let hook_ctx = ctx.clone();

        let result = LifecyclePipeline::<Value, Value>::new()
            .with_pre(pre)
            .with_main(provision)
            .on_main_finished(move |outcome| {
                let records: Vec<(String, Value)> = outcome
                    .successes()
                    .map(|(owner, record)| (owner.to_string(), record.clone()))
                    .collect();
                let first_error = outcome.first_error().cloned();
                async move {
                    let mut state = hook_state.lock().await;
                    for (owner, record) in records.iter().cloned() {
                        merge_record(&mut state.records, owner, record);
                    }
                    state.env.merge_records(records);
                    if let Some(error) = first_error {
                        return Err(error.with_stage(PipelineStage::Main.as_str()));
                    }
                    drop(state);
                    deploy_templates(deployer, hook_ctx, hook_state).await
                }
            })
            .with_post(configure)
            .execute()
            .await;

        let mut state = state.lock().await;
        match result {
            Ok(_) => {
                state.env.set_provisioned(true);
                if let Err(e) = self.store.save_env(&state.env) {
                    return PhaseOutcome::PartialSuccess {
                        output: state.records.clone(),
                        error: e,
                    };
                }
                info!("[solution] Provision finished");
                PhaseOutcome::Success(state.records.clone())
            }
            Err(error) if state.records.is_empty() => {
                warn!(error = %error, "[solution] Provision failed");
                PhaseOutcome::Failure(error)
            }
            Err(error) => {
                warn!(error = %error, "[solution] Provision partially succeeded");
                state.env.set_provisioned(false);
                if let Err(e) = self.store.save_env(&state.env) {
                    warn!(error = %e, "Failed to persist partial provision records");
                }
                PhaseOutcome::PartialSuccess {
                    output: state.records.clone(),
                    error,
                }
            }
        }
    }

    fn configure_tasks(
        &self,
        plugins: &[Arc<PluginDescriptor>],
        ctx: &LifecycleContext,
        state: &Arc<Mutex<ProvisionState>>,
    ) -> Vec<NamedTask<'static, Value>> {
        plugins
            .iter()
            .filter_map(|plugin| {
                let hook = Arc::clone(plugin.configure_resource()?);
                let ctx = ctx.clone();
                let state = Arc::clone(state);
                let owner = plugin.name().to_string();
                Some(NamedTask::new(
                    plugin.name(),
                    LifecyclePhase::Configure.capability().task_name(),
                    // Configuration sees the environment as left by provisioning.
                    // Records land in the shared state as each task finishes.
                    move || async move {
                        let env = state.lock().await.env.clone();
                        let record = hook(ctx.with_env(env)).await?;
                        let mut state = state.lock().await;
                        merge_record(&mut state.records, owner.clone(), record.clone());
                        state.env.merge_records([(owner, record.clone())]);
                        Ok::<_, FxError>(record)
                    },
                ))
            })
            .collect()
    }

    /// Run every `deploy` hook concurrently
    ///
    /// Refuses to run before a successful provision.
    #[instrument(skip(self, inputs))]
    pub async fn deploy(&self, inputs: Inputs) -> PhaseOutcome<Vec<String>> {
        let (ctx, plugins) = match self.provisioned_context(inputs, LifecyclePhase::Deploy) {
            Ok(found) => found,
            Err(e) => return PhaseOutcome::Failure(e),
        };
        let tasks = phase_tasks(&plugins, &ctx, LifecyclePhase::Deploy, PluginDescriptor::deploy);
        let outcome = execute_concurrently(LifecyclePhase::Deploy.as_str(), tasks).await;
        PhaseOutcome::from_aggregate(outcome, |records| {
            records.into_iter().map(|(name, _)| name).collect()
        })
    }

    /// Run every `publish` hook concurrently; anything short of full success is an error
    #[instrument(skip(self, inputs))]
    pub async fn publish(&self, inputs: Inputs) -> FxResult<()> {
        let (ctx, plugins) = self.provisioned_context(inputs, LifecyclePhase::Publish)?;
        let tasks = phase_tasks(
            &plugins,
            &ctx,
            LifecyclePhase::Publish,
            PluginDescriptor::publish,
        );
        let outcome = execute_concurrently(LifecyclePhase::Publish.as_str(), tasks).await;
        if let Some(error) = outcome.first_error() {
            warn!("[solution] Failed to publish {}", ctx.settings.app_name);
            return Err(error.clone());
        }
        Ok(())
    }

    fn provisioned_context(
        &self,
        inputs: Inputs,
        phase: LifecyclePhase,
    ) -> FxResult<(LifecycleContext, Vec<Arc<PluginDescriptor>>)> {
        let ctx = self.context(inputs)?;
        if phase.requires_provision() && !ctx.env.is_provisioned() {
            return Err(CoreError::CannotDeployBeforeProvision {
                app_name: ctx.settings.app_name.clone(),
            }
            .into());
        }
        let plugins = self.active_plugins(&ctx)?;
        Ok((ctx, plugins))
    }

    /// Add a resource (and everything it depends on) to the project
    ///
    /// Returns the new active plugin set. Settings are only written when every plugin
    /// step succeeded.
    #[instrument(skip(self, inputs), fields(resource = ?inputs.resource, module = ?inputs.module))]
    pub async fn add_resource(&self, inputs: Inputs) -> FxResult<IndexSet<String>> {
        let resource = inputs.resource.clone().ok_or_else(|| CoreError::InvalidInput {
            message: "inputs.resource undefined".to_string(),
        })?;

        let mut settings = self.store.load()?;
        if let Some(module_name) = inputs.module.as_deref() {
            if let Some(module) = settings.solution_settings.module_mut(module_name) {
                if module.hosting_plugin.as_deref() == Some(resource.as_str()) {
                    return Err(CoreError::ResourceAlreadyAdded { resource }.into());
                }
                module.hosting_plugin = Some(resource.clone());
            }
        }

        let env = self.store.load_env(&self.env_name)?;
        let ctx = LifecycleContext::new(settings.clone(), inputs, env);

        let requested: IndexSet<String> = std::iter::once(resource).collect();
        let added = DependencyResolver::new(&self.registry)
            .resolve(&ctx, &requested)
            .await?;
        let existing = settings.active_plugins().clone();
        let union = merge_active(&added, &existing);

        let tasks = wiring_tasks(&self.registry, &ctx, &union, &added, &existing)?;
        execute_sequentially("addResource", tasks).await?;

        settings.solution_settings.active_resource_plugins = union.clone();
        self.store.save(&settings)?;
        info!(
            "[solution] Active resources: {}",
            union.iter().cloned().collect::<Vec<_>>().join(", ")
        );
        Ok(union)
    }
}

async fn deploy_templates(
    deployer: Option<Arc<dyn TemplateDeployer>>,
    ctx: LifecycleContext,
    state: Arc<Mutex<ProvisionState>>,
) -> FxResult<()> {
    let Some(deployer) = deployer else {
        return Ok(());
    };

    let env = state.lock().await.env.clone();
    let ctx = ctx.with_env(env);
    let outputs = NamedTask::new(SOLUTION_SOURCE, "deployArmTemplates", move || async move {
        deployer.deploy(&ctx).await
    })
    .run()
    .await
    .result?;

    state.lock().await.env.merge_records(outputs);
    Ok(())
}
