//! Integration tests for the solution entry points
//!
//! Exercises add-resource, provision, deploy and publish end to end against the
//! built-in local plugins plus a few purpose-built failing plugins.

mod common;

use async_trait::async_trait;
use common::TestProject;
use fxkit_core::builtin::{
    local_plugins, local_registry, templates_dir, LocalTemplateDeployer, BOT_PLUGIN,
    STORAGE_PLUGIN, WEB_APP_PLUGIN,
};
use fxkit_core::context::{Inputs, LifecycleContext};
use fxkit_core::errors::{FxError, FxResult};
use fxkit_core::executor::{NamedTask, OutcomeStatus};
use fxkit_core::lifecycle::PhaseOutcome;
use fxkit_core::plugins::{PluginDescriptor, PluginRegistry};
use fxkit_core::settings::ModuleSettings;
use fxkit_core::solution::{Solution, TemplateDeployer};
use serde_json::{json, Map, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn local_solution(project: &TestProject) -> Solution {
    Solution::new(Arc::new(local_registry()), project.store.clone())
}

fn inputs(project: &TestProject) -> Inputs {
    Inputs::for_project(&project.path)
}

fn failing_provision(name: &str) -> PluginDescriptor {
    let owner = name.to_string();
    PluginDescriptor::new(name).with_provision_resource(move |_| {
        let owner = owner.clone();
        async move { Err(FxError::system(owner, "QuotaExceeded", "quota exceeded")) }
    })
}

struct FailingDeployer;

#[async_trait]
impl TemplateDeployer for FailingDeployer {
    async fn deploy(&self, _ctx: &LifecycleContext) -> FxResult<Map<String, Value>> {
        Err(FxError::system("solution", "ArmDeploymentFailed", "deployment failed"))
    }
}

#[tokio::test]
async fn test_add_resource_pulls_in_dependencies() {
    let project = TestProject::new("app");
    let solution = local_solution(&project);

    let active = solution
        .add_resource(inputs(&project).with_resource(BOT_PLUGIN))
        .await
        .unwrap();

    assert_eq!(
        active.iter().collect::<Vec<_>>(),
        vec![BOT_PLUGIN, WEB_APP_PLUGIN]
    );
    let saved = project.store.load().unwrap();
    assert_eq!(saved.active_plugins(), &active);

    let templates = templates_dir(&project.path);
    assert!(templates.join("AzureBot.bicep").is_file());
    assert!(templates.join("AzureWebApp.bicep").is_file());
    assert!(!templates.join("AzureStorage.bicep").exists());
}

#[tokio::test]
async fn test_add_resource_puts_new_plugins_first() {
    let project = TestProject::new("app");
    project.activate(&[STORAGE_PLUGIN]);
    let solution = local_solution(&project);

    let active = solution
        .add_resource(inputs(&project).with_resource(BOT_PLUGIN))
        .await
        .unwrap();
    assert_eq!(
        active.iter().collect::<Vec<_>>(),
        vec![BOT_PLUGIN, WEB_APP_PLUGIN, STORAGE_PLUGIN]
    );
}

#[tokio::test]
async fn test_add_resource_generates_only_for_new_plugins() {
    let project = TestProject::new("app");
    project.activate(&["existing"]);

    let generated = Arc::new(AtomicUsize::new(0));
    let updated = Arc::new(AtomicUsize::new(0));
    let plugin = |name: &str| {
        let generated = Arc::clone(&generated);
        let updated = Arc::clone(&updated);
        PluginDescriptor::new(name)
            .with_generate_resource_template(move |_| {
                generated.fetch_add(1, Ordering::SeqCst);
                async {
                    Ok(fxkit_core::plugins::ResourceTemplate {
                        kind: "bicep".to_string(),
                        template: json!({}),
                    })
                }
            })
            .with_update_resource_template(move |_| {
                updated.fetch_add(1, Ordering::SeqCst);
                async {
                    Ok(fxkit_core::plugins::ResourceTemplate {
                        kind: "bicep".to_string(),
                        template: json!({}),
                    })
                }
            })
    };
    let registry = PluginRegistry::new()
        .with_plugin(plugin("existing"))
        .with_plugin(plugin("new"));
    let solution = Solution::new(Arc::new(registry), project.store.clone());

    solution
        .add_resource(inputs(&project).with_resource("new"))
        .await
        .unwrap();

    assert_eq!(generated.load(Ordering::SeqCst), 1);
    assert_eq!(updated.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_add_resource_requires_resource() {
    let project = TestProject::new("app");
    let error = local_solution(&project)
        .add_resource(inputs(&project))
        .await
        .unwrap_err();
    assert_eq!(error.name, "InvalidInput");
    assert!(error.is_user_error());
}

#[tokio::test]
async fn test_add_resource_rejects_module_already_hosting_it() {
    let project = TestProject::new("app");
    let mut settings = project.store.load().unwrap();
    settings.solution_settings.modules.push(ModuleSettings {
        name: "tab".to_string(),
        hosting_plugin: Some(STORAGE_PLUGIN.to_string()),
    });
    project.store.save(&settings).unwrap();

    let error = local_solution(&project)
        .add_resource(inputs(&project).with_resource(STORAGE_PLUGIN).with_module("tab"))
        .await
        .unwrap_err();
    assert_eq!(error.name, "ResourceAlreadyAdded");
    assert!(project.store.load().unwrap().active_plugins().is_empty());
}

#[tokio::test]
async fn test_add_resource_sets_module_hosting_plugin() {
    let project = TestProject::new("app");
    let mut settings = project.store.load().unwrap();
    settings.solution_settings.modules.push(ModuleSettings {
        name: "bot".to_string(),
        hosting_plugin: None,
    });
    project.store.save(&settings).unwrap();

    local_solution(&project)
        .add_resource(inputs(&project).with_resource(BOT_PLUGIN).with_module("bot"))
        .await
        .unwrap();

    let saved = project.store.load().unwrap();
    assert_eq!(
        saved.solution_settings.modules[0].hosting_plugin.as_deref(),
        Some(BOT_PLUGIN)
    );
}

#[tokio::test]
async fn test_add_unknown_resource_commits_nothing() {
    let project = TestProject::new("app");
    let error = local_solution(&project)
        .add_resource(inputs(&project).with_resource("fx-resource-unknown"))
        .await
        .unwrap_err();
    assert_eq!(error.name, "PluginNotFound");
    assert!(project.store.load().unwrap().active_plugins().is_empty());
}

#[tokio::test]
async fn test_provision_success_marks_environment() {
    let project = TestProject::new("app");
    project.activate(&[BOT_PLUGIN, WEB_APP_PLUGIN]);
    let solution = local_solution(&project).with_deployer(Arc::new(LocalTemplateDeployer));

    let outcome = solution.provision(inputs(&project), Vec::new()).await;
    let records = outcome.into_result().unwrap();
    assert!(records.contains_key(BOT_PLUGIN));
    assert!(records.contains_key(WEB_APP_PLUGIN));

    let env = project.store.load_env("dev").unwrap();
    assert!(env.is_provisioned());
    assert_eq!(env.profile[BOT_PLUGIN]["skuName"], json!("F1"));
    assert!(env.profile["solution"]["deployedTemplates"].is_array());
}

#[tokio::test]
async fn test_provision_partial_success_keeps_records() {
    let project = TestProject::new("app");
    project.activate(&[WEB_APP_PLUGIN, "fx-resource-broken"]);
    let registry = local_plugins()
        .into_iter()
        .fold(PluginRegistry::new(), PluginRegistry::with_plugin)
        .with_plugin(failing_provision("fx-resource-broken"));
    let solution = Solution::new(Arc::new(registry), project.store.clone());

    match solution.provision(inputs(&project), Vec::new()).await {
        PhaseOutcome::PartialSuccess { output, error } => {
            assert!(output.contains_key(WEB_APP_PLUGIN));
            assert!(!output.contains_key("fx-resource-broken"));
            assert_eq!(error.name, "QuotaExceeded");
        }
        other => panic!("expected partial success, got {:?}", other),
    }
    assert!(!project.store.load_env("dev").unwrap().is_provisioned());
}

#[tokio::test]
async fn test_provision_total_failure() {
    let project = TestProject::new("app");
    project.activate(&["fx-resource-broken"]);
    let registry = PluginRegistry::new().with_plugin(failing_provision("fx-resource-broken"));
    let solution = Solution::new(Arc::new(registry), project.store.clone());

    let outcome = solution.provision(inputs(&project), Vec::new()).await;
    assert_eq!(outcome.status(), OutcomeStatus::Failure);
}

#[tokio::test]
async fn test_template_deployment_failure_is_partial_success() {
    let project = TestProject::new("app");
    project.activate(&[WEB_APP_PLUGIN]);
    let configured = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&configured);
    let registry = PluginRegistry::new().with_plugin(
        local_plugins()
            .into_iter()
            .find(|p| p.name() == WEB_APP_PLUGIN)
            .unwrap()
            .with_configure_resource(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Ok(json!({})) }
            }),
    );
    let solution =
        Solution::new(Arc::new(registry), project.store.clone()).with_deployer(Arc::new(FailingDeployer));

    let outcome = solution.provision(inputs(&project), Vec::new()).await;
    assert_eq!(outcome.status(), OutcomeStatus::PartialSuccess);
    assert_eq!(outcome.error().unwrap().name, "ArmDeploymentFailed");
    assert_eq!(configured.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_configure_sees_provision_records() {
    let project = TestProject::new("app");
    project.activate(&[WEB_APP_PLUGIN]);
    let registry = PluginRegistry::new().with_plugin(
        local_plugins()
            .into_iter()
            .find(|p| p.name() == WEB_APP_PLUGIN)
            .unwrap()
            .with_configure_resource(|ctx| async move {
                let endpoint = ctx
                    .plugin_profile(WEB_APP_PLUGIN)
                    .and_then(|p| p.get("endpoint"))
                    .cloned()
                    .unwrap_or(Value::Null);
                Ok(json!({ "configuredEndpoint": endpoint }))
            }),
    );
    let solution = Solution::new(Arc::new(registry), project.store.clone());

    let records = solution
        .provision(inputs(&project), Vec::new())
        .await
        .into_result()
        .unwrap();
    let web = &records[WEB_APP_PLUGIN];
    assert_eq!(web["configuredEndpoint"], web["endpoint"]);
}

#[tokio::test]
async fn test_configure_partial_success_keeps_configured_records() {
    let project = TestProject::new("app");
    project.activate(&[WEB_APP_PLUGIN, "fx-resource-misconfigured"]);
    let registry = PluginRegistry::new()
        .with_plugin(
            local_plugins()
                .into_iter()
                .find(|p| p.name() == WEB_APP_PLUGIN)
                .unwrap()
                .with_configure_resource(|_| async { Ok(json!({ "appSettings": "applied" })) }),
        )
        .with_plugin(
            PluginDescriptor::new("fx-resource-misconfigured")
                .with_provision_resource(|_| async { Ok(json!({ "name": "misconfigured" })) })
                .with_configure_resource(|_| async {
                    Err(FxError::system(
                        "fx-resource-misconfigured",
                        "ConfigureFailed",
                        "configure failed",
                    ))
                }),
        );
    let solution = Solution::new(Arc::new(registry), project.store.clone());

    match solution.provision(inputs(&project), Vec::new()).await {
        PhaseOutcome::PartialSuccess { output, error } => {
            assert_eq!(error.name, "ConfigureFailed");
            assert_eq!(output[WEB_APP_PLUGIN]["appSettings"], json!("applied"));
            assert!(output[WEB_APP_PLUGIN]["endpoint"].is_string());
            assert_eq!(output["fx-resource-misconfigured"]["name"], json!("misconfigured"));
        }
        other => panic!("expected partial success, got {:?}", other),
    }

    let env = project.store.load_env("dev").unwrap();
    assert!(!env.is_provisioned());
    assert_eq!(env.profile[WEB_APP_PLUGIN]["appSettings"], json!("applied"));
}

#[tokio::test]
async fn test_provision_pre_question_failure_runs_nothing() {
    let project = TestProject::new("app");
    project.activate(&[WEB_APP_PLUGIN]);
    let solution = local_solution(&project);
    let pre = vec![NamedTask::new("solution", "askQuestions", || async {
        Err(FxError::user("solution", "UserCancel", "cancelled"))
    })];

    let outcome = solution.provision(inputs(&project), pre).await;
    match outcome {
        PhaseOutcome::Failure(error) => assert_eq!(error.name, "UserCancel"),
        other => panic!("expected failure, got {:?}", other),
    }
    assert!(project.store.load_env("dev").unwrap().profile.is_empty());
}

#[tokio::test]
async fn test_deploy_and_publish_require_provision() {
    let project = TestProject::new("app");
    project.activate(&[STORAGE_PLUGIN]);
    let solution = local_solution(&project);

    let outcome = solution.deploy(inputs(&project)).await;
    assert_eq!(
        outcome.error().unwrap().name,
        "CannotDeployBeforeProvision"
    );
    let error = solution.publish(inputs(&project)).await.unwrap_err();
    assert_eq!(error.name, "CannotDeployBeforeProvision");
}

#[tokio::test]
async fn test_deploy_after_provision() {
    let project = TestProject::new("app");
    project.activate(&[STORAGE_PLUGIN, WEB_APP_PLUGIN]);
    let solution = local_solution(&project);

    assert!(solution.provision(inputs(&project), Vec::new()).await.is_success());
    let outcome = solution.deploy(inputs(&project)).await;

    // Web app has no deploy hook and is skipped
    assert_eq!(outcome, PhaseOutcome::Success(vec![STORAGE_PLUGIN.to_string()]));
}

#[tokio::test]
async fn test_publish_partial_is_error() {
    let project = TestProject::new("app");
    project.activate(&["ok", "bad"]);
    let registry = PluginRegistry::new()
        .with_plugin(PluginDescriptor::new("ok").with_publish(|_| async { Ok(()) }))
        .with_plugin(PluginDescriptor::new("bad").with_publish(|_| async {
            Err(FxError::user("bad", "PublishRejected", "rejected"))
        }));
    let solution = Solution::new(Arc::new(registry), project.store.clone());

    let mut env = project.store.load_env("dev").unwrap();
    env.set_provisioned(true);
    project.store.save_env(&env).unwrap();

    let error = solution.publish(inputs(&project)).await.unwrap_err();
    assert_eq!(error.name, "PublishRejected");
}

#[tokio::test]
async fn test_scaffold_runs_hooks() {
    let project = TestProject::new("app");
    project.activate(&["a", "b"]);
    let calls = Arc::new(AtomicUsize::new(0));
    let plugin = |name: &str| {
        let calls = Arc::clone(&calls);
        PluginDescriptor::new(name).with_scaffold(move |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(()) }
        })
    };
    let registry = PluginRegistry::new()
        .with_plugin(plugin("a"))
        .with_plugin(plugin("b"));
    let solution = Solution::new(Arc::new(registry), project.store.clone());

    solution.scaffold(inputs(&project), Vec::new()).await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}
