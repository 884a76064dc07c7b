//! Integration tests for resource dependency resolution

use fxkit_core::builtin::{local_registry, BOT_PLUGIN, STORAGE_PLUGIN, WEB_APP_PLUGIN};
use fxkit_core::context::{Inputs, LifecycleContext};
use fxkit_core::dependencies::DependencyResolver;
use fxkit_core::plugins::{PluginDescriptor, PluginRegistry};
use fxkit_core::settings::{EnvInfo, ProjectSettings};
use fxkit_core::IndexSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn ctx() -> LifecycleContext {
    LifecycleContext::new(ProjectSettings::new("app"), Inputs::default(), EnvInfo::new("dev"))
}

fn set(ids: &[&str]) -> IndexSet<String> {
    ids.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn test_local_bot_requires_web_app() {
    let registry = local_registry();
    let resolved = DependencyResolver::new(&registry)
        .resolve(&ctx(), &set(&[BOT_PLUGIN]))
        .await
        .unwrap();
    assert_eq!(resolved, set(&[BOT_PLUGIN, WEB_APP_PLUGIN]));
}

#[tokio::test]
async fn test_resolution_is_idempotent() {
    let registry = local_registry();
    let resolver = DependencyResolver::new(&registry);
    let requested = set(&[STORAGE_PLUGIN, BOT_PLUGIN]);

    let once = resolver.resolve(&ctx(), &requested).await.unwrap();
    let twice = resolver.resolve(&ctx(), &once).await.unwrap();
    assert_eq!(once, twice);
    assert_eq!(
        twice.iter().collect::<Vec<_>>(),
        vec![STORAGE_PLUGIN, BOT_PLUGIN, WEB_APP_PLUGIN]
    );
}

#[tokio::test]
async fn test_diamond_is_resolved_once() {
    let queries = Arc::new(AtomicUsize::new(0));
    let plugin = |name: &str, deps: &'static [&'static str]| {
        let queries = Arc::clone(&queries);
        PluginDescriptor::new(name).with_plugin_dependencies(move |_| {
            queries.fetch_add(1, Ordering::SeqCst);
            async move { Ok(deps.iter().map(|d| d.to_string()).collect()) }
        })
    };
    let registry = PluginRegistry::new()
        .with_plugin(plugin("top", &["left", "right"]))
        .with_plugin(plugin("left", &["base"]))
        .with_plugin(plugin("right", &["base"]))
        .with_plugin(plugin("base", &[]));

    let resolved = DependencyResolver::new(&registry)
        .resolve(&ctx(), &set(&["top"]))
        .await
        .unwrap();

    assert_eq!(resolved, set(&["top", "left", "right", "base"]));
    // One pass per growth step plus the final quiet pass
    assert!(queries.load(Ordering::SeqCst) >= resolved.len());
}

#[tokio::test]
async fn test_panicking_dependency_query_is_unknown_error() {
    let registry = PluginRegistry::new().with_plugin(
        PluginDescriptor::new("fragile").with_plugin_dependencies(|_| async {
            let explode = true;
            if explode {
                panic!("dependency table missing");
            }
            Ok(Vec::new())
        }),
    );

    let error = DependencyResolver::new(&registry)
        .resolve(&ctx(), &set(&["fragile"]))
        .await
        .unwrap_err();
    assert_eq!(error.name, "UnknownError");
    assert!(error.message.contains("dependency table missing"));
}
