//! End-to-end lifecycle runs over the built-in local plugins

mod support;

use fxkit_core::settings::ProjectSettingsStore;
use predicates::prelude::*;
use support::Sandbox;

#[test]
fn test_deploy_before_provision_fails() {
    let sandbox = Sandbox::new();
    let project = sandbox.new_project("demo", &[]);

    sandbox
        .fxkit_in(&project)
        .arg("deploy")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("CannotDeployBeforeProvision"));
    sandbox
        .fxkit_in(&project)
        .arg("publish")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("CannotDeployBeforeProvision"));
}

#[test]
fn test_full_lifecycle() {
    let sandbox = Sandbox::new();
    let project = sandbox.new_project("My App", &["tab", "bot"]);

    for (resource, module) in [
        ("fx-resource-azure-storage", "tab"),
        ("fx-resource-azure-bot", "bot"),
    ] {
        sandbox
            .fxkit_in(&project)
            .arg("add-resource")
            .arg(resource)
            .arg("--module")
            .arg(module)
            .assert()
            .success();
    }

    let output = sandbox
        .fxkit_in(&project)
        .arg("provision")
        .assert()
        .success();
    let stdout = String::from_utf8_lossy(&output.get_output().stdout);
    let records: serde_json::Value = serde_json::from_str(&stdout).expect("valid JSON");
    assert_eq!(
        records["fx-resource-azure-web-app"]["endpoint"],
        "https://myappdevweb.azurewebsites.net"
    );
    assert!(records["fx-resource-azure-storage"]["domain"].is_string());
    assert!(records["fx-resource-azure-bot"]["siteName"].is_string());

    let env = ProjectSettingsStore::new(&project).load_env("dev").unwrap();
    assert!(env.is_provisioned());

    sandbox
        .fxkit_in(&project)
        .arg("deploy")
        .assert()
        .success()
        .stdout(predicate::str::contains("fx-resource-azure-storage"))
        .stdout(predicate::str::contains("fx-resource-azure-bot"))
        .stdout(predicate::str::contains("fx-resource-azure-web-app").not());

    sandbox.fxkit_in(&project).arg("publish").assert().success();
}

#[test]
fn test_environments_are_independent() {
    let sandbox = Sandbox::new();
    let project = sandbox.new_project("demo", &[]);
    sandbox
        .fxkit_in(&project)
        .arg("add-resource")
        .arg("fx-resource-azure-storage")
        .assert()
        .success();

    sandbox
        .fxkit_in(&project)
        .arg("--env")
        .arg("staging")
        .arg("provision")
        .assert()
        .success();

    sandbox
        .fxkit_in(&project)
        .arg("--env")
        .arg("staging")
        .arg("deploy")
        .assert()
        .success();
    sandbox
        .fxkit_in(&project)
        .arg("deploy")
        .assert()
        .code(1);
}
