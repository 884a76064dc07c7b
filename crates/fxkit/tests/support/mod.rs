//! Shared helpers for CLI integration tests.
#![allow(dead_code)]

use assert_cmd::Command;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A scratch area with its own lock root, so tests never share lock state
pub struct Sandbox {
    pub dir: TempDir,
}

impl Sandbox {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    pub fn lock_root(&self) -> PathBuf {
        self.dir.path().join("locks")
    }

    pub fn project(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// `fxkit` with a hermetic lock root and quiet logs
    pub fn fxkit(&self) -> Command {
        let mut cmd = Command::cargo_bin("fxkit").unwrap();
        cmd.env("FXKIT_LOCK_DIR", self.lock_root())
            .env_remove("FXKIT_IGNORE_LOCK")
            .env_remove("FXKIT_LOG")
            .env_remove("RUST_LOG")
            .arg("--log-level")
            .arg("warn");
        cmd
    }

    /// `fxkit` pointed at an existing project
    pub fn fxkit_in(&self, project: &Path) -> Command {
        let mut cmd = self.fxkit();
        cmd.arg("--project-path").arg(project);
        cmd
    }

    /// Create a project through the CLI and return its path
    pub fn new_project(&self, name: &str, modules: &[&str]) -> PathBuf {
        let mut cmd = self.fxkit();
        cmd.arg("--project-path").arg(self.dir.path()).arg("new").arg(name);
        for module in modules {
            cmd.arg("--module").arg(module);
        }
        cmd.assert().success();
        self.project(name)
    }
}
