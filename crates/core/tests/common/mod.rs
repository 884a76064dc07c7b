//! Shared test helpers for core integration tests.
#![allow(dead_code)]

use fxkit_core::lock::{LockObserver, ProjectLock};
use fxkit_core::settings::{CoreConfig, ProjectSettingsStore};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::TempDir;

/// A project directory with a `.fx` marker and default settings
pub struct TestProject {
    pub dir: TempDir,
    pub path: PathBuf,
    pub store: ProjectSettingsStore,
}

impl TestProject {
    pub fn new(app_name: &str) -> Self {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(app_name);
        let store = ProjectSettingsStore::new(&path);
        store.init_project(app_name).unwrap();
        Self { dir, path, store }
    }

    /// Lock factory rooted inside the test directory
    pub fn lock(&self) -> ProjectLock {
        ProjectLock::new(&CoreConfig::default()).with_root(self.dir.path().join("locks"))
    }

    pub fn activate(&self, plugins: &[&str]) {
        let mut settings = self.store.load().unwrap();
        settings.solution_settings.active_resource_plugins =
            plugins.iter().map(|p| p.to_string()).collect();
        self.store.save(&settings).unwrap();
    }
}

/// Observer recording every notification it receives
#[derive(Default)]
pub struct RecordingObserver {
    pub events: Mutex<Vec<String>>,
}

impl RecordingObserver {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

impl LockObserver for RecordingObserver {
    fn on_locked(&self, project_path: &Path) {
        self.events
            .lock()
            .unwrap()
            .push(format!("locked:{}", project_path.file_name().unwrap().to_string_lossy()));
    }

    fn on_unlocked(&self, project_path: &Path) {
        self.events
            .lock()
            .unwrap()
            .push(format!("unlocked:{}", project_path.file_name().unwrap().to_string_lossy()));
    }
}
