//! Project-level mutual exclusion
//!
//! Two invocations against the same project must not run lifecycle operations at the
//! same time. The lock lives outside the project tree, at
//! `<lock root>/fxkit-<base64(project path)>/.fx.lock`, so equal project paths
//! contend and different paths never do. The lock file is held with an exclusive OS
//! file lock; the operating system drops it when the holder exits, so a crashed
//! invocation never leaves a stale lock behind.
//!
//! The lock file and its directory are never deleted: every contender must lock the
//! same inode.
//!
//! Bypass: `ignore_lock` in the inputs or configuration, or a static (non-interactive)
//! platform, skips locking and every precondition check.

use crate::context::Inputs;
use crate::errors::{CoreError, FxError, FxResult};
use crate::settings::{CoreConfig, CONFIG_FOLDER, PRODUCT_NAME};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use fs2::FileExt;
use std::fmt;
use std::fs::{File, OpenOptions};
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Receives lock lifecycle notifications
///
/// Observers are called synchronously on the acquiring task. Both methods default to
/// no-ops.
pub trait LockObserver: Send + Sync {
    /// The lock for `project_path` was acquired
    fn on_locked(&self, _project_path: &Path) {}

    /// The lock for `project_path` was released
    fn on_unlocked(&self, _project_path: &Path) {}
}

/// Factory for project lock handles
#[derive(Clone)]
pub struct ProjectLock {
    root: PathBuf,
    bypass: bool,
    observers: Vec<Arc<dyn LockObserver>>,
}

impl fmt::Debug for ProjectLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProjectLock")
            .field("root", &self.root)
            .field("bypass", &self.bypass)
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl ProjectLock {
    /// Lock factory configured from runtime configuration
    pub fn new(config: &CoreConfig) -> Self {
        Self {
            root: config.lock_root(),
            bypass: config.ignore_lock,
            observers: Vec::new(),
        }
    }

    /// Override the lock root directory
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    /// Register an observer
    pub fn with_observer(mut self, observer: Arc<dyn LockObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Directory holding the lock of one project
    pub fn lock_dir_for(&self, project_path: &Path) -> PathBuf {
        let encoded = URL_SAFE_NO_PAD.encode(project_path.to_string_lossy().as_bytes());
        self.root.join(format!("{}-{}", PRODUCT_NAME, encoded))
    }

    /// The lock file of one project
    pub fn lock_path_for(&self, project_path: &Path) -> PathBuf {
        self.lock_dir_for(project_path)
            .join(format!("{}.lock", CONFIG_FOLDER))
    }

    /// Whether an invocation with these inputs skips locking
    pub fn bypasses(&self, inputs: &Inputs) -> bool {
        self.bypass || inputs.ignore_lock || inputs.platform.is_static()
    }

    /// Check the project preconditions and take the lock
    ///
    /// Fails with `NoProjectOpened`, `PathNotExist` or `InvalidProject` before touching
    /// the lock, and with `ConcurrentOperation` when another holder is alive.
    #[instrument(skip(self, inputs), fields(project = ?inputs.project_path))]
    pub fn acquire(&self, inputs: &Inputs) -> FxResult<LockHandle> {
        let project_path = check_project(inputs)?;
        let lock_dir = self.lock_dir_for(&project_path);
        let lock_path = self.lock_path_for(&project_path);

        std::fs::create_dir_all(&lock_dir).map_err(|e| lock_io(&lock_dir, e))?;
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(|e| lock_io(&lock_path, e))?;

        if let Err(e) = file.try_lock_exclusive() {
            if is_contended(&e) {
                return Err(contended(&project_path));
            }
            return Err(lock_io(&lock_path, e).into());
        }

        debug!("[core] success to acquire lock on: {}", project_path.display());
        for observer in &self.observers {
            observer.on_locked(&project_path);
        }

        Ok(LockHandle {
            project_path,
            file,
            observers: self.observers.clone(),
            released: false,
        })
    }

    /// Run `operation` while holding the project lock
    ///
    /// The lock is released on every exit path: success, error and panic unwinding
    /// through the handle. When contended, `operation` is never called.
    pub async fn run<T, F, Fut>(&self, inputs: &Inputs, operation: F) -> FxResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = FxResult<T>>,
    {
        if self.bypasses(inputs) {
            debug!(platform = inputs.platform.as_str(), "Skipping project lock");
            return operation().await;
        }

        let handle = self.acquire(inputs)?;
        let result = operation().await;
        handle.release();
        result
    }
}

/// Exclusive possession of one project's lock
///
/// Dropping the handle releases the lock.
#[derive(Debug)]
#[must_use = "the lock is released as soon as the handle is dropped"]
pub struct LockHandle {
    project_path: PathBuf,
    file: File,
    observers: Vec<Arc<dyn LockObserver>>,
    released: bool,
}

impl fmt::Debug for dyn LockObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("LockObserver")
    }
}

impl LockHandle {
    /// Locked project
    pub fn project_path(&self) -> &Path {
        &self.project_path
    }

    /// Release the lock now
    pub fn release(mut self) {
        self.release_inner();
    }

    fn release_inner(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        if let Err(e) = FileExt::unlock(&self.file) {
            warn!("Failed to unlock {}: {}", self.project_path.display(), e);
        }

        for observer in &self.observers {
            observer.on_unlocked(&self.project_path);
        }
        debug!("[core] lock released on {}", self.project_path.display());
    }
}

impl Drop for LockHandle {
    fn drop(&mut self) {
        self.release_inner();
    }
}

fn check_project(inputs: &Inputs) -> FxResult<PathBuf> {
    let project_path = inputs.project_path().ok_or(CoreError::NoProjectOpened)?;
    if !project_path.exists() {
        return Err(CoreError::PathNotExist {
            path: project_path.display().to_string(),
        }
        .into());
    }
    if !project_path.join(CONFIG_FOLDER).is_dir() {
        return Err(CoreError::InvalidProject {
            path: project_path.display().to_string(),
        }
        .into());
    }
    Ok(std::fs::canonicalize(project_path).unwrap_or_else(|_| project_path.to_path_buf()))
}

/// Whether a failed `try_lock_exclusive` means another holder has the lock
fn is_contended(e: &io::Error) -> bool {
    e.kind() == io::ErrorKind::WouldBlock
        || e.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

fn contended(project_path: &Path) -> FxError {
    warn!("[core] failed to acquire lock on: {}", project_path.display());
    CoreError::ConcurrentOperation.into()
}

fn lock_io(path: &Path, e: io::Error) -> CoreError {
    CoreError::LockIo {
        path: path.display().to_string(),
        message: e.to_string(),
    }
}
