use super::discovery;
use super::storage_size::dir_size_bytes;
use super::validate::{normalize, WorkspaceId};
use crate::engine::{Engine, EngineFactory};
use crate::error::{GraphspaceError, Result};
use dashmap::DashMap;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

type InitLock = Arc<tokio::sync::Mutex<()>>;

/// Multi-tenant engine manager.
///
/// `WorkspaceManager` owns one engine per workspace, constructed lazily on the
/// first [`get_instance`](Self::get_instance) for that workspace and kept until
/// [`close_instance`](Self::close_instance) or [`close_all`](Self::close_all).
/// Each workspace stores its data in `{storage_root}/{workspace}/`.
///
/// Construction uses two lock tiers. A process-wide mutex guards only the map
/// of per-workspace init locks and is never held across an `.await`. The
/// per-workspace async mutex is held while the factory builds the engine, so
/// concurrent first calls for one workspace construct exactly once, and
/// different workspaces construct in parallel.
///
/// Create one with [`WorkspaceManager::new`], which returns `Arc<Self>`.
///
/// # Examples
///
/// ```rust,no_run
/// use graphspace::engine::Engine;
/// use graphspace::{GraphConfig, KnowledgeGraphFactory, WorkspaceManager};
///
/// # async fn run() -> graphspace::Result<()> {
/// let manager = WorkspaceManager::new("./data", KnowledgeGraphFactory, GraphConfig::default());
/// let erp = manager.get_instance(Some("erp")).await?;
/// assert_eq!(erp.workspace().as_str(), "erp");
/// manager.close_all().await;
/// # Ok(())
/// # }
/// ```
pub struct WorkspaceManager<F: EngineFactory> {
    storage_root: PathBuf,
    factory: F,
    base_config: F::Config,
    instances: DashMap<WorkspaceId, Arc<F::Engine>>,
    /// Per-workspace init locks. Entries are never removed: dropping a lock
    /// while another caller is about to acquire it would let two callers
    /// construct the same workspace.
    init_locks: Mutex<HashMap<WorkspaceId, InitLock>>,
}

/// Outcome of [`WorkspaceManager::close_all`].
#[derive(Debug, Default)]
pub struct CloseAllReport {
    pub closed: Vec<WorkspaceId>,
    /// Workspaces whose engine failed to finalize. They are removed from the
    /// registry all the same.
    pub failed: Vec<(WorkspaceId, GraphspaceError)>,
}

impl CloseAllReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

impl<F: EngineFactory> WorkspaceManager<F> {
    /// Create a manager rooted at `storage_root`.
    ///
    /// The directory is not created here; the factory creates workspace
    /// directories on first construction.
    pub fn new<P: AsRef<Path>>(storage_root: P, factory: F, base_config: F::Config) -> Arc<Self> {
        Arc::new(WorkspaceManager {
            storage_root: storage_root.as_ref().to_path_buf(),
            factory,
            base_config,
            instances: DashMap::new(),
            init_locks: Mutex::new(HashMap::new()),
        })
    }

    pub fn storage_root(&self) -> &Path {
        &self.storage_root
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }

    pub fn base_config(&self) -> &F::Config {
        &self.base_config
    }

    /// Directory holding `workspace`'s persisted data.
    pub fn workspace_path(&self, workspace: &WorkspaceId) -> PathBuf {
        self.storage_root.join(workspace)
    }

    /// Get the engine for a workspace, constructing it on first access.
    ///
    /// `None` or a blank name selects the `default` workspace.
    ///
    /// # Errors
    ///
    /// [`GraphspaceError::InvalidWorkspace`] if the name fails validation, or
    /// whatever the factory returned if construction failed. A failed
    /// construction is not cached; the next call tries again.
    pub async fn get_instance(&self, workspace: Option<&str>) -> Result<Arc<F::Engine>> {
        let workspace = normalize(workspace)?;
        self.get_or_construct(&workspace).await
    }

    /// Same as [`get_instance`](Self::get_instance) for an already validated id.
    pub async fn get_or_construct(&self, workspace: &WorkspaceId) -> Result<Arc<F::Engine>> {
        if let Some(engine) = self.loaded(workspace) {
            return Ok(engine);
        }

        let lock = self.init_lock(workspace);
        let _guard = lock.lock().await;

        // A racing caller may have finished construction while we waited.
        if let Some(engine) = self.loaded(workspace) {
            return Ok(engine);
        }

        tracing::info!("Creating engine for workspace: {}", workspace);
        let started = Instant::now();
        let engine = match self
            .factory
            .construct(workspace, &self.base_config, &self.storage_root)
            .await
        {
            Ok(engine) => Arc::new(engine),
            Err(e) => {
                tracing::error!("Engine construction failed for workspace {}: {}", workspace, e);
                return Err(e);
            }
        };
        self.instances
            .insert(workspace.clone(), Arc::clone(&engine));
        tracing::info!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Engine created for workspace: {}",
            workspace
        );
        Ok(engine)
    }

    /// Return the engine for `workspace` only if it is already constructed.
    pub fn loaded(&self, workspace: &str) -> Option<Arc<F::Engine>> {
        self.instances
            .get(workspace)
            .map(|engine| Arc::clone(&engine))
    }

    fn init_lock(&self, workspace: &WorkspaceId) -> InitLock {
        let mut locks = self
            .init_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let lock = locks.entry(workspace.clone()).or_insert_with(|| {
            tracing::debug!("Created init lock for workspace: {}", workspace);
            Arc::new(tokio::sync::Mutex::new(()))
        });
        Arc::clone(lock)
    }

    /// Close one workspace's engine.
    ///
    /// Returns `Ok(false)` if the workspace was not loaded. Otherwise the
    /// engine is removed from the registry and finalized; a finalize error is
    /// logged and the call still returns `Ok(true)`, so the next
    /// [`get_instance`](Self::get_instance) builds a fresh engine.
    pub async fn close_instance(&self, workspace: Option<&str>) -> Result<bool> {
        let workspace = normalize(workspace)?;
        Ok(self.close_loaded(&workspace).await.is_some())
    }

    /// Remove and finalize a loaded engine. `None` if nothing was loaded.
    ///
    /// Runs under the workspace's init lock so a replacement engine cannot be
    /// constructed over the same directory until finalization completes.
    async fn close_loaded(&self, workspace: &WorkspaceId) -> Option<Result<()>> {
        if !self.instances.contains_key(workspace) {
            return None;
        }

        let lock = self.init_lock(workspace);
        let _guard = lock.lock().await;

        let (_, engine) = self.instances.remove(workspace)?;
        let result = engine.finalize().await;
        match &result {
            Ok(()) => tracing::info!("Closed engine for workspace: {}", workspace),
            Err(e) => tracing::error!("Error closing workspace {}: {}", workspace, e),
        }
        Some(result)
    }

    /// Close every loaded engine.
    ///
    /// Workspaces are closed one after another; a failure in one does not stop
    /// the rest. The registry is empty afterwards regardless of failures.
    pub async fn close_all(&self) -> CloseAllReport {
        let mut report = CloseAllReport::default();
        // Repeat until empty: a construction racing the shutdown may insert
        // after a pass, and its engine must be finalized too.
        loop {
            let pending = self.list_loaded();
            if pending.is_empty() {
                break;
            }
            for workspace in pending {
                match self.close_loaded(&workspace).await {
                    Some(Ok(())) => report.closed.push(workspace),
                    Some(Err(e)) => report.failed.push((workspace, e)),
                    None => {}
                }
            }
        }

        tracing::info!(
            closed = report.closed.len(),
            failed = report.failed.len(),
            "All workspace instances closed"
        );
        report
    }

    /// IDs of workspaces with a constructed engine, in no particular order.
    pub fn list_loaded(&self) -> Vec<WorkspaceId> {
        self.instances
            .iter()
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// Whether `workspace` has a constructed engine. Invalid names are never
    /// loaded, so they return `false` instead of an error.
    pub fn is_loaded(&self, workspace: Option<&str>) -> bool {
        match normalize(workspace) {
            Ok(id) => self.instances.contains_key(&id),
            Err(_) => false,
        }
    }

    /// Number of constructed engines.
    pub fn loaded_count(&self) -> usize {
        self.instances.len()
    }

    /// Workspaces with a directory under the storage root, loaded or not.
    pub fn discover(&self) -> Vec<WorkspaceId> {
        discovery::discover(&self.storage_root)
    }

    /// Sorted union of [`discover`](Self::discover) and
    /// [`list_loaded`](Self::list_loaded).
    pub fn all_workspaces(&self) -> Vec<WorkspaceId> {
        let mut all = self.discover();
        all.extend(self.list_loaded());
        all.sort();
        all.dedup();
        all
    }

    /// Disk usage of a workspace's directory. 0 if it does not exist.
    pub fn workspace_storage_bytes(&self, workspace: &WorkspaceId) -> u64 {
        dir_size_bytes(&self.workspace_path(workspace)).unwrap_or(0)
    }
}

impl<F: EngineFactory> Drop for WorkspaceManager<F> {
    fn drop(&mut self) {
        if !self.instances.is_empty() {
            tracing::warn!(
                "WorkspaceManager dropped with {} engine(s) still loaded; call close_all() first",
                self.instances.len()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tempfile::TempDir;

    struct StubEngine {
        workspace: WorkspaceId,
        finalized: AtomicBool,
        fail_finalize: bool,
    }

    #[async_trait]
    impl Engine for StubEngine {
        fn workspace(&self) -> &WorkspaceId {
            &self.workspace
        }

        async fn finalize(&self) -> Result<()> {
            self.finalized.store(true, Ordering::SeqCst);
            if self.fail_finalize {
                return Err(GraphspaceError::teardown(&self.workspace, "flush failed"));
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct StubFactory {
        constructed: AtomicUsize,
    }

    /// Workspaces whose engine should fail on finalize.
    struct StubConfig {
        fail_finalize: Vec<&'static str>,
    }

    #[async_trait]
    impl EngineFactory for StubFactory {
        type Config = StubConfig;
        type Engine = StubEngine;

        async fn construct(
            &self,
            workspace: &WorkspaceId,
            config: &StubConfig,
            _storage_root: &Path,
        ) -> Result<StubEngine> {
            self.constructed.fetch_add(1, Ordering::SeqCst);
            Ok(StubEngine {
                workspace: workspace.clone(),
                finalized: AtomicBool::new(false),
                fail_finalize: config
                    .fail_finalize
                    .iter()
                    .any(|name| *name == workspace.as_str()),
            })
        }
    }

    fn manager(tmp: &TempDir) -> Arc<WorkspaceManager<StubFactory>> {
        WorkspaceManager::new(
            tmp.path(),
            StubFactory::default(),
            StubConfig {
                fail_finalize: vec!["broken"],
            },
        )
    }

    #[tokio::test]
    async fn default_workspace_when_unnamed() {
        let tmp = TempDir::new().unwrap();
        let manager = manager(&tmp);
        let engine = manager.get_instance(None).await.unwrap();
        assert_eq!(engine.workspace(), "default");

        let blank = manager.get_instance(Some("")).await.unwrap();
        assert!(Arc::ptr_eq(&engine, &blank));
    }

    #[tokio::test]
    async fn same_workspace_reuses_instance() {
        let tmp = TempDir::new().unwrap();
        let manager = manager(&tmp);
        let a = manager.get_instance(Some("crm")).await.unwrap();
        let b = manager.get_instance(Some("crm")).await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(manager.factory.constructed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn invalid_name_does_not_touch_registry() {
        let tmp = TempDir::new().unwrap();
        let manager = manager(&tmp);
        let err = manager.get_instance(Some("../../etc")).await.err().unwrap();
        assert!(matches!(err, GraphspaceError::InvalidWorkspace { .. }));
        assert_eq!(manager.loaded_count(), 0);
        assert_eq!(manager.factory.constructed.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn close_unloaded_returns_false() {
        let tmp = TempDir::new().unwrap();
        let manager = manager(&tmp);
        assert!(!manager.close_instance(Some("erp")).await.unwrap());
    }

    #[tokio::test]
    async fn close_invalid_name_is_error() {
        let tmp = TempDir::new().unwrap();
        let manager = manager(&tmp);
        assert!(manager.close_instance(Some("foo/bar")).await.is_err());
    }

    #[tokio::test]
    async fn close_finalizes_and_removes() {
        let tmp = TempDir::new().unwrap();
        let manager = manager(&tmp);
        let engine = manager.get_instance(Some("erp")).await.unwrap();

        assert!(manager.close_instance(Some("erp")).await.unwrap());
        assert!(engine.finalized.load(Ordering::SeqCst));
        assert!(!manager.is_loaded(Some("erp")));
    }

    #[tokio::test]
    async fn reopen_after_close_constructs_new_instance() {
        let tmp = TempDir::new().unwrap();
        let manager = manager(&tmp);
        let first = manager.get_instance(Some("erp")).await.unwrap();
        manager.close_instance(Some("erp")).await.unwrap();
        let second = manager.get_instance(Some("erp")).await.unwrap();

        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(manager.factory.constructed.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn finalize_failure_is_swallowed() {
        let tmp = TempDir::new().unwrap();
        let manager = manager(&tmp);
        manager.get_instance(Some("broken")).await.unwrap();

        assert!(manager.close_instance(Some("broken")).await.unwrap());
        assert!(!manager.is_loaded(Some("broken")));
    }

    #[tokio::test]
    async fn close_all_reports_failures_and_clears() {
        let tmp = TempDir::new().unwrap();
        let manager = manager(&tmp);
        for name in ["erp", "crm", "broken"] {
            manager.get_instance(Some(name)).await.unwrap();
        }

        let report = manager.close_all().await;
        let mut closed: Vec<String> = report
            .closed
            .iter()
            .map(|id| id.to_string())
            .collect();
        closed.sort();
        assert_eq!(closed, vec!["crm", "erp"]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "broken");
        assert!(!report.is_clean());
        assert_eq!(manager.loaded_count(), 0);
    }

    #[tokio::test]
    async fn list_and_is_loaded() {
        let tmp = TempDir::new().unwrap();
        let manager = manager(&tmp);
        manager.get_instance(Some("alpha")).await.unwrap();
        manager.get_instance(Some("beta")).await.unwrap();

        let mut ids = manager.list_loaded();
        ids.sort();
        assert_eq!(ids, vec!["alpha", "beta"]);
        assert!(manager.is_loaded(Some("alpha")));
        assert!(!manager.is_loaded(Some("gamma")));
        assert!(!manager.is_loaded(Some("../alpha")));
    }

    #[tokio::test]
    async fn all_workspaces_unions_disk_and_memory() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir(tmp.path().join("crm")).unwrap();
        std::fs::create_dir(tmp.path().join("erp")).unwrap();
        let manager = manager(&tmp);
        // The stub factory never creates directories, so "hr" exists only in memory.
        manager.get_instance(Some("hr")).await.unwrap();
        manager.get_instance(Some("erp")).await.unwrap();

        assert_eq!(manager.all_workspaces(), vec!["crm", "erp", "hr"]);
        assert_eq!(manager.discover(), vec!["crm", "erp"]);
    }

    #[tokio::test]
    async fn workspace_storage_bytes_missing_dir_is_zero() {
        let tmp = TempDir::new().unwrap();
        let manager = manager(&tmp);
        let id = WorkspaceId::parse("ghost").unwrap();
        assert_eq!(manager.workspace_storage_bytes(&id), 0);
    }
}
