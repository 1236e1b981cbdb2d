use async_trait::async_trait;
use graphspace::{Engine, EngineFactory, GraphspaceError, Result, WorkspaceId};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tempfile::TempDir;

/// Engine that records its construction serial and whether it was finalized.
pub struct MockEngine {
    workspace: WorkspaceId,
    pub serial: usize,
    pub finalized: AtomicBool,
    fail_finalize: bool,
    finalize_delay: Duration,
}

#[async_trait]
impl Engine for MockEngine {
    fn workspace(&self) -> &WorkspaceId {
        &self.workspace
    }

    async fn finalize(&self) -> Result<()> {
        if !self.finalize_delay.is_zero() {
            tokio::time::sleep(self.finalize_delay).await;
        }
        self.finalized.store(true, Ordering::SeqCst);
        if self.fail_finalize {
            return Err(GraphspaceError::teardown(&self.workspace, "mock flush failed"));
        }
        Ok(())
    }
}

/// Static per-manager behaviour of [`MockFactory`].
#[derive(Default)]
pub struct MockConfig {
    /// Workspaces whose construction sleeps `slow_delay` on top of the base delay.
    pub slow: Vec<&'static str>,
    pub slow_delay: Duration,
    /// Workspaces whose construction always fails.
    pub fail_construct: Vec<&'static str>,
    /// Workspaces whose engine fails on finalize.
    pub fail_finalize: Vec<&'static str>,
    /// Workspaces whose finalize sleeps `finalize_delay`.
    pub slow_finalize: Vec<&'static str>,
    pub finalize_delay: Duration,
}

/// Factory with knobs for construction delay and failure injection.
#[derive(Default)]
pub struct MockFactory {
    /// Successful and failed attempts alike.
    pub attempts: AtomicUsize,
    pub constructed: AtomicUsize,
    /// Base delay applied to every construction, adjustable at runtime.
    pub delay_ms: AtomicU64,
    /// The next N construction attempts fail.
    pub fail_next: AtomicUsize,
    /// Workspaces in construction order.
    pub log: Mutex<Vec<String>>,
}

impl MockFactory {
    pub fn with_delay(ms: u64) -> Self {
        MockFactory {
            delay_ms: AtomicU64::new(ms),
            ..Default::default()
        }
    }

    pub fn constructed(&self) -> usize {
        self.constructed.load(Ordering::SeqCst)
    }

    pub fn constructed_for(&self, workspace: &str) -> usize {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|ws| ws.as_str() == workspace)
            .count()
    }
}

#[async_trait]
impl EngineFactory for MockFactory {
    type Config = MockConfig;
    type Engine = MockEngine;

    async fn construct(
        &self,
        workspace: &WorkspaceId,
        config: &MockConfig,
        _storage_root: &Path,
    ) -> Result<MockEngine> {
        self.attempts.fetch_add(1, Ordering::SeqCst);

        let mut delay = Duration::from_millis(self.delay_ms.load(Ordering::SeqCst));
        if config.slow.iter().any(|ws| *ws == workspace.as_str()) {
            delay += config.slow_delay;
        }
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let injected = self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected || config.fail_construct.iter().any(|ws| *ws == workspace.as_str()) {
            return Err(GraphspaceError::construction(workspace, "mock backend unavailable"));
        }

        let serial = self.constructed.fetch_add(1, Ordering::SeqCst);
        self.log.lock().unwrap().push(workspace.to_string());
        Ok(MockEngine {
            workspace: workspace.clone(),
            serial,
            finalized: AtomicBool::new(false),
            fail_finalize: config.fail_finalize.iter().any(|ws| *ws == workspace.as_str()),
            finalize_delay: if config.slow_finalize.iter().any(|ws| *ws == workspace.as_str()) {
                config.finalize_delay
            } else {
                Duration::ZERO
            },
        })
    }
}

/// Spawn the full HTTP router on an ephemeral port.
#[allow(dead_code)]
pub async fn spawn_server() -> (String, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let manager = graphspace::WorkspaceManager::new(
        temp_dir.path(),
        graphspace::KnowledgeGraphFactory,
        graphspace::GraphConfig::default(),
    );
    let app = graphspace_http::router(graphspace_http::handlers::AppState::new(manager));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    // Poll health endpoint instead of blind sleep
    let client = reqwest::Client::new();
    for _ in 0..100 {
        if client
            .get(format!("http://{}/health", addr))
            .send()
            .await
            .is_ok()
        {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    (addr, temp_dir)
}
