#![allow(dead_code)]

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc::UnboundedReceiver;
use uci_bridge::{
    BridgeConfig, EngineSupervisor, LaunchSpec, PlatformProcessManager, ProcessHandle,
    ProcessLifecycle, ProcessManager, ProcessTermination, ShutdownConfig, TerminationResult,
};

pub const TIMEOUT: Duration = Duration::from_secs(5);

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter("debug")
        .try_init();
}

/// A library directory whose engine binary is `/bin/sh`.
///
/// Each test passes the engine's behaviour as a shell script argument.
pub struct MockEngine {
    dir: TempDir,
}

impl MockEngine {
    pub const BINARY: &'static str = "engine";

    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        std::os::unix::fs::symlink("/bin/sh", dir.path().join(Self::BINARY)).unwrap();
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    pub fn config(&self, script: &str) -> BridgeConfig {
        self.config_with(script, ShutdownConfig::graceful())
    }

    pub fn config_with(&self, script: &str, shutdown: ShutdownConfig) -> BridgeConfig {
        BridgeConfig::builder()
            .library_dir(self.dir.path())
            .binary_name(Self::BINARY)
            .args(["-c", script])
            .shutdown(shutdown)
            .build()
            .unwrap()
    }
}

/// Platform process manager that counts spawns
pub struct CountingManager {
    inner: PlatformProcessManager,
    spawns: Arc<AtomicUsize>,
}

impl CountingManager {
    pub fn spawn_counter(&self) -> Arc<AtomicUsize> {
        self.spawns.clone()
    }
}

#[async_trait]
impl ProcessLifecycle for CountingManager {
    type Handle = <PlatformProcessManager as ProcessLifecycle>::Handle;

    async fn spawn_process(&self, spec: &LaunchSpec) -> std::io::Result<Self::Handle> {
        self.spawns.fetch_add(1, Ordering::SeqCst);
        self.inner.spawn_process(spec).await
    }
}

#[async_trait]
impl ProcessTermination for CountingManager {
    async fn terminate_gracefully(&self, handle: &mut dyn ProcessHandle) -> TerminationResult {
        self.inner.terminate_gracefully(handle).await
    }

    async fn force_kill(&self, handle: &mut dyn ProcessHandle) -> TerminationResult {
        self.inner.force_kill(handle).await
    }
}

impl ProcessManager for CountingManager {
    fn new() -> Self {
        Self {
            inner: PlatformProcessManager::new(),
            spawns: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn platform_name(&self) -> &'static str {
        "counting"
    }
}

pub async fn next_line(rx: &mut UnboundedReceiver<String>) -> String {
    tokio::time::timeout(TIMEOUT, rx.recv())
        .await
        .expect("timed out waiting for engine output")
        .expect("output channel closed")
}

/// Poll until the engine session is no longer running
pub async fn wait_until_idle<M: ProcessManager>(supervisor: &EngineSupervisor<M>) -> bool {
    let deadline = tokio::time::Instant::now() + TIMEOUT;
    while tokio::time::Instant::now() < deadline {
        if !supervisor.is_running().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}

/// Whether a process with this pid still exists
pub fn process_alive(pid: &str) -> bool {
    std::process::Command::new("/bin/sh")
        .args(["-c", &format!("kill -0 {pid} 2>/dev/null")])
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}
