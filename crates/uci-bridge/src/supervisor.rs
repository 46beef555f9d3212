use crate::factory::{PlatformProcessManager, PlatformProcessManagerFactory};
use std::io;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::io::AsyncWriteExt;
use tokio::process::ChildStdin;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_stream::{Stream, StreamExt};
use tracing::{debug, error, info, warn};
use uci_bridge_core::{
    BridgeConfig, BridgeError, LaunchSpec, OutputSink, ProcessHandle, ProcessLifecycle,
    ProcessManager, ProcessManagerFactory, ProcessTermination, merged_lines,
};

/// Lifecycle of the supervisor's engine session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Running,
}

/// Engine stdin, shared so writes never hold the session slot
type SharedStdin = Arc<Mutex<Option<ChildStdin>>>;

/// One lifetime of a spawned engine process
struct Session<H> {
    id: u64,
    handle: H,
    stdin: SharedStdin,
    // Owned by this session only, so a late reader can never clear a newer session
    running: Arc<AtomicBool>,
    reader: JoinHandle<()>,
}

impl<H> Session<H> {
    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

/// Supervises a single UCI engine process.
///
/// The host drives the engine with [`start`](Self::start),
/// [`send_command`](Self::send_command) and [`stop`](Self::stop). Every line the
/// engine writes to stdout or stderr is handed to the [`OutputSink`] from a
/// background reader task, in the order the engine wrote it.
///
/// None of the operations fail loudly: `start` reports a boolean and the other
/// two log and carry on, so a misbehaving engine can never take the host down
/// with it.
pub struct EngineSupervisor<M: ProcessManager = PlatformProcessManager> {
    config: BridgeConfig,
    manager: Arc<M>,
    sink: Arc<dyn OutputSink>,
    session: Mutex<Option<Session<M::Handle>>>,
    last_session_id: AtomicU64,
}

impl EngineSupervisor<PlatformProcessManager> {
    /// Create a supervisor using this platform's process manager
    pub fn new(config: BridgeConfig, sink: impl OutputSink + 'static) -> Self {
        let manager = PlatformProcessManagerFactory::create_process_manager();
        Self::with_manager(config, manager, sink)
    }
}

impl<M: ProcessManager> EngineSupervisor<M> {
    pub fn with_manager(config: BridgeConfig, manager: M, sink: impl OutputSink + 'static) -> Self {
        info!(
            "Created engine supervisor for {} on platform: {}",
            config.engine_path().display(),
            manager.platform_name()
        );

        Self {
            config,
            manager: Arc::new(manager),
            sink: Arc::new(sink),
            session: Mutex::new(None),
            last_session_id: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Start the engine, returning whether it is running afterwards.
    ///
    /// Calling this while the engine is already running does nothing and
    /// returns `true`.
    pub async fn start(&self) -> bool {
        let mut slot = self.session.lock().await;

        if let Some(session) = slot.as_ref().filter(|session| session.is_running()) {
            debug!("Engine session {} already running", session.id);
            return true;
        }

        // The previous engine exited on its own; reap it before replacing it
        if let Some(stale) = slot.take() {
            debug!("Reaping exited engine session {}", stale.id);
            self.teardown(stale).await;
        }

        match self.spawn_session().await {
            Ok(session) => {
                info!(
                    "Engine session {} started: {}",
                    session.id,
                    session.handle.get_command()
                );
                *slot = Some(session);
                true
            }
            Err(e) => {
                error!("Failed to start engine: {}", e);
                false
            }
        }
    }

    /// Write `command` plus a newline to the engine's stdin.
    ///
    /// Commands sent while the engine is not running are dropped with a warning.
    pub async fn send_command(&self, command: &str) {
        match self.try_send(command).await {
            Ok(()) => {}
            Err(BridgeError::NotRunning) => {
                warn!("Engine not running, cannot send: {}", command);
            }
            Err(e) if e.is_broken_pipe() => {
                warn!("Engine closed its input, dropping command: {}", command);
            }
            Err(e) => error!("{}", e),
        }
    }

    /// Stop the engine. Safe to call at any time, any number of times.
    pub async fn stop(&self) {
        let mut slot = self.session.lock().await;

        match slot.take() {
            Some(session) => {
                let id = session.id;
                self.teardown(session).await;
                info!("Engine session {} stopped", id);
            }
            None => debug!("Stop requested with no engine session"),
        }
    }

    pub async fn state(&self) -> SessionState {
        match self.session.lock().await.as_ref() {
            Some(session) if session.is_running() => SessionState::Running,
            _ => SessionState::Idle,
        }
    }

    pub async fn is_running(&self) -> bool {
        self.state().await == SessionState::Running
    }

    async fn spawn_session(&self) -> Result<Session<M::Handle>, BridgeError> {
        let path = self.config.engine_path();
        debug!("Looking for engine at: {}", path.display());
        log_library_dir(self.config.working_dir()).await;

        let metadata = tokio::fs::metadata(&path)
            .await
            .map_err(|_| BridgeError::BinaryNotFound(path.clone()))?;
        debug!(
            "Engine found, size: {} bytes, executable: {}",
            metadata.len(),
            is_executable(&metadata)
        );
        if !is_executable(&metadata) {
            warn!("Engine at {} has no execute permission", path.display());
        }

        let spec = LaunchSpec::from(&self.config);
        let mut handle = self
            .manager
            .spawn_process(&spec)
            .await
            .map_err(|source| BridgeError::Spawn {
                path: path.clone(),
                source,
            })?;

        // A handle dropped here takes the child with it
        let pipes = handle.take_pipes()?;

        let id = self.last_session_id.fetch_add(1, Ordering::Relaxed) + 1;
        let running = Arc::new(AtomicBool::new(true));
        let lines = merged_lines(pipes.stdout, pipes.stderr);
        let reader = tokio::spawn(relay_output(
            id,
            lines,
            self.sink.clone(),
            running.clone(),
        ));

        Ok(Session {
            id,
            handle,
            stdin: Arc::new(Mutex::new(Some(pipes.stdin))),
            running,
            reader,
        })
    }

    async fn try_send(&self, command: &str) -> Result<(), BridgeError> {
        // The slot lock is released before any pipe I/O so a stuck write
        // cannot block stop()
        let shared = {
            let slot = self.session.lock().await;
            let session = slot
                .as_ref()
                .filter(|session| session.is_running())
                .ok_or(BridgeError::NotRunning)?;
            session.stdin.clone()
        };

        let mut guard = shared.lock().await;
        let stdin = guard.as_mut().ok_or(BridgeError::NotRunning)?;

        debug!("Sending: {}", command);
        let mut payload = String::with_capacity(command.len() + 1);
        payload.push_str(command);
        payload.push('\n');

        stdin
            .write_all(payload.as_bytes())
            .await
            .map_err(BridgeError::Write)?;
        stdin.flush().await.map_err(BridgeError::Write)
    }

    async fn teardown(&self, mut session: Session<M::Handle>) {
        // Closing stdin lets engines that quit on end-of-input exit on their own.
        // A write still in flight keeps it until the engine is gone.
        match session.stdin.try_lock() {
            Ok(mut stdin) => drop(stdin.take()),
            Err(_) => debug!("Engine session {} has a write in flight", session.id),
        }

        let policy = &self.config.shutdown;
        let result = self.manager.shutdown(&mut session.handle, policy).await;
        if !result.is_terminated() {
            warn!(
                "Engine session {} may still be running: {:?}",
                session.id, result
            );
        }
        session.running.store(false, Ordering::SeqCst);

        match tokio::time::timeout(policy.reader_join_timeout(), &mut session.reader).await {
            Ok(Ok(())) => debug!("Reader for session {} finished", session.id),
            Ok(Err(e)) => warn!("Reader for session {} failed: {}", session.id, e),
            Err(_) => {
                warn!(
                    "Reader for session {} still busy after {}ms, aborting",
                    session.id, policy.reader_join_timeout_ms
                );
                session.reader.abort();
            }
        }

        // Without escalation the engine got one terminate request; anything
        // still alive once the reader is done is killed here
        if !policy.escalates() && matches!(session.handle.try_wait().await, Ok(None)) {
            warn!(
                "Engine session {} ignored its terminate request, killing",
                session.id
            );
            self.manager.force_kill(&mut session.handle).await;
        }
    }
}

impl<M: ProcessManager> Drop for EngineSupervisor<M> {
    fn drop(&mut self) {
        if let Some(session) = self.session.get_mut().take() {
            warn!(
                "Supervisor dropped with engine session {} open, killing engine",
                session.id
            );
            session.reader.abort();
        }
    }
}

/// Forward engine lines to the sink until the output closes
async fn relay_output<S>(
    session_id: u64,
    mut lines: S,
    sink: Arc<dyn OutputSink>,
    running: Arc<AtomicBool>,
) where
    S: Stream<Item = io::Result<String>> + Unpin,
{
    while let Some(frame) = lines.next().await {
        match frame {
            Ok(line) => {
                debug!("Output: {}", line);
                sink.emit(line).await;
            }
            Err(e) => {
                error!("{}", BridgeError::Stream(e));
                break;
            }
        }
    }

    running.store(false, Ordering::SeqCst);
    info!("Engine output closed for session {}", session_id);
}

async fn log_library_dir(dir: &Path) {
    if !tracing::enabled!(tracing::Level::DEBUG) {
        return;
    }

    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) => {
            debug!("Cannot list library dir {}: {}", dir.display(), e);
            return;
        }
    };

    debug!("Files in library dir {}:", dir.display());
    while let Ok(Some(entry)) = entries.next_entry().await {
        debug!("  - {}", entry.file_name().to_string_lossy());
    }
}

#[cfg(unix)]
fn is_executable(metadata: &std::fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn is_executable(metadata: &std::fs::Metadata) -> bool {
    metadata.is_file()
}
