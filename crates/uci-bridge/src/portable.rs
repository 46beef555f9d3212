use async_trait::async_trait;
use tracing::{debug, info, warn};
use uci_bridge_core::{
    ChildHandle, LaunchSpec, ProcessHandle, ProcessLifecycle, ProcessManager, ProcessTermination,
    TerminationResult,
};

/// Process manager built only on what tokio offers on every platform.
///
/// There is no portable terminate request, so both termination steps kill the
/// engine. `stop()` closes the engine's stdin first, which lets engines that
/// exit on end-of-input shut down on their own.
#[derive(Debug, Default)]
pub struct PortableProcessManager;

#[async_trait]
impl ProcessLifecycle for PortableProcessManager {
    type Handle = ChildHandle;

    async fn spawn_process(&self, spec: &LaunchSpec) -> std::io::Result<ChildHandle> {
        let child = spec.command().spawn()?;

        if let Some(pid) = child.id() {
            info!(
                "Spawned engine process: {} (PID: {}) with args: {:?}",
                spec.display_command(),
                pid,
                spec.args
            );
        }

        Ok(ChildHandle::new(child, spec.display_command()))
    }
}

impl PortableProcessManager {
    async fn kill(handle: &mut dyn ProcessHandle) -> TerminationResult {
        let Some(pid) = handle.get_pid() else {
            return TerminationResult::ProcessNotFound;
        };

        match handle.kill().await {
            Ok(()) => {
                info!("Killed engine process {}", pid);
                TerminationResult::Success
            }
            Err(e) => {
                warn!("Failed to kill engine process {}: {}", pid, e);
                TerminationResult::Failed(e.to_string())
            }
        }
    }
}

#[async_trait]
impl ProcessTermination for PortableProcessManager {
    async fn terminate_gracefully(&self, handle: &mut dyn ProcessHandle) -> TerminationResult {
        Self::kill(handle).await
    }

    async fn force_kill(&self, handle: &mut dyn ProcessHandle) -> TerminationResult {
        Self::kill(handle).await
    }
}

impl ProcessManager for PortableProcessManager {
    fn new() -> Self {
        debug!("Initializing portable process manager");
        Self
    }

    fn platform_name(&self) -> &'static str {
        "portable"
    }
}
