#[cfg(unix)]
mod unix_impl {
    use async_trait::async_trait;
    use nix::sys::signal::{self, Signal};
    use nix::unistd::Pid as NixPid;
    use std::time::Duration;
    use tracing::{debug, info, warn};
    use uci_bridge_core::{
        ChildHandle, LaunchSpec, ProcessHandle, ProcessLifecycle, ProcessManager,
        ProcessTermination, TerminationResult,
    };

    /// How long a force kill waits for the kernel to let us reap the child
    const REAP_TIMEOUT: Duration = Duration::from_millis(500);

    /// Unix process manager driving the engine with POSIX signals
    #[derive(Debug)]
    pub struct UnixProcessManager {
        reap_timeout: Duration,
    }

    impl Default for UnixProcessManager {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl ProcessLifecycle for UnixProcessManager {
        type Handle = ChildHandle;

        async fn spawn_process(&self, spec: &LaunchSpec) -> std::io::Result<ChildHandle> {
            let mut cmd = spec.command();

            // Own process group so a terminal Ctrl-C reaches the host, not the engine
            cmd.process_group(0);

            let child = cmd.spawn()?;

            if let Some(pid) = child.id() {
                info!(
                    "Spawned Unix process: {} (PID: {}) with args: {:?}",
                    spec.display_command(),
                    pid,
                    spec.args
                );
            }

            Ok(ChildHandle::new(child, spec.display_command()))
        }
    }

    #[async_trait]
    impl ProcessTermination for UnixProcessManager {
        async fn terminate_gracefully(&self, handle: &mut dyn ProcessHandle) -> TerminationResult {
            let Some(pid) = handle.get_pid() else {
                return TerminationResult::ProcessNotFound;
            };

            match Self::signal(pid, Signal::SIGTERM) {
                Ok(()) => {
                    info!("Sent SIGTERM to process {}", pid);
                    TerminationResult::Success
                }
                Err(result) => result,
            }
        }

        async fn force_kill(&self, handle: &mut dyn ProcessHandle) -> TerminationResult {
            let Some(pid) = handle.get_pid() else {
                return TerminationResult::ProcessNotFound;
            };

            match Self::signal(pid, Signal::SIGKILL) {
                Ok(()) => {
                    info!("Sent SIGKILL to process {}", pid);
                    match tokio::time::timeout(self.reap_timeout, handle.wait()).await {
                        Ok(Ok(status)) => debug!("Reaped process {}: {:?}", pid, status),
                        Ok(Err(e)) => warn!("Failed to reap process {}: {}", pid, e),
                        Err(_) => warn!("Process {} not reaped after SIGKILL", pid),
                    }
                    TerminationResult::Success
                }
                Err(result) => result,
            }
        }
    }

    impl UnixProcessManager {
        /// Deliver `sig`, mapping errno to a termination result
        fn signal(pid: u32, sig: Signal) -> Result<(), TerminationResult> {
            let nix_pid = NixPid::from_raw(pid as i32);

            match signal::kill(nix_pid, sig) {
                Ok(()) => Ok(()),
                Err(nix::errno::Errno::ESRCH) => {
                    info!("Process {} not found (already terminated)", pid);
                    Err(TerminationResult::ProcessNotFound)
                }
                Err(nix::errno::Errno::EPERM) => {
                    warn!("Permission denied to signal process {}", pid);
                    Err(TerminationResult::AccessDenied)
                }
                Err(e) => {
                    warn!("Failed to send {} to process {}: {}", sig, pid, e);
                    Err(TerminationResult::Failed(format!("{sig} failed: {e}")))
                }
            }
        }
    }

    impl ProcessManager for UnixProcessManager {
        fn new() -> Self {
            debug!("Initializing Unix process manager");
            Self {
                reap_timeout: REAP_TIMEOUT,
            }
        }

        fn platform_name(&self) -> &'static str {
            "unix"
        }
    }

}

#[cfg(unix)]
pub use unix_impl::UnixProcessManager;
