use crate::config::{BridgeConfig, ShutdownConfig};
use crate::error::BridgeError;
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tracing::{info, warn};

/// Unique identifier for a process
pub type ProcessId = u32;

/// Status of an engine process
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessStatus {
    /// Process exited with status information
    Exited(std::process::ExitStatus),
}

/// Result of a process termination operation
#[derive(Debug, Clone, PartialEq)]
pub enum TerminationResult {
    /// Process was successfully terminated
    Success,
    /// Process was not found (already exited)
    ProcessNotFound,
    /// Permission denied (insufficient privileges)
    AccessDenied,
    /// Operation failed with specific error message
    Failed(String),
}

impl TerminationResult {
    /// The process is gone, whoever ended it
    pub fn is_terminated(&self) -> bool {
        matches!(
            self,
            TerminationResult::Success | TerminationResult::ProcessNotFound
        )
    }
}

/// Everything needed to launch the engine executable
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LaunchSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
    pub env: HashMap<String, String>,
}

impl LaunchSpec {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            ..Default::default()
        }
    }

    /// Build a command with all three standard streams piped.
    ///
    /// The child is killed if its handle is dropped without an explicit stop.
    pub fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);

        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }

        cmd.envs(&self.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        cmd
    }

    pub fn display_command(&self) -> String {
        self.program.display().to_string()
    }
}

impl From<&BridgeConfig> for LaunchSpec {
    fn from(config: &BridgeConfig) -> Self {
        Self {
            program: config.engine_path(),
            args: config.args.clone(),
            working_dir: Some(config.working_dir().to_path_buf()),
            env: config.env.clone(),
        }
    }
}

/// The standard streams of a freshly spawned engine
pub struct EnginePipes {
    pub stdin: ChildStdin,
    pub stdout: ChildStdout,
    pub stderr: ChildStderr,
}

/// Trait representing a handle to a running process
#[async_trait]
pub trait ProcessHandle: Send + Sync {
    /// Get the process ID (None if process has been reaped)
    fn get_pid(&self) -> Option<ProcessId>;

    /// Get the command that started this process
    fn get_command(&self) -> &str;

    /// Move the piped standard streams out of the handle
    fn take_pipes(&mut self) -> Result<EnginePipes, BridgeError>;

    /// Try to get exit status without blocking
    async fn try_wait(&mut self) -> Result<Option<ProcessStatus>>;

    /// Wait for the process to exit
    async fn wait(&mut self) -> Result<ProcessStatus>;

    /// Kill the process and reap it
    async fn kill(&mut self) -> Result<()>;
}

/// Process handle over a tokio child, shared by every platform manager
pub struct ChildHandle {
    child: Child,
    command: String,
}

impl ChildHandle {
    pub fn new(child: Child, command: String) -> Self {
        Self { child, command }
    }
}

#[async_trait]
impl ProcessHandle for ChildHandle {
    fn get_pid(&self) -> Option<ProcessId> {
        self.child.id()
    }

    fn get_command(&self) -> &str {
        &self.command
    }

    fn take_pipes(&mut self) -> Result<EnginePipes, BridgeError> {
        let stdin = self
            .child
            .stdin
            .take()
            .ok_or(BridgeError::MissingPipe("stdin"))?;
        let stdout = self
            .child
            .stdout
            .take()
            .ok_or(BridgeError::MissingPipe("stdout"))?;
        let stderr = self
            .child
            .stderr
            .take()
            .ok_or(BridgeError::MissingPipe("stderr"))?;

        Ok(EnginePipes {
            stdin,
            stdout,
            stderr,
        })
    }

    async fn try_wait(&mut self) -> Result<Option<ProcessStatus>> {
        match self.child.try_wait()? {
            Some(status) => Ok(Some(ProcessStatus::Exited(status))),
            None => Ok(None),
        }
    }

    async fn wait(&mut self) -> Result<ProcessStatus> {
        let status = self.child.wait().await?;
        Ok(ProcessStatus::Exited(status))
    }

    async fn kill(&mut self) -> Result<()> {
        self.child
            .kill()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to kill process: {}", e))
    }
}

/// Core trait for process lifecycle management
#[async_trait]
pub trait ProcessLifecycle: Send + Sync {
    /// The type of process handle this lifecycle manager produces
    type Handle: ProcessHandle + 'static;

    /// Spawn the engine described by `spec`
    async fn spawn_process(&self, spec: &LaunchSpec) -> std::io::Result<Self::Handle>;

    /// Wait for a process to exit with optional timeout
    async fn wait_for_exit(
        &self,
        handle: &mut dyn ProcessHandle,
        timeout: Option<Duration>,
    ) -> Result<ProcessStatus> {
        match timeout {
            Some(duration) => tokio::time::timeout(duration, handle.wait())
                .await
                .map_err(|_| anyhow::anyhow!("Timeout waiting for process exit"))?,
            None => handle.wait().await,
        }
    }
}

/// Trait for terminating a single engine process
#[async_trait]
pub trait ProcessTermination: Send + Sync {
    /// Ask the process to exit (SIGTERM on Unix)
    async fn terminate_gracefully(&self, handle: &mut dyn ProcessHandle) -> TerminationResult;

    /// Force kill the process (SIGKILL on Unix)
    async fn force_kill(&self, handle: &mut dyn ProcessHandle) -> TerminationResult;

    /// Terminate, give the process `grace` to exit, then force kill
    async fn terminate_with_escalation(
        &self,
        handle: &mut dyn ProcessHandle,
        grace: Duration,
    ) -> TerminationResult {
        match self.terminate_gracefully(handle).await {
            TerminationResult::Success => {
                match tokio::time::timeout(grace, handle.wait()).await {
                    Ok(Ok(status)) => {
                        info!("Engine exited after terminate request: {:?}", status);
                        TerminationResult::Success
                    }
                    Ok(Err(e)) => {
                        warn!("Failed to wait for engine exit: {}", e);
                        self.force_kill(handle).await
                    }
                    Err(_) => {
                        warn!(
                            "Engine still running {}ms after terminate request, killing",
                            grace.as_millis()
                        );
                        self.force_kill(handle).await
                    }
                }
            }
            TerminationResult::ProcessNotFound => TerminationResult::Success,
            _ => {
                // Graceful termination failed, try force kill
                self.force_kill(handle).await
            }
        }
    }

    /// Apply a shutdown policy to the process
    async fn shutdown(
        &self,
        handle: &mut dyn ProcessHandle,
        policy: &ShutdownConfig,
    ) -> TerminationResult {
        if policy.escalates() {
            self.terminate_with_escalation(handle, policy.grace_period())
                .await
        } else if policy.request_terminate {
            self.terminate_gracefully(handle).await
        } else {
            self.force_kill(handle).await
        }
    }
}

/// High-level process manager trait that combines lifecycle and termination
pub trait ProcessManager: ProcessLifecycle + ProcessTermination {
    /// Create a new process manager instance
    fn new() -> Self
    where
        Self: Sized;

    /// Get the platform name for logging and debugging
    fn platform_name(&self) -> &'static str;
}

/// Factory trait for creating platform-specific process managers
pub trait ProcessManagerFactory {
    /// The type of process manager this factory creates
    type Manager: ProcessManager;

    /// Create a process manager for the current platform
    fn create_process_manager() -> Self::Manager;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_launch_spec_from_config() {
        let config = BridgeConfig::builder()
            .library_dir("/opt/engines")
            .binary_name("stockfish")
            .args(["bench"])
            .env("HOME", "/opt")
            .build()
            .unwrap();

        let spec = LaunchSpec::from(&config);
        assert_eq!(spec.program, PathBuf::from("/opt/engines/stockfish"));
        assert_eq!(spec.working_dir, Some(PathBuf::from("/opt/engines")));
        assert_eq!(spec.args, vec!["bench".to_string()]);
        assert_eq!(spec.env.get("HOME").map(String::as_str), Some("/opt"));
        assert_eq!(spec.display_command(), "/opt/engines/stockfish");
    }

    #[test]
    fn test_termination_result_categorization() {
        assert!(TerminationResult::Success.is_terminated());
        assert!(TerminationResult::ProcessNotFound.is_terminated());
        assert!(!TerminationResult::AccessDenied.is_terminated());
        assert!(!TerminationResult::Failed("boom".to_string()).is_terminated());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_child_handle_pipes_and_wait() {
        let mut spec = LaunchSpec::new("/bin/sh");
        spec.args = vec!["-c".to_string(), "exit 3".to_string()];

        let child = spec.command().spawn().unwrap();
        let mut handle = ChildHandle::new(child, spec.display_command());
        assert!(handle.get_pid().is_some());
        assert_eq!(handle.get_command(), "/bin/sh");

        let pipes = handle.take_pipes();
        assert!(pipes.is_ok());
        // Second take finds the pipes gone
        assert!(matches!(
            handle.take_pipes(),
            Err(BridgeError::MissingPipe("stdin"))
        ));

        let ProcessStatus::Exited(status) = handle.wait().await.unwrap();
        assert_eq!(status.code(), Some(3));
    }
}
