use crate::supervisor::{EngineSupervisor, SessionState};
use tokio::runtime::{Builder, Runtime};
use uci_bridge_core::{BridgeConfig, OutputSink};

/// Synchronous front end for hosts that do not run an async runtime.
///
/// Owns a small multi-threaded tokio runtime; the reader task keeps running on
/// it between calls. Must not be used from inside another tokio runtime.
pub struct BlockingEngineBridge {
    // Declared before the runtime so the engine is dropped while the runtime is alive
    supervisor: EngineSupervisor,
    runtime: Runtime,
}

impl BlockingEngineBridge {
    pub fn new(config: BridgeConfig, sink: impl OutputSink + 'static) -> std::io::Result<Self> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("uci-bridge")
            .enable_all()
            .build()?;

        Ok(Self {
            supervisor: EngineSupervisor::new(config, sink),
            runtime,
        })
    }

    pub fn start(&self) -> bool {
        self.runtime.block_on(self.supervisor.start())
    }

    pub fn send_command(&self, command: &str) {
        self.runtime.block_on(self.supervisor.send_command(command))
    }

    pub fn stop(&self) {
        self.runtime.block_on(self.supervisor.stop())
    }

    pub fn state(&self) -> SessionState {
        self.runtime.block_on(self.supervisor.state())
    }

    pub fn is_running(&self) -> bool {
        self.state() == SessionState::Running
    }
}

impl Drop for BlockingEngineBridge {
    fn drop(&mut self) {
        self.runtime.block_on(self.supervisor.stop());
    }
}
