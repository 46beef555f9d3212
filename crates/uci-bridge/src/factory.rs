use uci_bridge_core::{ProcessManager, ProcessManagerFactory};

/// Platform-independent factory that selects the appropriate implementation at compile time
pub struct PlatformProcessManagerFactory;

impl ProcessManagerFactory for PlatformProcessManagerFactory {
    #[cfg(unix)]
    type Manager = uci_bridge_unix::UnixProcessManager;

    #[cfg(not(unix))]
    type Manager = crate::portable::PortableProcessManager;

    fn create_process_manager() -> Self::Manager {
        <Self::Manager as ProcessManager>::new()
    }
}

/// The process manager used by default on this platform
pub type PlatformProcessManager = <PlatformProcessManagerFactory as ProcessManagerFactory>::Manager;
