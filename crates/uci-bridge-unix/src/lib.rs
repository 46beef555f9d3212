mod unix_process_manager;

#[cfg(unix)]
pub use unix_process_manager::UnixProcessManager;
