use std::path::PathBuf;
use thiserror::Error;

/// Error types for engine bridge operations
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Engine binary not found at {}", .0.display())]
    BinaryNotFound(PathBuf),

    #[error("Failed to spawn engine {}: {source}", path.display())]
    Spawn {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Engine process has no {0} pipe")]
    MissingPipe(&'static str),

    #[error("Error reading engine output: {0}")]
    Stream(#[source] std::io::Error),

    #[error("Error writing command: {0}")]
    Write(#[source] std::io::Error),

    #[error("Engine not running")]
    NotRunning,

    #[error("Configuration error: {0}")]
    Config(String),
}

impl BridgeError {
    /// Failures after which the child is most likely gone
    pub fn is_broken_pipe(&self) -> bool {
        match self {
            BridgeError::Write(e) | BridgeError::Stream(e) => {
                e.kind() == std::io::ErrorKind::BrokenPipe
            }
            _ => false,
        }
    }
}
