use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::net::SocketAddr;
use std::path::PathBuf;
use uci_bridge::{BridgeConfig, DEFAULT_BINARY_NAME, ShutdownConfig};

#[derive(Parser, Debug)]
#[command(name = "uci-bridge")]
#[command(version, about = "Relay UCI commands to a chess engine process")]
pub struct Args {
    /// Directory containing the engine binary; also the engine's working directory
    #[arg(long, required_unless_present = "config", conflicts_with = "config")]
    pub library_dir: Option<PathBuf>,

    /// JSON bridge configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// File name of the engine binary inside the library directory
    #[arg(long, default_value = DEFAULT_BINARY_NAME)]
    pub binary: String,

    /// Argument passed to the engine (repeatable)
    #[arg(long = "arg", allow_hyphen_values = true)]
    pub engine_args: Vec<String>,

    /// How the engine is stopped
    #[arg(long, value_enum, default_value_t = ShutdownMode::Graceful)]
    pub shutdown: ShutdownMode,

    /// Relay over UDP on this address instead of stdin/stdout
    #[arg(long)]
    pub udp: Option<SocketAddr>,

    /// Append logs to this file instead of stderr
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownMode {
    /// Terminate, wait briefly, then kill
    Graceful,
    /// Send a single terminate request, killing only an engine that keeps its output open
    Terminate,
    /// Kill immediately
    Kill,
}

impl From<ShutdownMode> for ShutdownConfig {
    fn from(mode: ShutdownMode) -> Self {
        match mode {
            ShutdownMode::Graceful => ShutdownConfig::graceful(),
            ShutdownMode::Terminate => ShutdownConfig::terminate_only(),
            ShutdownMode::Kill => ShutdownConfig::immediate(),
        }
    }
}

impl Args {
    pub fn bridge_config(&self) -> Result<BridgeConfig> {
        if let Some(path) = &self.config {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config {}", path.display()))?;
            return BridgeConfig::from_json(&json)
                .with_context(|| format!("Invalid config {}", path.display()));
        }

        let library_dir = self
            .library_dir
            .clone()
            .context("--library-dir or --config is required")?;

        let config = BridgeConfig::builder()
            .library_dir(library_dir)
            .binary_name(self.binary.clone())
            .args(&self.engine_args)
            .shutdown(ShutdownConfig::from(self.shutdown))
            .build()?;
        Ok(config)
    }
}
