use crate::error::BridgeError;
use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// File name the engine binary is extracted under inside the library directory
pub const DEFAULT_BINARY_NAME: &str = "libstockfish.so";

/// How the supervisor tears an engine process down on `stop()`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ShutdownConfig {
    /// Send a terminate request (SIGTERM on Unix) before anything else
    #[serde(default = "default_request_terminate")]
    pub request_terminate: bool,

    /// Escalate to a forced kill when the engine outlives the grace period
    #[serde(default = "default_force_kill")]
    pub force_kill: bool,

    /// How long to wait for the engine to exit after the terminate request (in milliseconds)
    #[serde(default = "default_grace_period_ms")]
    pub grace_period_ms: u64,

    /// Upper bound on waiting for the reader task to drain (in milliseconds)
    #[serde(default = "default_reader_join_timeout_ms")]
    pub reader_join_timeout_ms: u64,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            request_terminate: default_request_terminate(),
            force_kill: default_force_kill(),
            grace_period_ms: default_grace_period_ms(),
            reader_join_timeout_ms: default_reader_join_timeout_ms(),
        }
    }
}

impl ShutdownConfig {
    /// Terminate, wait out the grace period, then kill
    pub fn graceful() -> Self {
        Self::default()
    }

    /// A single terminate request with no grace period.
    ///
    /// Stop still waits up to `reader_join_timeout_ms` for the engine's output
    /// to close; an engine alive after that is killed.
    pub fn terminate_only() -> Self {
        Self {
            request_terminate: true,
            force_kill: false,
            grace_period_ms: 0,
            reader_join_timeout_ms: default_reader_join_timeout_ms(),
        }
    }

    /// Kill straight away
    pub fn immediate() -> Self {
        Self {
            request_terminate: false,
            force_kill: true,
            grace_period_ms: 0,
            reader_join_timeout_ms: default_reader_join_timeout_ms(),
        }
    }

    /// Validate the configuration and return errors if invalid
    pub fn validate(&self) -> Result<(), BridgeError> {
        if !self.request_terminate && !self.force_kill {
            return Err(BridgeError::Config(
                "shutdown must either request termination or force kill".to_string(),
            ));
        }

        if self.grace_period_ms > 60_000 {
            return Err(BridgeError::Config(
                "grace_period_ms should not exceed 60 seconds".to_string(),
            ));
        }

        if self.reader_join_timeout_ms > 60_000 {
            return Err(BridgeError::Config(
                "reader_join_timeout_ms should not exceed 60 seconds".to_string(),
            ));
        }

        Ok(())
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }

    pub fn reader_join_timeout(&self) -> Duration {
        Duration::from_millis(self.reader_join_timeout_ms)
    }

    /// Whether the terminate request is followed by a bounded wait and a kill
    pub fn escalates(&self) -> bool {
        self.request_terminate && self.force_kill
    }
}

/// Main bridge configuration
#[derive(Debug, Clone, PartialEq, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
#[serde(rename_all = "camelCase")]
pub struct BridgeConfig {
    /// Directory the host platform extracts native binaries into
    pub library_dir: PathBuf,
    #[builder(default = "DEFAULT_BINARY_NAME.to_string()")]
    #[serde(default = "default_binary_name")]
    pub binary_name: String,
    #[builder(default)]
    #[builder(setter(custom))]
    #[serde(default)]
    pub args: Vec<String>,
    #[builder(default)]
    #[builder(setter(custom))]
    #[serde(default)]
    pub env: HashMap<String, String>,
    #[builder(default)]
    #[serde(default)]
    pub shutdown: ShutdownConfig,
}

impl BridgeConfig {
    pub fn builder() -> BridgeConfigBuilder {
        BridgeConfigBuilder::default()
    }

    /// Parse a configuration from JSON, applying defaults for missing fields
    pub fn from_json(json: &str) -> Result<Self, BridgeError> {
        let config: BridgeConfig =
            serde_json::from_str(json).map_err(|e| BridgeError::Config(e.to_string()))?;
        validate_binary_name(&config.binary_name).map_err(BridgeError::Config)?;
        config.shutdown.validate()?;
        Ok(config)
    }

    /// Absolute location of the engine executable
    pub fn engine_path(&self) -> PathBuf {
        self.library_dir.join(&self.binary_name)
    }

    pub fn working_dir(&self) -> &Path {
        &self.library_dir
    }
}

impl BridgeConfigBuilder {
    pub fn args<S: ToString, I: IntoIterator<Item = S>>(&mut self, iter: I) -> &mut Self {
        let args: Vec<String> = iter.into_iter().map(|s| s.to_string()).collect();
        self.args = Some(args);
        self
    }

    pub fn env<T: ToString>(&mut self, key: T, value: T) -> &mut Self {
        let map = self.env.get_or_insert_with(HashMap::new);
        map.insert(key.to_string(), value.to_string());

        self
    }

    fn validate(&self) -> Result<(), String> {
        if let Some(name) = &self.binary_name {
            validate_binary_name(name)?;
        }
        if let Some(shutdown) = &self.shutdown {
            shutdown.validate().map_err(|e| e.to_string())?;
        }
        Ok(())
    }
}

fn validate_binary_name(name: &str) -> Result<(), String> {
    if name.trim().is_empty() {
        return Err("binary_name must not be empty".to_string());
    }
    Ok(())
}

// Default value functions for serde
fn default_binary_name() -> String {
    DEFAULT_BINARY_NAME.to_string()
}
fn default_request_terminate() -> bool {
    true
}
fn default_force_kill() -> bool {
    true
}
fn default_grace_period_ms() -> u64 {
    500
}
fn default_reader_join_timeout_ms() -> u64 {
    1_000
}
