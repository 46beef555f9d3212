//! Bridge between a host application and an external UCI chess engine.
//!
//! [`EngineSupervisor`] launches the engine binary found in a configured
//! library directory, relays commands to its stdin and hands every output
//! line to an [`OutputSink`]. [`BlockingEngineBridge`] wraps it for hosts
//! without an async runtime.
//!
//! ```rust,no_run
//! use uci_bridge::{BridgeConfig, ChannelSink, EngineSupervisor};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = BridgeConfig::builder()
//!     .library_dir("/data/app/lib/arm64")
//!     .build()?;
//! let (sink, mut lines) = ChannelSink::new();
//! let engine = EngineSupervisor::new(config, sink);
//!
//! if engine.start().await {
//!     engine.send_command("uci").await;
//!     while let Some(line) = lines.recv().await {
//!         if line == "uciok" {
//!             break;
//!         }
//!     }
//! }
//! engine.stop().await;
//! # Ok(())
//! # }
//! ```

mod blocking;
mod factory;
mod portable;
mod supervisor;

pub use blocking::BlockingEngineBridge;
pub use factory::{PlatformProcessManager, PlatformProcessManagerFactory};
pub use portable::PortableProcessManager;
pub use supervisor::{EngineSupervisor, SessionState};

// Re-export core functionality
pub use uci_bridge_core::*;
