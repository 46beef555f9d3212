//! UCI bridge core - platform-independent abstractions and configuration
//!
//! This crate provides the configuration, error types, process traits, line
//! framing and output sinks shared by the platform-specific process managers
//! and the engine supervisor.

pub mod codec;
pub mod config;
pub mod error;
pub mod process;
pub mod sink;

pub use codec::*;
pub use config::*;
pub use error::*;
pub use process::*;
pub use sink::*;
