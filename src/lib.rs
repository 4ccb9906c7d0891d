//! Waymark: a mobile-robot autonomy runtime.
//!
//! This crate wires the subsystem crates into a running robot: topic
//! fan-out over the transport's sensor streams, an odometry-driven
//! transform tree, the two-layer navigation stack, spatial memory, and
//! the skill fabric an LLM agent drives.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub mod config;
pub mod robot;
pub mod transport;

pub use config::{load_config, ConfigError, RuntimeConfig};
pub use robot::{Robot, RobotError};
pub use transport::{LoopbackTransport, Transport, TransportSources};
