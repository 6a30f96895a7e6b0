//! Domain layer for theme-bridge.
//!
//! Message types and trust rules live in `theme-core`; this layer only adds
//! the runtime configuration of the bridge.  It has no dependencies on I/O,
//! networking, or async runtimes.

pub mod config;

pub use config::{BridgeConfig, GuestConfig, HostConfig, MessengerConfig};
