//! Infrastructure layer for theme-bridge.
//!
//! Concrete implementations of the application traits:
//!
//! - [`channel_window`] – host and guest in the same process, wired with tokio
//!   channels; reproduces the browser's postMessage delivery rules.
//! - [`ws_host`] – the host side as a WebSocket server.
//! - [`ws_guest`] – a guest window whose parent is reached over WebSocket.
//! - [`config_file`] – TOML configuration loading.
//! - [`logging_backend`] – a theme backend that only logs, for the CLI guest.

pub mod channel_window;
pub mod config_file;
pub mod logging_backend;
pub mod ws_guest;
pub mod ws_host;

pub use channel_window::{window_pair, ChannelGuestWindow, HostEnd, WindowPair};
pub use config_file::{load_config_file, parse_config, ConfigError, ConfigFile};
pub use logging_backend::LoggingThemeBackend;
pub use ws_guest::WsGuestWindow;
pub use ws_host::{HostEvent, HostServer};
