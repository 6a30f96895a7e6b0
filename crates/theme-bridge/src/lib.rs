//! theme-bridge library crate.
//!
//! This crate implements the cross-window theme messenger that runs inside an
//! embedded (guest) page, plus the transports that connect it to the page
//! that embeds it (the host).
//!
//! # Architecture (clean architecture)
//!
//! ```text
//! Host page  (requests themes, shows a loader)
//!         ↕  {"type":"theme-changed"} / {"type":"loading"}
//! [theme-bridge]
//!   ├── domain/           BridgeConfig and its sections
//!   ├── application/      CrossWindowThemeMessenger, guest page lifecycle,
//!   │                     GuestWindow / ThemeBackend traits
//!   └── infrastructure/
//!         ├── channel_window/ In-process host ↔ guest window pair
//!         ├── ws_host/        Host relay: WebSocket server (tokio-tungstenite)
//!         ├── ws_guest/       Guest window over a WebSocket connection
//!         └── config_file/    TOML configuration loading
//! ```
//!
//! # Layer rules
//!
//! - `domain` has no I/O and no async.
//! - `application` depends on `domain`, `theme-core`, and the traits it
//!   defines; it never opens sockets.
//! - `infrastructure` implements those traits with tokio and tungstenite.

/// Domain layer: configuration types (no I/O).
pub mod domain;

/// Application layer: the messenger use case and the guest page lifecycle.
pub mod application;

/// Infrastructure layer: window transports and config file loading.
pub mod infrastructure;
