//! Application layer for theme-bridge.
//!
//! The application layer knows *what* happens when a host asks for a new
//! theme, but delegates *how* messages travel and *how* a theme is installed
//! to injected trait objects.
//!
//! # Responsibilities
//!
//! - Validating the origin of every inbound message
//! - Sequencing `loading:true` → apply theme → rewrite location → reload
//! - Announcing the finished load to the host
//! - Restarting the page with a fresh messenger after each reload
//!
//! # What does NOT belong here?
//!
//! - Opening sockets or listening for connections (that is infrastructure)
//! - WebSocket framing (handled by tokio-tungstenite)

pub mod guest_page;
pub mod messenger;

pub use guest_page::{run_guest_page, PageSignals};
pub use messenger::{
    CrossWindowThemeMessenger, DiscardReason, GuestWindow, HandleOutcome, MessengerError,
    ThemeBackend, ThemeError, WindowError,
};
